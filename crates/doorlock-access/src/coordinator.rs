//! The access decision loop.

use crate::session::SessionAggregator;
use crate::settings::SettingsStore;
use crate::submitter::{AdmissionClient, DecisionSubmitter, SubmitOutcome};
use doorlock_bus::{EventLog, MessageBus};
use doorlock_core::CredentialInput;
use doorlock_core::constants::TOPIC_DEVICE_COMMAND;
use doorlock_protocol::DeviceCommand;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Feeds credential inputs into the session and acts on decisions.
///
/// Inputs are handled one at a time, so a submission in progress delays
/// the next input rather than racing it.
pub struct AccessCoordinator<B, C, S> {
    aggregator: SessionAggregator<S>,
    submitter: DecisionSubmitter<C, S>,
    log: EventLog<B>,
    command_topic: String,
}

impl<B, C, S> AccessCoordinator<B, C, S>
where
    B: MessageBus,
    C: AdmissionClient,
    S: SettingsStore,
{
    pub fn new(
        aggregator: SessionAggregator<S>,
        submitter: DecisionSubmitter<C, S>,
        log: EventLog<B>,
    ) -> Self {
        Self {
            aggregator,
            submitter,
            log,
            command_topic: TOPIC_DEVICE_COMMAND.to_string(),
        }
    }

    /// Publish door commands on a topic other than `device/command`.
    pub fn with_command_topic(mut self, topic: impl Into<String>) -> Self {
        self.command_topic = topic.into();
        self
    }

    /// Process inputs until every sender is dropped.
    pub async fn run(self, mut inputs: mpsc::Receiver<CredentialInput>) {
        info!("Access coordinator started");
        while let Some(input) = inputs.recv().await {
            self.handle(input).await;
        }
        info!("Access coordinator stopped");
    }

    /// Process one input. Returns the outcome if it triggered a decision.
    pub async fn handle(&self, input: CredentialInput) -> Option<SubmitOutcome> {
        let kind = input.kind();
        self.log.record(format!("Updated session with {kind}")).await;

        let snapshot = self.aggregator.update(input).await?;
        self.log
            .record(format!(
                "Session ready ({}/{} factors), requesting decision",
                snapshot.score, snapshot.threshold
            ))
            .await;

        let outcome = self.submitter.submit(&snapshot).await;
        match &outcome {
            SubmitOutcome::Granted(verdict) => {
                let user = verdict.matched_user.as_deref().unwrap_or("unknown user");
                self.log
                    .record(format!("Access granted for {user}, opening door"))
                    .await;
                self.unlock().await;
            }
            SubmitOutcome::Denied(verdict) => {
                self.log
                    .record(format!("Access rejected (score {})", verdict.score))
                    .await;
            }
            SubmitOutcome::Unavailable {
                attempts,
                last_error,
            } => {
                self.log
                    .record(format!(
                        "Admission service unavailable after {attempts} attempts: {last_error}"
                    ))
                    .await;
            }
        }
        self.log.record("Session cleared").await;

        Some(outcome)
    }

    async fn unlock(&self) {
        let command = DeviceCommand::Unlock.to_string();
        if let Err(e) = self.log.bus().publish(&self.command_topic, &command).await {
            error!("Failed to send unlock command: {}", e);
            self.log.record(format!("Unlock command not sent: {e}")).await;
        }
    }
}
