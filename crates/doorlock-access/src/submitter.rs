//! Decision submission to the admission endpoint.

use crate::AdmissionError;
use crate::session::{ResetReason, SessionAggregator, SessionSnapshot};
use crate::settings::SettingsStore;
use doorlock_core::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_SUBMIT_ATTEMPTS, DEFAULT_SUBMIT_RETRY_DELAY_MS,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Face factor as the admission endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBundle {
    #[serde(rename = "match")]
    pub matched: bool,
    pub name: String,
}

/// Fingerprint factor as the admission endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintBundle {
    #[serde(rename = "match")]
    pub matched: bool,
    pub fp_id: Option<u32>,
}

/// Request body for the admission endpoint.
///
/// Absent factors are omitted; a missing PIN is sent as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionBundle {
    pub mode: String,
    pub pin: String,
    pub admin_pass: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_result: Option<FaceBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_result: Option<FingerprintBundle>,
}

impl From<&SessionSnapshot> for AdmissionBundle {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let session = &snapshot.session;
        Self {
            mode: "user".to_string(),
            pin: session
                .pin
                .as_ref()
                .map(|pin| pin.as_str().to_string())
                .unwrap_or_default(),
            admin_pass: String::new(),
            face_result: session.face.as_ref().map(|face| FaceBundle {
                matched: face.matched,
                name: face.label.clone(),
            }),
            fingerprint_result: session.fingerprint.map(|fingerprint| FingerprintBundle {
                matched: fingerprint.matched,
                fp_id: fingerprint.id.map(|id| id.as_u32()),
            }),
        }
    }
}

/// The endpoint's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub access_granted: bool,
    #[serde(default)]
    pub matched_user: Option<String>,
    #[serde(default)]
    pub score: u8,
}

/// Seam to the admission-decision service.
pub trait AdmissionClient: Send + Sync + 'static {
    /// Ask for a verdict on `bundle`. One attempt, no retries.
    fn evaluate(
        &self,
        bundle: &AdmissionBundle,
    ) -> impl Future<Output = Result<Verdict, AdmissionError>> + Send;
}

/// Build the HTTP client shared by the admission client and settings store.
///
/// # Errors
///
/// Returns `AdmissionError::Client` if the TLS backend cannot be set up.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, AdmissionError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdmissionError::Client(e.to_string()))
}

/// JSON-over-HTTP admission client.
#[derive(Debug, Clone)]
pub struct HttpAdmissionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpAdmissionClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AdmissionClient for HttpAdmissionClient {
    async fn evaluate(&self, bundle: &AdmissionBundle) -> Result<Verdict, AdmissionError> {
        let response = self
            .client
            .post(&self.url)
            .json(bundle)
            .send()
            .await
            .map_err(|e| AdmissionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdmissionError::Status(status.as_u16()));
        }

        response
            .json::<Verdict>()
            .await
            .map_err(|e| AdmissionError::InvalidResponse(e.to_string()))
    }
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Granted(Verdict),
    Denied(Verdict),
    /// No verdict could be obtained.
    Unavailable {
        attempts: u32,
        last_error: AdmissionError,
    },
}

impl SubmitOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, SubmitOutcome::Granted(_))
    }
}

/// Retry policy for submissions.
#[derive(Debug, Clone, Copy)]
pub struct SubmitterConfig {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub retry_delay: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_SUBMIT_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_SUBMIT_RETRY_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Sends ready sessions for a decision and clears them afterwards.
pub struct DecisionSubmitter<C, S> {
    client: C,
    aggregator: SessionAggregator<S>,
    config: SubmitterConfig,
}

impl<C: AdmissionClient, S: SettingsStore> DecisionSubmitter<C, S> {
    pub fn new(client: C, aggregator: SessionAggregator<S>, config: SubmitterConfig) -> Self {
        Self {
            client,
            aggregator,
            config,
        }
    }

    /// Request a verdict for `snapshot`, retrying transport failures.
    ///
    /// The session is reset exactly once when the attempt sequence ends,
    /// whether a verdict arrived or every attempt failed. A session started
    /// after `snapshot` was cleared in the meantime is left alone.
    pub async fn submit(&self, snapshot: &SessionSnapshot) -> SubmitOutcome {
        let bundle = AdmissionBundle::from(snapshot);
        let outcome = self.evaluate_with_retry(&bundle).await;
        self.aggregator
            .reset_if_current(snapshot, ResetReason::Submitted)
            .await;
        outcome
    }

    async fn evaluate_with_retry(&self, bundle: &AdmissionBundle) -> SubmitOutcome {
        let attempts = self.config.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.client.evaluate(bundle).await {
                Ok(verdict) if verdict.access_granted => {
                    info!(score = verdict.score, user = ?verdict.matched_user, "Access granted");
                    return SubmitOutcome::Granted(verdict);
                }
                Ok(verdict) => {
                    info!(score = verdict.score, "Access denied");
                    return SubmitOutcome::Denied(verdict);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(attempt, attempts, "Submission attempt failed: {}", e);
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, "Submission abandoned: {}", e);
                    return SubmitOutcome::Unavailable {
                        attempts: attempt,
                        last_error: e,
                    };
                }
            }
        }
    }
}
