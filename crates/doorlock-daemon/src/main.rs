//! `doorlockd`: runs every door lock component against one MQTT broker.

mod settings;
mod telemetry;

use anyhow::Context;
use doorlock_access::{
    AccessCoordinator, DecisionSubmitter, HttpAdmissionClient, HttpSettingsStore, KeypadListener,
    SessionAggregator, http_client,
};
use doorlock_bus::{EventLog, MqttBus};
use doorlock_door::{BellListener, DoorCommandListener, DoorController};
use doorlock_fingerprint::{CommandCorrelator, FingerprintListener};
use settings::Config;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        version = doorlock_core::VERSION,
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        admission = %config.admission.url,
        "Starting doorlockd"
    );

    let (bus, connection) = MqttBus::new(&config.mqtt.to_mqtt_config());
    let log = EventLog::with_topic(bus.clone(), &config.topics.logs);
    let mut tasks = JoinSet::new();
    tasks.spawn(async move {
        connection.run().await;
        Ok(())
    });

    // Access decisions
    let submitter_config = config.admission.submitter_config();
    let client = http_client(submitter_config.request_timeout)
        .context("Failed to build HTTP client")?;
    let settings = HttpSettingsStore::new(client.clone(), &config.admission.settings_url)
        .with_fallback(config.session.required_factors);
    let aggregator =
        SessionAggregator::with_config(settings, config.session.aggregator_config());
    let submitter = DecisionSubmitter::new(
        HttpAdmissionClient::new(client, &config.admission.url),
        aggregator.clone(),
        submitter_config,
    );
    let coordinator = AccessCoordinator::new(aggregator, submitter, log.clone())
        .with_command_topic(&config.topics.command);
    let (credentials, inputs) = mpsc::channel(config.session.channel_capacity);

    // Credential sources
    let correlator = CommandCorrelator::new(
        bus.clone(),
        config.fingerprint.correlator_config(&config.topics.command),
    );
    let fingerprints = FingerprintListener::new(correlator, credentials.clone(), log.clone())
        .with_topic(&config.topics.fingerprint_events);
    let keypad = KeypadListener::new(bus.clone(), credentials)
        .with_pin_length(config.keypad.pin_length)
        .with_topic(&config.topics.keypad);

    // Door and bell
    let door = DoorController::new(
        log.clone(),
        config.door.door_config(&config.topics.door_status),
    );
    let door_commands = DoorCommandListener::new(door).with_topic(&config.topics.command);
    let bell = BellListener::new(log)
        .with_topic(&config.topics.bell)
        .with_cooldown(config.door.bell_cooldown());

    tasks.spawn(async move {
        coordinator.run(inputs).await;
        Ok(())
    });
    tasks.spawn(fingerprints.run());
    tasks.spawn(keypad.run());
    tasks.spawn(door_commands.run());
    tasks.spawn(bell.run());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
        }
        Some(finished) = tasks.join_next() => {
            match finished {
                Ok(Ok(())) => error!("A component stopped unexpectedly"),
                Ok(Err(e)) => error!("A component failed: {}", e),
                Err(e) => error!("A component panicked: {}", e),
            }
        }
    }

    tasks.shutdown().await;
    info!("doorlockd stopped");
    Ok(())
}
