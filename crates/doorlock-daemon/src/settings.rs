use std::collections::HashMap;
use std::time::Duration;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use doorlock_access::{AggregatorConfig, SubmitterConfig};
use doorlock_bus::MqttConfig;
use doorlock_core::constants::{
    DEFAULT_BELL_COOLDOWN_MS, DEFAULT_ENROLL_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_LIST_TIMEOUT_SECS, DEFAULT_PIN_LENGTH, DEFAULT_RECONNECT_BACKOFF_MS,
    DEFAULT_RELOCK_AFTER_SECS, DEFAULT_REQUIRED_FACTORS, DEFAULT_RESPONSE_COOLDOWN_MS,
    DEFAULT_SESSION_TIMEOUT_SECS, DEFAULT_SUBMIT_ATTEMPTS, DEFAULT_SUBMIT_RETRY_DELAY_MS,
    TOPIC_BELL, TOPIC_DEVICE_COMMAND, TOPIC_DOOR_STATUS, TOPIC_FINGERPRINT_EVENTS, TOPIC_KEYPAD,
    TOPIC_LOGS,
};
use doorlock_door::DoorConfig;
use doorlock_fingerprint::CorrelatorConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mqtt: MqttSettings,
    pub topics: TopicSettings,
    pub session: SessionSettings,
    pub fingerprint: FingerprintSettings,
    pub admission: AdmissionSettings,
    pub door: DoorSettings,
    pub keypad: KeypadSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    /// Prefix of the client id; a random suffix keeps ids unique.
    pub client_prefix: String,
    pub keep_alive_secs: u64,
    pub reconnect_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicSettings {
    pub command: String,
    pub fingerprint_events: String,
    pub keypad: String,
    pub bell: String,
    pub door_status: String,
    pub logs: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub timeout_secs: u64,
    /// Used when the settings service cannot be reached.
    pub required_factors: u8,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintSettings {
    pub enroll_timeout_secs: u64,
    pub list_timeout_secs: u64,
    pub response_cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionSettings {
    pub url: String,
    pub settings_url: String,
    pub attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoorSettings {
    pub relock_after_secs: u64,
    pub bell_cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeypadSettings {
    pub pin_length: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    /// Defaults, then `config/doorlock.*` if present, then either the given
    /// overrides or `DOORLOCK_<SECTION>__<KEY>` environment variables.
    pub fn load_with_sources(
        overrides: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("mqtt.host", "localhost")?
            .set_default("mqtt.port", 1883)?
            .set_default("mqtt.client_prefix", "doorlockd")?
            .set_default("mqtt.keep_alive_secs", 30)?
            .set_default("mqtt.reconnect_backoff_ms", DEFAULT_RECONNECT_BACKOFF_MS)?
            .set_default("topics.command", TOPIC_DEVICE_COMMAND)?
            .set_default("topics.fingerprint_events", TOPIC_FINGERPRINT_EVENTS)?
            .set_default("topics.keypad", TOPIC_KEYPAD)?
            .set_default("topics.bell", TOPIC_BELL)?
            .set_default("topics.door_status", TOPIC_DOOR_STATUS)?
            .set_default("topics.logs", TOPIC_LOGS)?
            .set_default("session.timeout_secs", DEFAULT_SESSION_TIMEOUT_SECS)?
            .set_default("session.required_factors", i64::from(DEFAULT_REQUIRED_FACTORS))?
            .set_default("session.channel_capacity", 32)?
            .set_default("fingerprint.enroll_timeout_secs", DEFAULT_ENROLL_TIMEOUT_SECS)?
            .set_default("fingerprint.list_timeout_secs", DEFAULT_LIST_TIMEOUT_SECS)?
            .set_default("fingerprint.response_cooldown_ms", DEFAULT_RESPONSE_COOLDOWN_MS)?
            .set_default("admission.url", "http://localhost:8000/access/")?
            .set_default("admission.settings_url", "http://localhost:8000/admin/settings")?
            .set_default("admission.attempts", i64::from(DEFAULT_SUBMIT_ATTEMPTS))?
            .set_default("admission.retry_delay_ms", DEFAULT_SUBMIT_RETRY_DELAY_MS)?
            .set_default("admission.request_timeout_secs", DEFAULT_HTTP_TIMEOUT_SECS)?
            .set_default("door.relock_after_secs", DEFAULT_RELOCK_AFTER_SECS)?
            .set_default("door.bell_cooldown_ms", DEFAULT_BELL_COOLDOWN_MS)?
            .set_default("keypad.pin_length", DEFAULT_PIN_LENGTH as i64)?
            .add_source(File::with_name("config/doorlock").required(false));

        // Explicit overrides replace the process environment so tests do not
        // depend on it.
        if let Some(vars) = overrides {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // DOORLOCK_MQTT__HOST, DOORLOCK_ADMISSION__URL, ...
            builder = builder.add_source(
                Environment::with_prefix("DOORLOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        builder.build()?.try_deserialize()
    }
}

impl MqttSettings {
    pub fn to_mqtt_config(&self) -> MqttConfig {
        MqttConfig {
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            reconnect_backoff: Duration::from_millis(self.reconnect_backoff_ms),
            ..MqttConfig::new(&self.host, self.port, &self.client_prefix)
        }
    }
}

impl SessionSettings {
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            inactivity_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl FingerprintSettings {
    pub fn correlator_config(&self, command_topic: &str) -> CorrelatorConfig {
        CorrelatorConfig {
            enroll_timeout: Duration::from_secs(self.enroll_timeout_secs),
            list_timeout: Duration::from_secs(self.list_timeout_secs),
            cooldown: Duration::from_millis(self.response_cooldown_ms),
            command_topic: command_topic.to_string(),
        }
    }
}

impl AdmissionSettings {
    pub fn submitter_config(&self) -> SubmitterConfig {
        SubmitterConfig {
            attempts: self.attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl DoorSettings {
    pub fn door_config(&self, status_topic: &str) -> DoorConfig {
        DoorConfig {
            relock_after: Duration::from_secs(self.relock_after_secs),
            status_topic: status_topic.to_string(),
        }
    }

    pub fn bell_cooldown(&self) -> Duration {
        Duration::from_millis(self.bell_cooldown_ms)
    }
}
