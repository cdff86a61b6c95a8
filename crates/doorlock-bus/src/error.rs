//! Error types for bus operations.

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur while talking to the message bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The transport is currently not connected to the broker.
    #[error("Bus disconnected")]
    Disconnected,

    /// The publish request could not be handed to the transport.
    #[error("Publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    /// The subscribe request could not be handed to the transport.
    #[error("Subscribe to '{topic}' failed: {message}")]
    Subscribe { topic: String, message: String },
}

impl BusError {
    /// Create a new publish error.
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a new subscribe error.
    pub fn subscribe(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_display() {
        let error = BusError::publish("device/command", "request queue full");
        assert_eq!(
            error.to_string(),
            "Publish to 'device/command' failed: request queue full"
        );
    }

    #[test]
    fn test_disconnected_display() {
        assert_eq!(BusError::Disconnected.to_string(), "Bus disconnected");
    }
}
