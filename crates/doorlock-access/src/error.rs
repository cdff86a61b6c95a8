//! Error types for the admission endpoint and settings store.

/// Failures talking to the admission-decision service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The request never got an HTTP response (refused, reset, timed out).
    #[error("Admission service unreachable: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error("Admission service returned HTTP {0}")]
    Status(u16),

    /// The service answered 2xx with a body that is not a verdict.
    #[error("Invalid admission response: {0}")]
    InvalidResponse(String),

    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl AdmissionError {
    /// Whether another attempt could succeed.
    ///
    /// Transport failures and error statuses are retried; a malformed body
    /// would just be malformed again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdmissionError::Transport(_) | AdmissionError::Status(_))
    }
}

impl From<reqwest::Error> for AdmissionError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            AdmissionError::Status(status.as_u16())
        } else if error.is_decode() {
            AdmissionError::InvalidResponse(error.to_string())
        } else if error.is_builder() {
            AdmissionError::Client(error.to_string())
        } else {
            AdmissionError::Transport(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AdmissionError::Transport("connection refused".into()), true)]
    #[case(AdmissionError::Status(503), true)]
    #[case(AdmissionError::InvalidResponse("missing field".into()), false)]
    #[case(AdmissionError::Client("tls".into()), false)]
    fn test_retryable(#[case] error: AdmissionError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            AdmissionError::Status(500).to_string(),
            "Admission service returned HTTP 500"
        );
    }
}
