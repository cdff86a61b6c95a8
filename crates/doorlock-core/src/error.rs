use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Protocol errors
    #[error("Invalid device command: {0}")]
    InvalidCommand(String),

    #[error("Invalid fingerprint id: {0}")]
    InvalidFingerprintId(String),

    #[error("Unknown keypad key id: {0}")]
    UnknownKey(String),

    // Session errors
    #[error("Invalid credential input: {0}")]
    InvalidCredential(String),
}

pub type Result<T> = std::result::Result<T, Error>;
