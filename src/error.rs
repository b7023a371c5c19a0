//! Error types for the spam sieve.

use crate::pipeline::types::MsgId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures reported by the external collaborators.
///
/// Stages log these and drop the affected items; they never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("User lookup failed for {identifier}: {reason}")]
    LookupFailed { identifier: String, reason: String },

    #[error("Message listing failed for batch of {batch_len} user(s): {reason}")]
    BatchListFailed { batch_len: usize, reason: String },

    #[error("Spam classification failed for message {msg_id}: {reason}")]
    ClassifyFailed { msg_id: MsgId, reason: String },
}

/// Result line parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed result line {line:?}: {reason}")]
    MalformedLine { line: String, reason: String },

    #[error("Invalid message id {0:?}")]
    InvalidMsgId(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
