//! Logger errors

use thiserror::Error;

/// Failure to set up logging
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogError {
    /// Filter directive did not parse
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed
    #[error("a global logger is already initialized")]
    AlreadyInitialized,
}

/// Result type for logger operations
pub type LogResult<T> = Result<T, LogError>;
