//! Notification delivery errors

use thiserror::Error;

/// Failure to deliver a protection event
///
/// Logged by the engine and never allowed to change credential state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    /// Endpoint unreachable or timed out
    #[error("notification transport failed for {channel}: {reason}")]
    Transport { channel: String, reason: String },

    /// Endpoint answered with a non-success status
    #[error("notification rejected by {channel} with status {status}: {body}")]
    Rejected {
        channel: String,
        status: u16,
        body: String,
    },

    /// Event could not be encoded for the channel
    #[error("failed to encode notification for {channel}: {reason}")]
    Encode { channel: String, reason: String },
}

impl NotifyError {
    /// Channel the failure belongs to
    pub fn channel(&self) -> &str {
        match self {
            Self::Transport { channel, .. }
            | Self::Rejected { channel, .. }
            | Self::Encode { channel, .. } => channel,
        }
    }
}

/// Result type for notification delivery
pub type NotifyResult<T = ()> = Result<T, NotifyError>;
