//! Live channel errors

use fleetdesk_protocol::FrameError;
use fleetdesk_types::RideId;
use thiserror::Error;

/// Result type alias for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Failures of the live location channel
///
/// None of these affect the REST session; callers surface them and carry on.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Channel URL is not http(s) or ws(s)
    #[error("invalid channel URL: {url}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
    },

    /// Transport could not be established or was lost
    #[error("channel connection to {url} failed: {message}")]
    Connect {
        /// Engine URL
        url: String,
        /// Failure detail
        message: String,
    },

    /// The server refused the namespace connection
    #[error("channel connection refused: {message}")]
    Rejected {
        /// Server message
        message: String,
    },

    /// Every connection attempt failed
    #[error("channel unavailable after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure
        last: String,
    },

    /// Operation needs a live connection
    #[error("channel is not connected")]
    NotConnected,

    /// Location requested before an observer was registered
    #[error("no observer registered on this connection")]
    NotRegistered,

    /// Channel was torn down while waiting
    #[error("channel closed")]
    Closed,

    /// No push for the ride arrived in time
    #[error("no location for ride {ride_id} within {seconds}s")]
    Timeout {
        /// Requested ride
        ride_id: RideId,
        /// Timeout in seconds
        seconds: u64,
    },

    /// The server could not locate the driver
    #[error("location unavailable for ride {ride_id}: {message}")]
    Unavailable {
        /// Requested ride
        ride_id: RideId,
        /// Server message
        message: String,
    },

    /// Malformed frame
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl ChannelError {
    /// Create a connection error
    pub fn connect(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Whether another connection attempt may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Frame(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retryable() {
        assert!(ChannelError::connect("ws://x", "refused").is_retryable());
        assert!(
            !ChannelError::Rejected {
                message: "unauthorized".into()
            }
            .is_retryable()
        );
        assert!(!ChannelError::NotRegistered.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ChannelError::Exhausted {
                attempts: 3,
                last: "refused".into()
            }
            .to_string(),
            "channel unavailable after 3 attempts: refused"
        );
    }
}
