//! Error types for login and authenticated requests

use fleetdesk_protocol::ProtocolError;
use fleetdesk_types::ValidationError;
use std::io;
use thiserror::Error;

/// Result type alias for session operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Why the backend refused an OTP code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeFailure {
    /// The code did not match
    InvalidCode,
    /// The challenge lapsed; a new code must be requested
    Expired,
}

/// Errors raised by the login flow and the authenticated API client
#[derive(Error, Debug)]
pub enum AuthError {
    /// Input rejected before any request was made
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Wrong, expired or unknown OTP challenge
    #[error("{message}")]
    Challenge {
        /// Failure reason
        kind: ChallengeFailure,
        /// Message for the operator
        message: String,
    },

    /// Too many OTP requests
    #[error("rate limited: {message}")]
    RateLimited {
        /// Backend message
        message: String,
    },

    /// The backend would not send a code to this number
    #[error("phone number rejected: {message}")]
    PhoneRejected {
        /// Backend message
        message: String,
    },

    /// The backend failed
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status
        status: u16,
        /// Backend message
        message: String,
    },

    /// The request did not complete
    #[error("network error: {message}")]
    Network {
        /// Transport failure
        message: String,
    },

    /// No session, or the backend answered 401 and the session was cleared
    #[error("not authorized; sign in again")]
    Authorization,

    /// Resend requested before the countdown finished
    #[error("a new code can be requested in {seconds_remaining}s")]
    ResendNotAllowed {
        /// Seconds left on the countdown
        seconds_remaining: u64,
    },

    /// Operation not valid on the current login step
    #[error("cannot {action} on step {step}")]
    InvalidTransition {
        /// Attempted operation
        action: &'static str,
        /// Current step name
        step: &'static str,
    },

    /// Response did not match the endpoint schema
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session storage failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Session storage failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("session store I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored data could not be encoded or decoded
    #[error("session store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// Create a challenge error, classifying expiry from the message
    pub fn challenge(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if message.to_ascii_lowercase().contains("expire") {
            ChallengeFailure::Expired
        } else {
            ChallengeFailure::InvalidCode
        };
        Self::Challenge { kind, message }
    }

    /// Create an expired challenge error
    pub fn expired() -> Self {
        Self::Challenge {
            kind: ChallengeFailure::Expired,
            message: "OTP has expired. Please request a new one".to_string(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid transition error
    pub const fn invalid_transition(action: &'static str, step: &'static str) -> Self {
        Self::InvalidTransition { action, step }
    }

    /// Whether the error ended the session
    pub const fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization)
    }

    /// Message suitable for showing to the operator
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.user_message(),
            Self::Challenge { message, .. }
            | Self::RateLimited { message }
            | Self::PhoneRejected { message } => message.clone(),
            Self::Server { .. } | Self::Protocol(_) => {
                "Something went wrong. Please try again".to_string()
            }
            Self::Network { .. } => {
                "Unable to reach the server. Check your connection and try again".to_string()
            }
            Self::Authorization => "Your session has expired. Please sign in again".to_string(),
            Self::ResendNotAllowed { seconds_remaining } => {
                format!("You can request a new OTP in {seconds_remaining}s")
            }
            Self::InvalidTransition { .. } | Self::Store(_) => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("request timed out")
        } else if err.is_connect() {
            Self::network(format!("connection failed: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}
