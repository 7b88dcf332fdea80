//! Validation errors raised while constructing domain values

use thiserror::Error;

/// Input rejected before it reaches any backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Phone number did not normalize to exactly ten digits
    #[error("phone number must contain exactly 10 digits, found {found}")]
    InvalidPhone {
        /// Number of digits left after normalization
        found: usize,
    },

    /// OTP code was not exactly four digits
    #[error("OTP code must be exactly 4 digits")]
    InvalidOtp,

    /// Role string was not recognised
    #[error("unknown role: {value}")]
    UnknownRole {
        /// The rejected input
        value: String,
    },

    /// Coordinates outside the WGS84 range
    #[error("coordinates out of range: longitude {longitude}, latitude {latitude}")]
    CoordinatesOutOfRange {
        /// Longitude in degrees
        longitude: f64,
        /// Latitude in degrees
        latitude: f64,
    },

    /// A required identifier was empty
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the empty field
        field: &'static str,
    },
}

impl ValidationError {
    /// Message suitable for showing next to the offending input
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidPhone { .. } => "Please enter a valid 10-digit phone number".to_string(),
            Self::InvalidOtp => "Please enter the 4-digit OTP".to_string(),
            Self::UnknownRole { .. } => "Please select admin or franchise".to_string(),
            other => other.to_string(),
        }
    }
}
