//! One-time password codes

use crate::ValidationError;
use std::{fmt, str::FromStr};

/// Number of digits in an OTP code
pub const OTP_DIGITS: usize = 4;

/// A four digit verification code
///
/// The code is never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Validate a code entered by the user
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidOtp`] unless the trimmed input is
    /// exactly four ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.len() == OTP_DIGITS && trimmed.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ValidationError::InvalidOtp)
        }
    }

    /// The raw digits
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(****)")
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl FromStr for OtpCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
