//! Phone number normalization

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of digits in a subscriber number
pub const PHONE_DIGITS: usize = 10;

/// A ten digit subscriber number with every formatting character removed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strip non-digits and keep at most the trailing ten digits.
    ///
    /// Country and trunk prefixes sit at the front of a dialled number, so the
    /// subscriber digits are the last ten.
    #[must_use]
    pub fn normalize(raw: &str) -> String {
        let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
        let skip = digits.len().saturating_sub(PHONE_DIGITS);
        digits.into_iter().skip(skip).collect()
    }

    /// Normalize and validate a phone number
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPhone`] unless exactly ten digits remain.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits = Self::normalize(raw);
        if digits.len() == PHONE_DIGITS {
            Ok(Self(digits))
        } else {
            Err(ValidationError::InvalidPhone {
                found: digits.len(),
            })
        }
    }

    /// The ten digits
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number with all but the last four digits hidden, for logs
    #[must_use]
    pub fn masked(&self) -> String {
        let visible = self.0.get(PHONE_DIGITS - 4..).unwrap_or_default();
        format!("******{visible}")
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}
