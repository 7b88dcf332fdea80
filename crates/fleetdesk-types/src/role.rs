//! Operator roles

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Which console the operator signs in to
///
/// Admins see every record; franchise operators only see their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Head office administrator
    Admin,
    /// Franchise operator
    Franchise,
}

impl Role {
    /// Wire name, also used as the persisted `userType`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Franchise => "franchise",
        }
    }

    /// Whether this role may observe live driver locations
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "franchise" => Ok(Self::Franchise),
            _ => Err(ValidationError::UnknownRole {
                value: s.to_string(),
            }),
        }
    }
}
