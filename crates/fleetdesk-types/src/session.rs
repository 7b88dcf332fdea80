//! Authenticated operator session

use crate::{AdminId, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Profile returned by the backend after OTP verification
///
/// Only the identifier is required. Every field the backend adds beyond the
/// known ones is kept in `extra` so it round-trips through storage unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend identifier
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    /// Role as reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Registered phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Contact email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Remaining profile fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Profile with only an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
            name: None,
            phone: None,
            email: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// The single active session of this client
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token sent with every authenticated request
    pub token: String,

    /// Profile of the signed-in operator
    pub user: UserProfile,

    /// Console the operator signed in to
    pub role: Role,

    /// Token used to obtain a fresh bearer token, when issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Session {
    /// `Authorization` header value
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Identity to announce on the live channel, for admin sessions only
    #[must_use]
    pub fn admin_id(&self) -> Option<AdminId> {
        if self.role.is_admin() {
            AdminId::new(self.user.id.clone()).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .field("role", &self.role)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
