//! Request and response schemas of the OTP auth endpoints
//!
//! Every auth response shares one envelope:
//! `{success, message, data: {accessToken, refreshToken?, userDetails, otpdata: {verificationId}}}`.

use crate::ProtocolError;
use fleetdesk_types::{PhoneNumber, Role, Session, UserProfile};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

/// Sends an OTP to a phone number
pub const LOGIN_PATH: &str = "/auth/login";

/// Exchanges an OTP for a session
pub const VERIFY_OTP_PATH: &str = "/auth/verifyotp";

/// Sends a fresh OTP for the same phone number
pub const RESEND_OTP_PATH: &str = "/auth/resend_otp";

/// Body of `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Ten digit phone number
    pub phone: String,
    /// Requested console
    pub role: Role,
    /// Role flag for admin sign in
    pub is_admin: bool,
    /// Role flag for franchise sign in
    pub is_franchise: bool,
}

impl LoginRequest {
    /// Build the body for a role
    #[must_use]
    pub fn new(phone: &PhoneNumber, role: Role) -> Self {
        Self {
            phone: phone.as_str().to_string(),
            role,
            is_admin: role == Role::Admin,
            is_franchise: role == Role::Franchise,
        }
    }
}

/// Body of `POST /auth/verifyotp`
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    /// Ten digit phone number
    pub phone: String,
    /// Handle returned when the OTP was sent
    pub verification_id: String,
    /// Four digit code
    pub code: String,
}

impl fmt::Debug for VerifyOtpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyOtpRequest")
            .field("phone", &self.phone)
            .field("verification_id", &self.verification_id)
            .field("code", &"****")
            .finish()
    }
}

/// Body of `POST /auth/resend_otp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResendOtpRequest {
    /// Ten digit phone number
    pub phone: String,
}

/// Common response envelope
///
/// `success` defaults to `true` when the backend omits it, leaving the HTTP
/// status as the deciding signal.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the backend accepted the request
    #[serde(default = "default_success")]
    pub success: bool,

    /// Human readable status message
    #[serde(default)]
    pub message: Option<String>,

    /// Endpoint specific payload
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

const fn default_success() -> bool {
    true
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    /// Parse a response body
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the body is not an envelope.
    pub fn decode(endpoint: &str, body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::malformed(endpoint, e))
    }
}

impl<T> ApiEnvelope<T> {
    /// Backend message, or `fallback` when there is none
    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// Payload of a successful response
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] when `data` is absent.
    pub fn into_data(self, endpoint: &str) -> Result<T, ProtocolError> {
        self.data.ok_or_else(|| ProtocolError::missing(endpoint, "data"))
    }
}

/// `data` of the auth endpoints
#[derive(Clone, Default, Deserialize)]
pub struct AuthData {
    /// Bearer token, present after verification
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,

    /// Refresh token, when issued
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,

    /// Signed in profile, present after verification
    #[serde(rename = "userDetails", default)]
    pub user_details: Option<UserProfile>,

    /// Challenge handle, present after login and resend
    #[serde(default)]
    pub otpdata: Option<OtpData>,
}

impl fmt::Debug for AuthData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthData")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user_details", &self.user_details)
            .field("otpdata", &self.otpdata)
            .finish()
    }
}

/// Challenge handle inside `otpdata`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpData {
    /// Handle to send back with the code
    pub verification_id: String,

    /// Validity window announced by the backend, in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// Verification attempts left, when the backend tracks them
    #[serde(default)]
    pub attempts_remaining: Option<u32>,
}

impl AuthData {
    /// Challenge handle of a login or resend response
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] without `otpdata.verificationId`.
    pub fn into_otp(self, endpoint: &str) -> Result<OtpData, ProtocolError> {
        self.otpdata
            .filter(|otp| !otp.verification_id.is_empty())
            .ok_or_else(|| ProtocolError::missing(endpoint, "data.otpdata.verificationId"))
    }

    /// Session described by a verification response
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] without a token or profile.
    pub fn into_session(self, role: Role, endpoint: &str) -> Result<Session, ProtocolError> {
        let token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProtocolError::missing(endpoint, "data.accessToken"))?;
        let user = self
            .user_details
            .ok_or_else(|| ProtocolError::missing(endpoint, "data.userDetails"))?;

        Ok(Session {
            token,
            user,
            role,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}
