//! OTP auth backend

use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use fleetdesk_core::config::ApiConfig;
use fleetdesk_protocol::rest::{
    ApiEnvelope, AuthData, LOGIN_PATH, LoginRequest, OtpData, RESEND_OTP_PATH, ResendOtpRequest,
    VERIFY_OTP_PATH, VerifyOtpRequest,
};
use fleetdesk_types::{OtpCode, PhoneNumber, Role, Session};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument, warn};

/// The three OTP endpoints
///
/// Implementations map transport and status failures onto [`AuthError`] so
/// callers never see raw HTTP details.
#[async_trait]
pub trait AuthBackend: Send + Sync + fmt::Debug {
    /// Send an OTP to `phone` for a sign in to `role`
    async fn send_otp(&self, phone: &PhoneNumber, role: Role) -> AuthResult<OtpData>;

    /// Exchange a code for a session
    async fn verify_otp(
        &self,
        phone: &PhoneNumber,
        verification_id: &str,
        code: &OtpCode,
        role: Role,
    ) -> AuthResult<Session>;

    /// Send a fresh OTP to `phone`
    async fn resend_otp(&self, phone: &PhoneNumber) -> AuthResult<OtpData>;
}

/// [`AuthBackend`] speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    client: Client,
    base_url: String,
}

impl HttpAuthBackend {
    /// Create a backend from API configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Create a backend around an existing client
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B>(&self, endpoint: &'static str, body: &B) -> AuthResult<AuthData>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(endpoint, status = status.as_u16(), "auth response");

        let envelope = ApiEnvelope::<AuthData>::decode(endpoint, &bytes);
        if !status.is_success() {
            let message = envelope
                .as_ref()
                .ok()
                .and_then(|e| e.message.clone())
                .filter(|m| !m.trim().is_empty());
            return Err(classify_status(endpoint, status, message));
        }

        let envelope = envelope?;
        if !envelope.success {
            let message = envelope.message_or(default_message(endpoint));
            warn!(endpoint, %message, "auth request refused");
            return Err(refused(endpoint, message));
        }
        Ok(envelope.into_data(endpoint)?)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    #[instrument(skip(self, phone), fields(phone = %phone.masked()))]
    async fn send_otp(&self, phone: &PhoneNumber, role: Role) -> AuthResult<OtpData> {
        let data = self.post(LOGIN_PATH, &LoginRequest::new(phone, role)).await?;
        Ok(data.into_otp(LOGIN_PATH)?)
    }

    #[instrument(skip(self, phone, verification_id, code), fields(phone = %phone.masked()))]
    async fn verify_otp(
        &self,
        phone: &PhoneNumber,
        verification_id: &str,
        code: &OtpCode,
        role: Role,
    ) -> AuthResult<Session> {
        let body = VerifyOtpRequest {
            phone: phone.as_str().to_string(),
            verification_id: verification_id.to_string(),
            code: code.as_str().to_string(),
        };
        let data = self.post(VERIFY_OTP_PATH, &body).await?;
        Ok(data.into_session(role, VERIFY_OTP_PATH)?)
    }

    #[instrument(skip(self, phone), fields(phone = %phone.masked()))]
    async fn resend_otp(&self, phone: &PhoneNumber) -> AuthResult<OtpData> {
        let body = ResendOtpRequest {
            phone: phone.as_str().to_string(),
        };
        let data = self.post(RESEND_OTP_PATH, &body).await?;
        Ok(data.into_otp(RESEND_OTP_PATH)?)
    }
}

fn default_message(endpoint: &str) -> &'static str {
    if is_verify(endpoint) {
        "Invalid OTP. Please try again"
    } else {
        "Unable to send OTP to this number"
    }
}

fn is_verify(endpoint: &str) -> bool {
    endpoint == VERIFY_OTP_PATH
}

fn refused(endpoint: &str, message: String) -> AuthError {
    if is_verify(endpoint) {
        AuthError::challenge(message)
    } else {
        AuthError::PhoneRejected { message }
    }
}

fn classify_status(endpoint: &str, status: StatusCode, message: Option<String>) -> AuthError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return AuthError::RateLimited {
            message: message
                .unwrap_or_else(|| "Too many attempts. Please wait and try again".to_string()),
        };
    }
    if status.is_server_error() {
        let message = message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("server error")
                .to_string()
        });
        return AuthError::server(status.as_u16(), message);
    }
    if status.is_client_error() {
        return refused(
            endpoint,
            message.unwrap_or_else(|| default_message(endpoint).to_string()),
        );
    }
    AuthError::server(status.as_u16(), message.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChallengeFailure;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(LOGIN_PATH, StatusCode::TOO_MANY_REQUESTS, None),
            AuthError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(LOGIN_PATH, StatusCode::BAD_GATEWAY, None),
            AuthError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(LOGIN_PATH, StatusCode::BAD_REQUEST, None),
            AuthError::PhoneRejected { .. }
        ));
        assert!(matches!(
            classify_status(VERIFY_OTP_PATH, StatusCode::BAD_REQUEST, Some("OTP expired".into())),
            AuthError::Challenge {
                kind: ChallengeFailure::Expired,
                ..
            }
        ));
        assert!(matches!(
            classify_status(VERIFY_OTP_PATH, StatusCode::UNAUTHORIZED, None),
            AuthError::Challenge {
                kind: ChallengeFailure::InvalidCode,
                ..
            }
        ));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let backend = HttpAuthBackend::with_client(Client::new(), "http://api.test/v1/");
        assert_eq!(backend.base_url(), "http://api.test/v1");
    }
}
