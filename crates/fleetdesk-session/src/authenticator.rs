//! Phone and OTP challenge-response sign in

use crate::{
    backend::AuthBackend,
    error::{AuthError, AuthResult, ChallengeFailure},
    manager::SessionManager,
};
use fleetdesk_core::{Clock, config::AuthConfig};
use fleetdesk_types::{Challenge, Deadline, OtpCode, PhoneNumber, Role, Session};
use std::sync::Arc;
use tracing::{info, instrument};

/// Issues and verifies OTP challenges and owns the resulting session
///
/// Numbers on the configured bypass allowlist never reach the OTP backend when
/// a code is requested; they are answered locally with the configured
/// verification id. Verification with the configured code is forwarded to the
/// backend like any other.
#[derive(Debug, Clone)]
pub struct Authenticator {
    backend: Arc<dyn AuthBackend>,
    sessions: SessionManager,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl Authenticator {
    /// Create an authenticator
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        sessions: SessionManager,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            backend,
            sessions,
            clock,
            config,
        }
    }

    /// Session manager this authenticator writes to
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Clock used for challenge deadlines
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Validity window of a new challenge, in seconds
    #[must_use]
    pub const fn otp_window_secs(&self) -> u64 {
        self.config.otp_window_secs
    }

    /// Whether `phone` is an allowlisted test number
    #[must_use]
    pub fn is_bypass(&self, phone: &PhoneNumber) -> bool {
        self.config.bypass.contains(phone)
    }

    /// Hint shown on the OTP step for allowlisted numbers
    #[must_use]
    pub fn bypass_hint(&self, challenge: &Challenge) -> Option<String> {
        challenge
            .bypass
            .then(|| format!("Test number: use OTP {}", self.config.bypass.code))
    }

    /// Request an OTP for `phone_raw`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the phone does not normalize to ten
    /// digits, otherwise any error of the backend.
    #[instrument(skip(self, phone_raw), fields(role = %role))]
    pub async fn request_challenge(&self, phone_raw: &str, role: Role) -> AuthResult<Challenge> {
        let phone = PhoneNumber::parse(phone_raw)?;

        if self.is_bypass(&phone) {
            info!(phone = %phone.masked(), "test number, OTP not sent");
            return Ok(self.local_challenge(phone, role));
        }

        let otp = self.backend.send_otp(&phone, role).await?;
        info!(phone = %phone.masked(), "OTP sent");
        Ok(self.issue(phone, role, otp.verification_id, otp.attempts_remaining))
    }

    /// Verify `code_raw` against `challenge` and persist the session
    ///
    /// A failed attempt leaves `challenge` usable until it expires.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for a malformed code,
    /// [`AuthError::Challenge`] for a wrong or expired code, otherwise any
    /// backend or storage error.
    #[instrument(skip(self, challenge, code_raw), fields(role = %challenge.role, phone = %challenge.phone.masked()))]
    pub async fn verify_challenge(
        &self,
        challenge: &Challenge,
        code_raw: &str,
    ) -> AuthResult<Session> {
        let code = OtpCode::parse(code_raw)?;

        if challenge.is_expired(self.clock.now()) {
            return Err(AuthError::expired());
        }
        if challenge.bypass && code.as_str() != self.config.bypass.code {
            return Err(AuthError::Challenge {
                kind: ChallengeFailure::InvalidCode,
                message: format!("For test numbers, use OTP: {}", self.config.bypass.code),
            });
        }

        let session = self
            .backend
            .verify_otp(
                &challenge.phone,
                &challenge.verification_id,
                &code,
                challenge.role,
            )
            .await?;
        self.sessions.persist(&session)?;
        info!(user = %session.user.id, "signed in");
        Ok(session)
    }

    /// Replace an expired challenge with a fresh one
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ResendNotAllowed`] while the countdown is running,
    /// otherwise any backend error.
    #[instrument(skip(self, challenge), fields(role = %challenge.role, phone = %challenge.phone.masked()))]
    pub async fn resend_challenge(&self, challenge: &Challenge) -> AuthResult<Challenge> {
        let now = self.clock.now();
        if !challenge.can_resend(now) {
            return Err(AuthError::ResendNotAllowed {
                seconds_remaining: challenge.expires_in_seconds(now),
            });
        }

        let phone = challenge.phone.clone();
        if self.is_bypass(&phone) {
            return Ok(self.local_challenge(phone, challenge.role));
        }

        let otp = self.backend.resend_otp(&phone).await?;
        info!(phone = %phone.masked(), "OTP resent");
        Ok(self.issue(
            phone,
            challenge.role,
            otp.verification_id,
            otp.attempts_remaining,
        ))
    }

    /// The persisted session, if signed in
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.sessions.current()
    }

    /// Sign out, removing every persisted session key
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn logout(&self) -> AuthResult<()> {
        self.sessions.clear()
    }

    fn local_challenge(&self, phone: PhoneNumber, role: Role) -> Challenge {
        let mut challenge = self.issue(phone, role, self.config.bypass.verification_id.clone(), None);
        challenge.bypass = true;
        challenge
    }

    fn issue(
        &self,
        phone: PhoneNumber,
        role: Role,
        verification_id: String,
        attempts_remaining: Option<u32>,
    ) -> Challenge {
        Challenge {
            phone,
            role,
            verification_id,
            deadline: Deadline::after(self.clock.now(), self.config.otp_window_secs),
            attempts_remaining,
            bypass: false,
        }
    }
}
