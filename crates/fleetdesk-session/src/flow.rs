//! The four-step sign in flow

use crate::{
    authenticator::Authenticator,
    error::{AuthError, AuthResult},
};
use fleetdesk_core::Countdown;
use fleetdesk_types::{Challenge, Role, Session};
use std::{fmt, sync::Arc};
use tracing::debug;

/// Step of the sign in flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// Choosing admin or franchise
    SelectingRole,
    /// Typing the phone number
    EnteringPhone,
    /// Typing the OTP
    EnteringOtp,
    /// Signed in; terminal
    Authenticated,
}

impl LoginStep {
    /// Short name of the step
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelectingRole => "role",
            Self::EnteringPhone => "phone",
            Self::EnteringOtp => "otp",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives role selection, phone entry and OTP entry to a session
///
/// Operations that talk to the backend borrow the flow mutably, so only one
/// can be pending at a time and a response can never land on a step it was
/// not issued from. Dropping the returned future abandons the request without
/// changing the step.
///
/// Failures keep the current step and leave an operator facing message in
/// [`LoginFlow::error`].
#[derive(Debug)]
pub struct LoginFlow {
    auth: Arc<Authenticator>,
    step: LoginStep,
    role: Option<Role>,
    phone: String,
    otp: String,
    challenge: Option<Challenge>,
    countdown: Countdown,
    error: Option<String>,
    session: Option<Session>,
}

impl LoginFlow {
    /// Fresh flow on the role step
    #[must_use]
    pub fn new(auth: Arc<Authenticator>) -> Self {
        let countdown = Countdown::new(auth.clock());
        Self {
            auth,
            step: LoginStep::SelectingRole,
            role: None,
            phone: String::new(),
            otp: String::new(),
            challenge: None,
            countdown,
            error: None,
            session: None,
        }
    }

    /// Flow that skips straight to `Authenticated` when a session is persisted
    #[must_use]
    pub fn resume(auth: Arc<Authenticator>) -> Self {
        let mut flow = Self::new(auth);
        if let Some(session) = flow.auth.current_session() {
            debug!(role = %session.role, "resuming persisted session");
            flow.role = Some(session.role);
            flow.session = Some(session);
            flow.step = LoginStep::Authenticated;
        }
        flow
    }

    /// Current step
    #[must_use]
    pub const fn step(&self) -> LoginStep {
        self.step
    }

    /// Selected role
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        self.role
    }

    /// Last phone input
    #[must_use]
    pub fn phone_input(&self) -> &str {
        &self.phone
    }

    /// Last OTP input
    #[must_use]
    pub fn otp_input(&self) -> &str {
        &self.otp
    }

    /// Outstanding challenge
    #[must_use]
    pub const fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    /// Session once authenticated
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Message of the last failure, cleared by the next success
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Hint for test numbers while on the OTP step
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        if self.step != LoginStep::EnteringOtp {
            return None;
        }
        self.challenge
            .as_ref()
            .and_then(|challenge| self.auth.bypass_hint(challenge))
    }

    /// Resend countdown
    #[must_use]
    pub const fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// Seconds until a resend is allowed
    #[must_use]
    pub fn seconds_remaining(&self) -> u64 {
        self.countdown.seconds_remaining()
    }

    /// Whether a resend is allowed
    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.step == LoginStep::EnteringOtp && self.countdown.can_resend()
    }

    /// Confirm the role and move to phone entry
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidTransition`] outside the role step.
    pub fn confirm_role(&mut self, role: Role) -> AuthResult<()> {
        self.expect_step(LoginStep::SelectingRole, "confirm role")?;
        self.role = Some(role);
        self.error = None;
        self.step = LoginStep::EnteringPhone;
        Ok(())
    }

    /// Request an OTP and move to code entry
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidTransition`] outside the phone step, or the
    /// challenge request failure.
    pub async fn submit_phone(&mut self, raw: &str) -> AuthResult<()> {
        self.expect_step(LoginStep::EnteringPhone, "submit phone")?;
        let role = self.role_or_err("submit phone")?;
        raw.clone_into(&mut self.phone);

        let result = self.auth.request_challenge(raw, role).await;
        let challenge = self.record(result)?;
        self.countdown.track(challenge.deadline);
        self.otp.clear();
        self.challenge = Some(challenge);
        self.step = LoginStep::EnteringOtp;
        Ok(())
    }

    /// Verify a code; on success the flow is authenticated
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidTransition`] outside the OTP step, or the
    /// verification failure. The challenge is kept for another attempt.
    pub async fn submit_code(&mut self, raw: &str) -> AuthResult<Session> {
        self.expect_step(LoginStep::EnteringOtp, "submit code")?;
        let Some(challenge) = self.challenge.clone() else {
            return Err(AuthError::invalid_transition("submit code", self.step.as_str()));
        };
        raw.clone_into(&mut self.otp);

        let result = self.auth.verify_challenge(&challenge, raw).await;
        let session = self.record(result)?;
        self.countdown.reset();
        self.session = Some(session.clone());
        self.step = LoginStep::Authenticated;
        Ok(session)
    }

    /// Request a fresh code once the countdown has finished
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ResendNotAllowed`] while the countdown runs, or the
    /// resend failure.
    pub async fn resend(&mut self) -> AuthResult<()> {
        self.expect_step(LoginStep::EnteringOtp, "resend")?;
        let Some(challenge) = self.challenge.clone() else {
            return Err(AuthError::invalid_transition("resend", self.step.as_str()));
        };

        let result = self.auth.resend_challenge(&challenge).await;
        let fresh = self.record(result)?;
        self.countdown.track(fresh.deadline);
        self.otp.clear();
        self.challenge = Some(fresh);
        Ok(())
    }

    /// Go back one step, clearing the OTP buffer and the countdown
    ///
    /// On the role step this does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidTransition`] once authenticated.
    pub fn back(&mut self) -> AuthResult<()> {
        let previous = match self.step {
            LoginStep::SelectingRole | LoginStep::EnteringPhone => LoginStep::SelectingRole,
            LoginStep::EnteringOtp => LoginStep::EnteringPhone,
            LoginStep::Authenticated => {
                return Err(AuthError::invalid_transition("go back", self.step.as_str()));
            }
        };
        self.otp.clear();
        self.countdown.reset();
        self.challenge = None;
        self.error = None;
        self.step = previous;
        Ok(())
    }

    fn expect_step(&self, expected: LoginStep, action: &'static str) -> AuthResult<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(AuthError::invalid_transition(action, self.step.as_str()))
        }
    }

    fn role_or_err(&self, action: &'static str) -> AuthResult<Role> {
        self.role
            .ok_or_else(|| AuthError::invalid_transition(action, self.step.as_str()))
    }

    fn record<T>(&mut self, result: AuthResult<T>) -> AuthResult<T> {
        match result {
            Ok(value) => {
                self.error = None;
                Ok(value)
            }
            Err(err) => {
                debug!(step = %self.step, error = %err, "login step failed");
                self.error = Some(err.user_message());
                Err(err)
            }
        }
    }
}
