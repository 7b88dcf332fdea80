//! Interactive sign-in over line input

use crate::error::{CliError, CliResult};
use fleetdesk_session::{LoginFlow, LoginStep};
use fleetdesk_types::{Role, Session};
use std::io::Write;
use tokio::io::{AsyncBufRead, Lines};
use tracing::debug;

/// One line typed by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    Back,
    Resend,
    Value(String),
}

impl Input {
    pub(crate) fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.eq_ignore_ascii_case("back") {
            Self::Back
        } else if line.eq_ignore_ascii_case("resend") {
            Self::Resend
        } else {
            Self::Value(line.to_string())
        }
    }
}

/// Drive `flow` until it is authenticated
///
/// `role` and `phone` pre-fill the first two steps; everything else is read
/// from `lines`.
pub(crate) async fn run<R>(
    flow: &mut LoginFlow,
    lines: &mut Lines<R>,
    role: Option<Role>,
    phone: Option<String>,
) -> CliResult<Session>
where
    R: AsyncBufRead + Unpin,
{
    let mut phone = phone;
    if let Some(role) = role {
        flow.confirm_role(role)?;
    }

    loop {
        match flow.step() {
            LoginStep::Authenticated => {
                return flow.session().cloned().ok_or(CliError::NotSignedIn);
            }
            LoginStep::SelectingRole => {
                let line = prompt(lines, "Sign in as (admin/franchise): ").await?;
                if let Input::Value(value) = Input::parse(&line) {
                    match value.parse::<Role>() {
                        Ok(role) => flow.confirm_role(role)?,
                        Err(e) => println!("{}", e.user_message()),
                    }
                }
            }
            LoginStep::EnteringPhone => {
                let line = match phone.take() {
                    Some(preset) => preset,
                    None => prompt(lines, "Phone number (or `back`): ").await?,
                };
                match Input::parse(&line) {
                    Input::Back => flow.back()?,
                    Input::Resend => println!("Enter a phone number first"),
                    Input::Value(raw) => {
                        if let Err(e) = flow.submit_phone(&raw).await {
                            debug!(error = %e, "phone step failed");
                        } else {
                            announce(flow);
                        }
                    }
                }
            }
            LoginStep::EnteringOtp => {
                let label = if flow.can_resend() {
                    "OTP (or `resend`, `back`): ".to_string()
                } else {
                    format!(
                        "OTP (resend in {}s, `back`): ",
                        flow.seconds_remaining()
                    )
                };
                let line = prompt(lines, &label).await?;
                match Input::parse(&line) {
                    Input::Back => flow.back()?,
                    Input::Resend => {
                        if let Err(e) = flow.resend().await {
                            debug!(error = %e, "resend failed");
                        } else {
                            println!("A new OTP has been sent");
                        }
                    }
                    Input::Value(code) => {
                        if let Err(e) = flow.submit_code(&code).await {
                            debug!(error = %e, "code rejected");
                        }
                    }
                }
            }
        }

        if let Some(error) = flow.error() {
            println!("{error}");
        }
    }
}

fn announce(flow: &LoginFlow) {
    if let Some(challenge) = flow.challenge() {
        println!(
            "OTP sent to {}. It expires in {}s.",
            challenge.phone.masked(),
            flow.seconds_remaining()
        );
        if let Some(remaining) = challenge.attempts_remaining {
            println!("{remaining} attempts remaining");
        }
    }
    if let Some(hint) = flow.hint() {
        println!("{hint}");
    }
}

async fn prompt<R>(lines: &mut Lines<R>, label: &str) -> CliResult<String>
where
    R: AsyncBufRead + Unpin,
{
    print!("{label}");
    std::io::stdout().flush()?;
    lines
        .next_line()
        .await?
        .map(|line| line.trim().to_string())
        .ok_or(CliError::InputClosed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use fleetdesk_core::{
        ManualClock,
        config::{ApiConfig, AuthConfig, BypassConfig},
    };
    use fleetdesk_session::{Authenticator, HttpAuthBackend, MemoryStore, SessionManager};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path},
    };

    fn flow(base_url: &str) -> LoginFlow {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        };
        LoginFlow::new(Arc::new(Authenticator::new(
            Arc::new(HttpAuthBackend::new(&config).unwrap()),
            SessionManager::new(Arc::new(MemoryStore::new())).unwrap(),
            Arc::new(ManualClock::default()),
            AuthConfig {
                bypass: BypassConfig::allowing(["8145328152"]),
                ..AuthConfig::default()
            },
        )))
    }

    #[test]
    fn test_input_commands() {
        assert_eq!(Input::parse(" back "), Input::Back);
        assert_eq!(Input::parse("RESEND"), Input::Resend);
        assert_eq!(
            Input::parse(" 98765 43210\n"),
            Input::Value("98765 43210".to_string())
        );
    }

    #[tokio::test]
    async fn test_scripted_bypass_sign_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verifyotp"))
            .and(body_partial_json(json!({"verificationId": "bypass-verification"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "accessToken": "access-1",
                    "userDetails": {"_id": "admin-1", "role": "admin"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let script: &[u8] = b"admin\n8145328152\n9999\n1234\n";
        let mut lines = BufReader::new(script).lines();
        let mut flow = flow(&server.uri());

        let session = run(&mut flow, &mut lines, None, None).await.unwrap();

        assert_eq!(session.role, Role::Admin);
        assert_eq!(session.user.id, "admin-1");
        assert_eq!(flow.step(), LoginStep::Authenticated);
    }

    #[tokio::test]
    async fn test_back_returns_to_phone_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verifyotp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "accessToken": "access-2",
                    "userDetails": {"_id": "fr-7", "role": "franchise"}
                }
            })))
            .mount(&server)
            .await;

        let script: &[u8] = b"back\n8145328152\n1234\n";
        let mut lines = BufReader::new(script).lines();
        let mut flow = flow(&server.uri());

        let session = run(
            &mut flow,
            &mut lines,
            Some(Role::Franchise),
            Some("8145328152".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(session.role, Role::Franchise);
    }

    #[tokio::test]
    async fn test_closed_input_aborts() {
        let script: &[u8] = b"admin\n";
        let mut lines = BufReader::new(script).lines();
        let mut flow = flow("http://127.0.0.1:1/api");

        match run(&mut flow, &mut lines, None, None).await {
            Err(CliError::InputClosed) => {}
            other => panic!("expected closed input, got {other:?}"),
        }
        assert_eq!(flow.step(), LoginStep::EnteringPhone);
    }
}
