//! `whoami` and `logout`

use crate::app::App;
use crate::error::{CliError, CliResult};
use fleetdesk_types::Session;
use tracing::info;

const VISIBLE_TOKEN_CHARS: usize = 4;

/// Token with all but its last few characters hidden
pub(crate) fn redact_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= VISIBLE_TOKEN_CHARS * 2 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - VISIBLE_TOKEN_CHARS).collect();
    format!("{}{tail}", "*".repeat(count - VISIBLE_TOKEN_CHARS))
}

pub(crate) fn describe(session: &Session) -> Vec<(&'static str, String)> {
    let user = &session.user;
    let mut rows = vec![("role", session.role.to_string()), ("user", user.id.clone())];
    if let Some(name) = &user.name {
        rows.push(("name", name.clone()));
    }
    if let Some(phone) = &user.phone {
        rows.push(("phone", phone.clone()));
    }
    if let Some(email) = &user.email {
        rows.push(("email", email.clone()));
    }
    rows.push(("token", redact_token(&session.token)));
    rows
}

pub(crate) fn whoami(app: &App) -> CliResult<()> {
    let session = app.sessions.current().ok_or(CliError::NotSignedIn)?;
    for (label, value) in describe(&session) {
        println!("{label:>6}: {value}");
    }
    Ok(())
}

pub(crate) fn logout(app: &App) -> CliResult<()> {
    let was_signed_in = app.auth.current_session().is_some();
    app.auth.logout()?;
    if was_signed_in {
        info!("signed out");
        println!("Signed out");
    } else {
        println!("No session to clear");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetdesk_types::{Role, UserProfile};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token("abc"), "***");
        assert_eq!(redact_token("eyJhbGciOiJIUzI1NiJ9.x"), "******************J9.x");
        assert_eq!(redact_token(""), "");
    }

    #[test]
    fn test_describe_never_shows_token() {
        let mut user = UserProfile::new("admin-1");
        user.name = Some("Asha".to_string());
        let session = Session {
            token: "secret-access-token".to_string(),
            user,
            role: Role::Admin,
            refresh_token: Some("secret-refresh".to_string()),
        };

        let rows = describe(&session);

        assert_eq!(rows.first(), Some(&("role", "admin".to_string())));
        assert!(rows.contains(&("name", "Asha".to_string())));
        assert!(rows.iter().all(|(_, value)| !value.contains("secret")));
    }
}
