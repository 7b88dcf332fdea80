//! Command failures

use fleetdesk_live::ChannelError;
use fleetdesk_session::{AuthError, StoreError};
use fleetdesk_types::ValidationError;
use thiserror::Error;

pub(crate) type CliResult<T> = Result<T, CliError>;

#[derive(Error, Debug)]
pub(crate) enum CliError {
    #[error(transparent)]
    Core(#[from] fleetdesk_core::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("not signed in; run `fleetdesk login` first")]
    NotSignedIn,

    #[error("live tracking is only available to admin sessions")]
    AdminOnly,

    #[error("input closed before sign-in finished")]
    InputClosed,

    #[error("no data directory for the session file; set session.path")]
    NoDataDir,
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Auth(err.into())
    }
}

impl CliError {
    /// Text shown to the operator
    pub(crate) fn user_message(&self) -> String {
        match self {
            Self::Auth(err) => err.user_message(),
            Self::Validation(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
