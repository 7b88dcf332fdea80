//! Sign in, session persistence and authenticated REST access for the
//! `FleetDesk` client
//!
//! - [`Authenticator`] issues and verifies OTP challenges against an
//!   [`AuthBackend`], honouring the configured test number allowlist.
//! - [`LoginFlow`] walks an operator through role, phone and OTP entry.
//! - [`SessionManager`] owns the single persisted [`Session`] on top of a
//!   [`SessionStore`].
//! - [`ApiClient`] attaches the bearer token, scopes franchise queries and
//!   signs out on 401.
//!
//! [`Session`]: fleetdesk_types::Session

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod api;
pub mod authenticator;
pub mod backend;
pub mod error;
pub mod flow;
pub mod manager;
pub mod store;

pub use api::ApiClient;
pub use authenticator::Authenticator;
pub use backend::{AuthBackend, HttpAuthBackend};
pub use error::{AuthError, AuthResult, ChallengeFailure, StoreError};
pub use flow::{LoginFlow, LoginStep};
pub use manager::SessionManager;
pub use store::{FileStore, MemoryStore, SessionStore};
