//! Authenticated, role-scoped REST access

use crate::{
    error::{AuthError, AuthResult},
    manager::SessionManager,
};
use fleetdesk_core::config::ApiConfig;
use fleetdesk_protocol::ApiEnvelope;
use fleetdesk_types::{Role, Session};
use reqwest::{Client, RequestBuilder, StatusCode, header::AUTHORIZATION};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

/// Query parameter that restricts franchise sessions to their own records
pub const FRANCHISE_SCOPE_PARAM: &str = "franchiseId";

/// HTTP client for the data endpoints
///
/// Every request carries the session's bearer token. Franchise sessions have
/// `franchiseId=<user id>` appended so the backend scopes results; admin
/// requests are unscoped. A 401 from any endpoint ends the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    sessions: SessionManager,
}

impl ApiClient {
    /// Create a client from API configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, sessions: SessionManager) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sessions,
        })
    }

    /// `GET path?query`, returning the envelope payload
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Authorization`] without a session or on 401, and
    /// network, server or schema errors otherwise.
    #[instrument(skip(self, query))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AuthResult<T> {
        let session = self.session()?;
        let request = self.client.get(self.url(path));
        self.send(path, &session, request, query).await
    }

    /// `POST path` with a JSON body, returning the envelope payload
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::get_json`].
    #[instrument(skip(self, body))]
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> AuthResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let session = self.session()?;
        let request = self.client.post(self.url(path)).json(body);
        self.send(path, &session, request, &[]).await
    }

    fn session(&self) -> AuthResult<Session> {
        self.sessions.current().ok_or(AuthError::Authorization)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
        request: RequestBuilder,
        query: &[(&str, &str)],
    ) -> AuthResult<T> {
        let response = request
            .header(AUTHORIZATION, session.bearer())
            .query(&scoped_query(session, query))
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(path, status = status.as_u16(), "api response");

        if status == StatusCode::UNAUTHORIZED {
            if self.sessions.clear_if_token(&session.token)? {
                warn!(path, "session rejected by backend, signed out");
            }
            return Err(AuthError::Authorization);
        }

        let envelope = ApiEnvelope::<T>::decode(path, &bytes);
        if !status.is_success() {
            let message = envelope
                .as_ref()
                .map(|e| e.message_or(status.canonical_reason().unwrap_or("request failed")))
                .unwrap_or_else(|_| status.to_string());
            return Err(AuthError::server(status.as_u16(), message));
        }

        let envelope = envelope?;
        if !envelope.success {
            return Err(AuthError::server(
                status.as_u16(),
                envelope.message_or("request refused"),
            ));
        }
        Ok(envelope.into_data(path)?)
    }
}

/// Query pairs with the franchise scope applied
#[must_use]
pub fn scoped_query(session: &Session, query: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .filter(|(key, _)| *key != FRANCHISE_SCOPE_PARAM)
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    if session.role == Role::Franchise {
        pairs.push((FRANCHISE_SCOPE_PARAM.to_string(), session.user.id.clone()));
    }
    pairs
}
