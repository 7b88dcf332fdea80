//! Typed access to the persisted session

use crate::{
    error::AuthResult,
    store::{SessionStore, keys},
};
use fleetdesk_types::{Role, Session, UserProfile};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Owner of the single active session
///
/// Every write to the session keys goes through here, so the cached value and
/// the store never disagree. Subscribers observe sign in and sign out.
#[derive(Debug, Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Arc<dyn SessionStore>,
    current: watch::Sender<Option<Session>>,
    writes: Mutex<()>,
}

impl SessionManager {
    /// Manager over `store`, seeded with whatever session it holds
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(store: Arc<dyn SessionStore>) -> AuthResult<Self> {
        let session = read_session(store.as_ref())?;
        let (current, _) = watch::channel(session);
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                current,
                writes: Mutex::new(()),
            }),
        })
    }

    /// The active session, if any
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.inner.current.borrow().clone()
    }

    /// Re-read the session from the store
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn reload(&self) -> AuthResult<Option<Session>> {
        let session = read_session(self.inner.store.as_ref())?;
        self.inner.current.send_replace(session.clone());
        Ok(session)
    }

    /// Persist a freshly issued session
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn persist(&self, session: &Session) -> AuthResult<()> {
        let _writes = self.inner.writes.lock();
        let store = self.inner.store.as_ref();
        store.set(keys::TOKEN, &session.token)?;
        store.set(keys::USER, &serde_json::to_string(&session.user).map_err(crate::StoreError::from)?)?;
        store.set(keys::USER_TYPE, session.role.as_str())?;
        match &session.refresh_token {
            Some(refresh) => store.set(keys::REFRESH_TOKEN, refresh)?,
            None => store.remove(keys::REFRESH_TOKEN)?,
        }

        info!(role = %session.role, user = %session.user.id, "session stored");
        self.inner.current.send_replace(Some(session.clone()));
        Ok(())
    }

    /// Remove every session key; safe to call when signed out
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear(&self) -> AuthResult<()> {
        let _writes = self.inner.writes.lock();
        self.clear_locked()
    }

    /// Clear the session only while it still carries `token`
    ///
    /// Returns whether the session was cleared. A newer sign-in survives a
    /// late rejection of the token it replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear_if_token(&self, token: &str) -> AuthResult<bool> {
        let _writes = self.inner.writes.lock();
        let matches = self
            .inner
            .current
            .borrow()
            .as_ref()
            .is_some_and(|session| session.token == token);
        if !matches {
            warn!("stale rejection ignored, session has changed");
            return Ok(false);
        }
        self.clear_locked()?;
        Ok(true)
    }

    fn clear_locked(&self) -> AuthResult<()> {
        let store = self.inner.store.as_ref();
        for key in keys::ALL {
            store.remove(key)?;
        }

        let previous = self.inner.current.send_replace(None);
        if previous.is_some() {
            info!("session cleared");
        }
        Ok(())
    }

    /// Observe session changes; the receiver starts at the current value
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.current.subscribe()
    }

    /// Application bundle stored next to the session
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds invalid JSON.
    pub fn data(&self) -> AuthResult<Option<serde_json::Value>> {
        self.inner
            .store
            .get(keys::DATA)?
            .map(|raw| serde_json::from_str(&raw).map_err(crate::StoreError::from))
            .transpose()
            .map_err(Into::into)
    }

    /// Replace the application bundle
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn set_data(&self, data: &serde_json::Value) -> AuthResult<()> {
        let raw = serde_json::to_string(data).map_err(crate::StoreError::from)?;
        self.inner.store.set(keys::DATA, &raw)?;
        Ok(())
    }
}

/// Assemble a session from its keys; partial or unreadable entries count as
/// signed out.
fn read_session(store: &dyn SessionStore) -> AuthResult<Option<Session>> {
    let (Some(token), Some(user), Some(user_type)) = (
        store.get(keys::TOKEN)?,
        store.get(keys::USER)?,
        store.get(keys::USER_TYPE)?,
    ) else {
        return Ok(None);
    };

    let role: Role = match user_type.parse() {
        Ok(role) => role,
        Err(e) => {
            warn!(error = %e, "stored session has an unknown role");
            return Ok(None);
        }
    };
    let user: UserProfile = match serde_json::from_str(&user) {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "stored session has an unreadable profile");
            return Ok(None);
        }
    };

    Ok(Some(Session {
        token,
        user,
        role,
        refresh_token: store.get(keys::REFRESH_TOKEN)?,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session(role: Role) -> Session {
        Session {
            token: "tok-1".to_string(),
            user: UserProfile::new("u-1"),
            role,
            refresh_token: Some("ref-1".to_string()),
        }
    }

    #[test]
    fn test_persist_writes_all_keys() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone()).unwrap();
        assert!(manager.current().is_none());

        manager.persist(&session(Role::Franchise)).unwrap();
        assert_eq!(store.get(keys::TOKEN).unwrap().as_deref(), Some("tok-1"));
        assert_eq!(store.get(keys::USER_TYPE).unwrap().as_deref(), Some("franchise"));
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("ref-1"));
        assert_eq!(manager.current(), Some(session(Role::Franchise)));
    }

    #[test]
    fn test_restart_restores_session() {
        let store = Arc::new(MemoryStore::new());
        SessionManager::new(store.clone())
            .unwrap()
            .persist(&session(Role::Admin))
            .unwrap();

        let restarted = SessionManager::new(store).unwrap();
        assert_eq!(restarted.current(), Some(session(Role::Admin)));
    }

    #[test]
    fn test_clear_removes_every_key() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone()).unwrap();
        manager.persist(&session(Role::Admin)).unwrap();
        manager.set_data(&json!({"theme": "dark"})).unwrap();

        manager.clear().unwrap();
        manager.clear().unwrap();

        assert!(manager.current().is_none());
        for key in keys::ALL {
            assert_eq!(store.get(key).unwrap(), None, "{key} should be removed");
        }
    }

    #[test]
    fn test_partial_session_counts_as_signed_out() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::TOKEN, "tok-1").unwrap();
        store.set(keys::USER_TYPE, "admin").unwrap();
        assert!(SessionManager::new(store.clone()).unwrap().current().is_none());

        store.set(keys::USER, "{broken").unwrap();
        assert!(SessionManager::new(store).unwrap().current().is_none());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new())).unwrap();
        let mut rx = manager.subscribe();
        assert!(rx.borrow_and_update().is_none());

        manager.persist(&session(Role::Admin)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_some());

        manager.clear().unwrap();
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_clear_if_token_keeps_newer_session() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new())).unwrap();
        manager.persist(&session(Role::Admin)).unwrap();

        assert!(!manager.clear_if_token("tok-0").unwrap());
        assert_eq!(manager.current(), Some(session(Role::Admin)));

        assert!(manager.clear_if_token("tok-1").unwrap());
        assert!(manager.current().is_none());
        assert!(!manager.clear_if_token("tok-1").unwrap());
    }

    #[test]
    fn test_data_bundle() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(manager.data().unwrap(), None);

        manager.set_data(&json!({"rides": 3})).unwrap();
        assert_eq!(manager.data().unwrap(), Some(json!({"rides": 3})));
    }
}
