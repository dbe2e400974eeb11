//! Session state container.
//!
//! The store is the single owner of the current session. All mutation goes
//! through the methods below; consumers read snapshots or subscribe to a
//! watch channel for changes. Invariant: a published state with
//! `is_authenticated == true` always carries a non-empty token and a user.

pub mod persist;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use self::persist::SessionFile;

/// Role assigned to a console user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

/// The identity attached to an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Full session state as published to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub is_authenticated: bool,
    /// Transient: true while a login/profile fetch is in flight. Never
    /// persisted; always starts fresh per process.
    #[serde(skip)]
    pub is_loading: bool,
    /// Transient: last auth-related error message, for inline display.
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl Session {
    fn upholds_invariant(&self) -> bool {
        !self.is_authenticated
            || (self.user.is_some() && self.access_token.as_deref().is_some_and(|t| !t.is_empty()))
    }
}

/// The subset of the session that survives a reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub is_authenticated: bool,
}

pub struct SessionStore {
    state: Mutex<Session>,
    tx: watch::Sender<Session>,
    storage: Mutex<Option<SessionFile>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        let (tx, _) = watch::channel(Session::default());
        Arc::new(Self {
            state: Mutex::new(Session::default()),
            tx,
            storage: Mutex::new(None),
        })
    }

    /// Rehydrate from a persisted snapshot at startup.
    ///
    /// If both a user and a token are present the store publishes
    /// authenticated immediately, without any network call. A token that has
    /// silently expired server-side is caught by the first authenticated
    /// request instead. If either field is missing the session starts
    /// logged out.
    pub fn rehydrate(snapshot: Option<PersistedSession>) -> Arc<Self> {
        let store = Self::new();
        if let Some(saved) = snapshot {
            let authenticated = saved.user.is_some()
                && saved.access_token.as_deref().is_some_and(|t| !t.is_empty());
            store.mutate(|s| {
                s.user = saved.user;
                s.access_token = saved.access_token;
                s.is_authenticated = authenticated;
                s.is_loading = false;
            });
        }
        store
    }

    /// Attach durable storage. The persisted subset is written through on
    /// every mutation that changes it.
    pub fn attach_storage(&self, file: SessionFile) {
        *self.storage.lock() = Some(file);
    }

    /// Mark the session authenticated with a fresh identity and token.
    pub fn set_user(&self, user: User, access_token: String) {
        self.mutate(|s| {
            s.user = Some(user);
            s.access_token = Some(access_token);
            s.is_authenticated = true;
            s.is_loading = false;
            s.last_error = None;
        });
        self.write_through();
    }

    /// Replace the access token without touching the authentication flag.
    /// Used mid-refresh, before the pending retry is issued.
    pub fn set_access_token(&self, access_token: String) {
        self.mutate(|s| s.access_token = Some(access_token));
        self.write_through();
    }

    /// Clear the session. Never fails; storage errors are logged and
    /// swallowed so logout always completes.
    pub fn logout(&self) {
        self.mutate(|s| *s = Session::default());
        if let Some(file) = self.storage.lock().as_ref() {
            if let Err(e) = file.clear() {
                warn!(error = %e, "failed to clear persisted session");
            }
        }
    }

    pub fn set_loading(&self, loading: bool) {
        self.mutate(|s| s.is_loading = loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.mutate(|s| {
            s.last_error = error;
            s.is_loading = false;
        });
    }

    pub fn snapshot(&self) -> Session {
        self.state.lock().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.lock().access_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().is_authenticated
    }

    /// Subscribe to session changes. The receiver always holds the latest
    /// published state.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    fn mutate(&self, f: impl FnOnce(&mut Session)) {
        let published = {
            let mut state = self.state.lock();
            f(&mut state);
            if !state.upholds_invariant() {
                warn!("session invariant violated, forcing logged-out state");
                state.is_authenticated = false;
            }
            state.clone()
        };
        self.tx.send_replace(published);
    }

    fn write_through(&self) {
        let snapshot = {
            let state = self.state.lock();
            PersistedSession {
                user: state.user.clone(),
                access_token: state.access_token.clone(),
                is_authenticated: state.is_authenticated,
            }
        };
        if let Some(file) = self.storage.lock().as_ref() {
            if let Err(e) = file.save(&snapshot) {
                warn!(error = %e, "failed to persist session");
            }
        }
    }
}
