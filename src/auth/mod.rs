//! Authentication endpoints and the token refresh procedure.
//!
//! The backend holds the refresh credential server-side (cookie); the client
//! only ever handles the short-lived access token. Refresh is single-flight:
//! when several in-flight requests all hit an expired token, exactly one
//! refresh call reaches the backend and every pending retry reuses its
//! result.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::error::{request_failed, ApiError};
use crate::client::transport::{RequestBody, Transport, TransportRequest};
use crate::client::ApiClient;
use crate::session::{SessionStore, User};

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Coalesces concurrent token refreshes into one backend call.
///
/// Callers pass the token they just failed with. Inside the critical section
/// the coordinator first checks whether the store already holds a different
/// token; if so, another caller refreshed while this one was waiting and the
/// fresh token is returned without touching the network. A rejection is
/// coalesced the same way: the token whose refresh was rejected is remembered
/// under the lock, so queued callers presenting it share that outcome instead
/// of issuing their own refresh. The new token is committed to the store
/// before the lock is released, so every pending retry observes it.
pub struct RefreshCoordinator {
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    base_url: String,
    gate: tokio::sync::Mutex<RefreshState>,
}

#[derive(Default)]
struct RefreshState {
    /// Token whose most recent refresh attempt was rejected.
    failed_token: Option<String>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<SessionStore>, transport: Arc<dyn Transport>, base_url: String) -> Self {
        Self {
            store,
            transport,
            base_url,
            gate: tokio::sync::Mutex::new(RefreshState::default()),
        }
    }

    pub async fn refresh(&self, stale_token: &str) -> Result<String, ApiError> {
        let mut state = self.gate.lock().await;

        if let Some(current) = self.store.access_token() {
            if current != stale_token && !current.is_empty() {
                debug!("reusing token from a concurrent refresh");
                return Ok(current);
            }
        }

        if state.failed_token.as_deref() == Some(stale_token) {
            debug!("refresh for this token already rejected, sharing the outcome");
            return Err(ApiError::RefreshFailed(
                "refresh already rejected for this session".to_string(),
            ));
        }

        match self.request_refresh().await {
            Ok(token) => {
                state.failed_token = None;
                if self.store.is_authenticated() {
                    // Commit before releasing the gate so pending retries
                    // see the new token.
                    self.store.set_access_token(token.clone());
                } else {
                    debug!("session ended during refresh, not committing token");
                }
                debug!("access token refreshed");
                Ok(token)
            }
            Err(e) => {
                state.failed_token = Some(stale_token.to_string());
                Err(e)
            }
        }
    }

    async fn request_refresh(&self) -> Result<String, ApiError> {
        let request = TransportRequest {
            method: Method::POST,
            url: format!("{}/auth/refresh", self.base_url),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: RequestBody::Empty,
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;

        if !response.is_success() {
            let err = request_failed(response.status, &response.body);
            warn!(status = response.status, "token refresh rejected by backend");
            return Err(ApiError::RefreshFailed(err.to_string()));
        }

        let parsed: RefreshResponse = serde_json::from_slice(&response.body)
            .map_err(|_| ApiError::InvalidResponse {
                status: response.status,
            })?;
        Ok(parsed.access_token)
    }
}

/// Login, logout and profile endpoints.
pub struct AuthApi {
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>, store: Arc<SessionStore>) -> Self {
        Self { client, store }
    }

    /// Authenticate with credentials and seed the session store.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        self.store.set_loading(true);

        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let result: Result<LoginResponse, ApiError> = self
            .client
            .request_public(Method::POST, "/auth/login", Some(&body))
            .await;

        match result {
            Ok(response) => {
                self.store
                    .set_user(response.user.clone(), response.access_token);
                info!(username = %response.user.username, "logged in");
                Ok(response.user)
            }
            Err(e) => {
                self.store.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Fetch the authenticated user's profile.
    pub async fn profile(&self) -> Result<User, ApiError> {
        self.client
            .request::<User, ()>(Method::GET, "/auth/profile", None::<&()>)
            .await
    }

    /// End the session. The backend call is best-effort; the local session
    /// is cleared regardless of its outcome.
    pub async fn logout(&self) {
        let result: Result<serde_json::Value, ApiError> = self
            .client
            .request(Method::POST, "/auth/logout", None::<&()>)
            .await;
        if let Err(e) = result {
            debug!(error = %e, "logout request failed, clearing session anyway");
        }
        self.store.logout();
        info!("logged out");
    }
}
