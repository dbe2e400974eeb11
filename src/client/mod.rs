//! Authenticated request client.
//!
//! One generic client carries every call to the backend: bearer header
//! injection, JSON parsing, structured error translation, and the
//! refresh-once-then-retry-once policy on expired tokens. Endpoint modules
//! (`api`, `auth`, `jobs`) are thin typed wrappers over it.

pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::RefreshCoordinator;
use crate::session::SessionStore;
use error::{request_failed, ApiError};
use transport::{FileUpload, RequestBody, Transport, TransportRequest};

pub struct ApiClient {
    base_url: String,
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    refresher: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresher =
            RefreshCoordinator::new(store.clone(), transport.clone(), base_url.clone());
        Self {
            base_url,
            store,
            transport,
            refresher,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make an authenticated JSON request.
    ///
    /// Fails fast with [`ApiError::Unauthenticated`] when no token is held;
    /// on a 401 caused by token expiry, refreshes once (single-flight across
    /// concurrent calls) and retries once. A failed retry surfaces
    /// [`ApiError::SessionExpired`] and logs the session out. Never more
    /// than one refresh, one retry, and one logout per call.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_with_headers(method, path, body, &[]).await
    }

    /// Same as [`request`](Self::request) with extra caller headers. Caller
    /// headers never override `Authorization`.
    pub async fn request_with_headers<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: &[(&str, &str)],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = match body {
            Some(value) => RequestBody::Json(
                serde_json::to_value(value).map_err(|e| ApiError::NetworkError(e.to_string()))?,
            ),
            None => RequestBody::Empty,
        };
        self.authed(method, path, body, headers).await
    }

    /// Upload a file to a multipart endpoint, with the same auth and retry
    /// semantics as [`request`](Self::request). No `Content-Type` header is
    /// set here; the transport owns the multipart boundary.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        upload: FileUpload,
    ) -> Result<T, ApiError> {
        self.authed(method, path, RequestBody::Multipart(upload), &[])
            .await
    }

    /// Make an unauthenticated request (login). No bearer header, no
    /// refresh, no retry.
    pub async fn request_public<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = match body {
            Some(value) => RequestBody::Json(
                serde_json::to_value(value).map_err(|e| ApiError::NetworkError(e.to_string()))?,
            ),
            None => RequestBody::Empty,
        };
        let request = self.build(method, path, body, None, &[]);
        self.dispatch(request).await
    }

    async fn authed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        headers: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let token = self
            .store
            .access_token()
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        let request = self.build(method.clone(), path, body.clone(), Some(&token), headers);
        let first = self.dispatch::<T>(request).await;

        let err = match first {
            Ok(value) => return Ok(value),
            Err(e) if e.is_token_expiry() => e,
            Err(e) => return Err(e),
        };
        debug!(path, error = %err, "access token rejected, attempting refresh");

        let new_token = match self.refresher.refresh(&token).await {
            Ok(t) => t,
            Err(e) => {
                warn!(path, error = %e, "token refresh failed, ending session");
                self.store.logout();
                return Err(ApiError::SessionExpired);
            }
        };

        let retry = self.build(method, path, body, Some(&new_token), headers);
        match self.dispatch::<T>(retry).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(path, error = %e, "retry after refresh failed, ending session");
                self.store.logout();
                Err(ApiError::SessionExpired)
            }
        }
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        token: Option<&str>,
        extra: &[(&str, &str)],
    ) -> TransportRequest {
        let mut headers: Vec<(String, String)> = Vec::new();
        headers.push(("Accept".into(), "application/json".into()));
        for (name, value) in extra {
            // Authorization is owned by the client, not the caller.
            if name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            headers.push(((*name).into(), (*value).into()));
        }
        if let Some(token) = token {
            headers.push(("Authorization".into(), format!("Bearer {token}")));
        }
        if matches!(body, RequestBody::Json(_)) {
            headers.push(("Content-Type".into(), "application/json".into()));
        }

        TransportRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body,
        }
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: TransportRequest,
    ) -> Result<T, ApiError> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if response.is_success() {
            serde_json::from_slice(&response.body).map_err(|_| ApiError::InvalidResponse {
                status: response.status,
            })
        } else {
            Err(request_failed(response.status, &response.body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Role, User};
    use super::testing::{MockTransport, StubResponse};

    #[derive(Debug, serde::Deserialize)]
    struct Widget {
        name: String,
    }

    fn authed_setup(token: &str) -> (Arc<SessionStore>, Arc<MockTransport>, ApiClient) {
        let store = SessionStore::new();
        store.set_user(
            User {
                id: "u-1".into(),
                username: "ama".into(),
                email: "ama@example.com".into(),
                role: Role::Admin,
            },
            token.into(),
        );
        let transport = Arc::new(MockTransport::new());
        let client = ApiClient::new(store.clone(), transport.clone(), "http://test");
        (store, transport, client)
    }

    #[tokio::test]
    async fn test_no_token_fails_without_network_call() {
        let store = SessionStore::new();
        let transport = Arc::new(MockTransport::new());
        let client = ApiClient::new(store, transport.clone(), "http://test");

        let err = client
            .request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_success_parses_json() {
        let (_store, transport, client) = authed_setup("tok-1");
        transport.stub(
            "/widgets",
            StubResponse::json(200, serde_json::json!({"name": "anvil"})),
        );

        let widget: Widget = client
            .request(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap();
        assert_eq!(widget.name, "anvil");

        let sent = transport.last_request_to("/widgets").unwrap();
        let auth: Vec<_> = sent
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("authorization"))
            .collect();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].1, "Bearer tok-1");
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_retries_once() {
        let (store, transport, client) = authed_setup("stale");
        transport.stub_fn("/widgets", |req| {
            let authed_fresh = req
                .headers
                .iter()
                .any(|(n, v)| n.eq_ignore_ascii_case("authorization") && v == "Bearer fresh");
            if authed_fresh {
                StubResponse::json(200, serde_json::json!({"name": "anvil"}))
            } else {
                StubResponse::json(
                    401,
                    serde_json::json!({"error": {"code": "token_expired", "message": "token expired"}}),
                )
            }
        });
        transport.stub(
            "/auth/refresh",
            StubResponse::json(200, serde_json::json!({"access_token": "fresh"})),
        );

        let widget: Widget = client
            .request(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap();

        assert_eq!(widget.name, "anvil");
        assert_eq!(transport.calls_to("/auth/refresh"), 1);
        assert_eq!(transport.calls_to("/widgets"), 2);
        assert_eq!(store.access_token().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_failed_retry_expires_session() {
        let (store, transport, client) = authed_setup("stale");
        transport.stub(
            "/widgets",
            StubResponse::json(
                401,
                serde_json::json!({"error": {"code": "token_expired", "message": "token expired"}}),
            ),
        );
        transport.stub(
            "/auth/refresh",
            StubResponse::json(200, serde_json::json!({"access_token": "fresh"})),
        );

        let err = client
            .request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::SessionExpired));
        assert!(!store.is_authenticated());
        // Exactly one retry: the original call plus one replay.
        assert_eq!(transport.calls_to("/widgets"), 2);
        assert_eq!(transport.calls_to("/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_expires_session_without_retry() {
        let (store, transport, client) = authed_setup("stale");
        transport.stub(
            "/widgets",
            StubResponse::json(
                401,
                serde_json::json!({"error": {"code": "token_expired", "message": "token expired"}}),
            ),
        );
        transport.stub(
            "/auth/refresh",
            StubResponse::json(
                401,
                serde_json::json!({"error": {"code": "refresh_expired", "message": "refresh expired"}}),
            ),
        );

        let err = client
            .request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::SessionExpired));
        assert!(!store.is_authenticated());
        assert_eq!(transport.calls_to("/widgets"), 1);
    }

    #[tokio::test]
    async fn test_plain_401_is_not_retried() {
        let (store, transport, client) = authed_setup("tok-1");
        transport.stub(
            "/widgets",
            StubResponse::json(
                401,
                serde_json::json!({"error": {"code": "forbidden_scope", "message": "missing scope"}}),
            ),
        );

        let err = client
            .request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RequestFailed { status: 401, .. }));
        assert_eq!(transport.calls_to("/widgets"), 1);
        assert_eq!(transport.calls_to("/auth/refresh"), 0);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let (_store, transport, client) = authed_setup("tok-1");
        transport.stub(
            "/widgets",
            StubResponse::json(
                500,
                serde_json::json!({"error": {"code": "internal_error", "message": "boom"}}),
            ),
        );

        let err = client
            .request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RequestFailed { status: 500, .. }));
        assert_eq!(transport.calls_to("/widgets"), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let (_store, transport, client) = authed_setup("tok-1");
        transport.stub("/widgets", StubResponse::network_error());

        let err = client
            .request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_invalid_response() {
        let (_store, transport, client) = authed_setup("tok-1");
        transport.stub("/widgets", StubResponse::raw(200, "<html>oops</html>"));

        let err = client
            .request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse { status: 200 }));
    }

    #[tokio::test]
    async fn test_caller_headers_cannot_override_authorization() {
        let (_store, transport, client) = authed_setup("tok-1");
        transport.stub(
            "/widgets",
            StubResponse::json(200, serde_json::json!({"name": "anvil"})),
        );

        let _: Widget = client
            .request_with_headers(
                Method::GET,
                "/widgets",
                None::<&()>,
                &[("Authorization", "Bearer forged"), ("X-Trace", "abc")],
            )
            .await
            .unwrap();

        let sent = transport.last_request_to("/widgets").unwrap();
        let auth: Vec<_> = sent
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("authorization"))
            .collect();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].1, "Bearer tok-1");
        assert!(sent.headers.iter().any(|(n, v)| n == "X-Trace" && v == "abc"));
    }

    #[tokio::test]
    async fn test_concurrent_expired_calls_refresh_once() {
        let (_store, transport, client) = authed_setup("stale");
        transport.stub_fn("/widgets", |req| {
            let authed_fresh = req
                .headers
                .iter()
                .any(|(n, v)| n.eq_ignore_ascii_case("authorization") && v == "Bearer fresh");
            if authed_fresh {
                StubResponse::json(200, serde_json::json!({"name": "anvil"}))
            } else {
                StubResponse::json(
                    401,
                    serde_json::json!({"error": {"code": "token_expired", "message": "token expired"}}),
                )
            }
        });
        transport.stub(
            "/auth/refresh",
            StubResponse::json(200, serde_json::json!({"access_token": "fresh"})),
        );

        let client = Arc::new(client);
        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let c = client.clone();
                tokio::spawn(async move {
                    c.request::<Widget, ()>(Method::GET, "/widgets", None::<&()>)
                        .await
                        .unwrap()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().name, "anvil");
        }
        assert_eq!(transport.calls_to("/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn test_multipart_upload_has_no_json_content_type() {
        let (_store, transport, client) = authed_setup("tok-1");
        transport.stub(
            "/brands",
            StubResponse::json(200, serde_json::json!({"name": "acme"})),
        );

        let _: Widget = client
            .upload(
                Method::POST,
                "/brands",
                FileUpload {
                    file_name: "logo.png".into(),
                    bytes: vec![0x89, 0x50, 0x4e, 0x47],
                },
            )
            .await
            .unwrap();

        let sent = transport.last_request_to("/brands").unwrap();
        assert!(!sent
            .headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case("content-type")));
        assert!(matches!(sent.body, RequestBody::Multipart(_)));
    }
}
