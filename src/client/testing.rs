//! In-memory transport for tests.
//!
//! Stubs are keyed by a path fragment matched against the request URL.
//! Closure stubs let a test vary the response on request contents (e.g.
//! which bearer token was sent), which keeps refresh-and-retry tests
//! independent of call ordering.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::transport::{Transport, TransportError, TransportRequest, TransportResponse};

type StubFn = Box<dyn Fn(&TransportRequest) -> StubResponse + Send + Sync>;

#[derive(Debug, Clone)]
pub enum StubResponse {
    Reply { status: u16, body: Bytes },
    NetworkError,
}

impl StubResponse {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        StubResponse::Reply {
            status,
            body: Bytes::from(value.to_string()),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        StubResponse::Reply {
            status,
            body: Bytes::from(body.to_string()),
        }
    }

    pub fn network_error() -> Self {
        StubResponse::NetworkError
    }
}

enum Stub {
    Fixed(StubResponse),
    Dynamic(StubFn),
}

#[derive(Default)]
pub struct MockTransport {
    stubs: Mutex<HashMap<String, Stub>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer requests matching `path` with `response`.
    pub fn stub(&self, path: &str, response: StubResponse) {
        self.stubs
            .lock()
            .insert(path.to_string(), Stub::Fixed(response));
    }

    /// Answer requests matching `path` by inspecting the request.
    pub fn stub_fn(
        &self,
        path: &str,
        f: impl Fn(&TransportRequest) -> StubResponse + Send + Sync + 'static,
    ) {
        self.stubs
            .lock()
            .insert(path.to_string(), Stub::Dynamic(Box::new(f)));
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(path))
            .count()
    }

    pub fn last_request_to(&self, path: &str) -> Option<TransportRequest> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|r| r.url.contains(path))
            .cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let response = {
            let stubs = self.stubs.lock();
            let stub = stubs
                .iter()
                .find(|(path, _)| request.url.contains(path.as_str()))
                .map(|(_, stub)| stub);
            match stub {
                Some(Stub::Fixed(r)) => r.clone(),
                Some(Stub::Dynamic(f)) => f(&request),
                None => StubResponse::raw(404, "no stub registered"),
            }
        };

        match response {
            StubResponse::Reply { status, body } => Ok(TransportResponse { status, body }),
            StubResponse::NetworkError => {
                Err(TransportError("connection refused (stubbed)".to_string()))
            }
        }
    }
}
