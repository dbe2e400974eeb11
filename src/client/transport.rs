//! Transport seam between the request client and the wire.
//!
//! Production traffic goes through [`HttpTransport`] (reqwest); tests swap in
//! an in-memory implementation to script backend behavior.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Request body shapes the backend accepts.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    /// JSON payload, sent with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Multipart form upload with a single `file` field. The boundary header
    /// is left to the transport layer.
    Multipart(FileUpload),
}

/// A file destined for a multipart upload endpoint.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A fully-resolved outbound request. Cloneable so the client can replay it
/// once after a token refresh.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

/// The raw response handed back to the client for parsing.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure: no response reached us at all.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Abstraction over the HTTP layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed production transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(upload) => {
                let part = reqwest::multipart::Part::bytes(upload.bytes)
                    .file_name(upload.file_name);
                builder.multipart(reqwest::multipart::Form::new().part("file", part))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}
