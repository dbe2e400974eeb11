//! Brand management endpoints.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::error::ApiError;
use crate::client::transport::FileUpload;
use crate::client::ApiClient;

/// A brand as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BrandInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrandListResponse {
    brands: Vec<Brand>,
}

pub struct BrandsApi {
    client: Arc<ApiClient>,
}

impl BrandsApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Brand>, ApiError> {
        let response: BrandListResponse = self
            .client
            .request(Method::GET, "/brands", None::<&()>)
            .await?;
        Ok(response.brands)
    }

    pub async fn create(&self, input: &BrandInput) -> Result<Brand, ApiError> {
        self.client
            .request(Method::POST, "/brands", Some(input))
            .await
    }

    /// Create brands in bulk from an uploaded file (single `file` field,
    /// multipart).
    pub async fn create_from_file(&self, upload: FileUpload) -> Result<Vec<Brand>, ApiError> {
        let response: BrandListResponse =
            self.client.upload(Method::POST, "/brands", upload).await?;
        Ok(response.brands)
    }

    pub async fn update(&self, id: &str, input: &BrandInput) -> Result<Brand, ApiError> {
        self.client
            .request(Method::PUT, &format!("/brands/{id}"), Some(input))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .client
            .request(Method::DELETE, &format!("/brands/{id}"), None::<&()>)
            .await?;
        Ok(())
    }
}
