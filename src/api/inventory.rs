//! Inventory endpoints: listing, per-item updates and bulk updates.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::error::ApiError;
use crate::client::transport::FileUpload;
use crate::client::ApiClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(default)]
    pub marketplace: Option<String>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Query parameters for the inventory listing.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

impl ListQuery {
    fn to_query_string(&self) -> String {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(format!("page={page}"));
        }
        if let Some(per_page) = self.per_page {
            params.push(format!("per_page={per_page}"));
        }
        if let Some(search) = &self.search {
            params.push(format!("search={}", urlencode(search)));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

// Minimal percent-encoding for the query component.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[derive(Debug, Deserialize)]
pub struct InventoryPage {
    pub items: Vec<InventoryItem>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct InventoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// One row of a bulk inventory update, keyed by SKU.
#[derive(Debug, Serialize)]
pub struct BulkUpdateRow {
    pub sku: String,
    pub quantity: i64,
}

/// Acknowledgement for a bulk update; progress is tracked through the job
/// status endpoints, not here.
#[derive(Debug, Deserialize)]
pub struct BulkUpdateAccepted {
    pub job_id: String,
}

pub struct InventoryApi {
    client: Arc<ApiClient>,
}

impl InventoryApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: ListQuery) -> Result<InventoryPage, ApiError> {
        let path = format!("/inventory{}", query.to_query_string());
        self.client.request(Method::GET, &path, None::<&()>).await
    }

    pub async fn update_item(
        &self,
        id: &str,
        update: &InventoryUpdate,
    ) -> Result<InventoryItem, ApiError> {
        self.client
            .request(Method::PUT, &format!("/inventory/{id}"), Some(update))
            .await
    }

    /// Submit a bulk update as JSON rows. The backend answers with the job
    /// id tracking the background work.
    pub async fn bulk_update(&self, rows: &[BulkUpdateRow]) -> Result<BulkUpdateAccepted, ApiError> {
        self.client
            .request(
                Method::POST,
                "/inventory/bulk/inventory/updates",
                Some(&rows),
            )
            .await
    }

    /// Submit a bulk update as an uploaded file (multipart `file` field).
    pub async fn bulk_update_from_file(
        &self,
        upload: FileUpload,
    ) -> Result<BulkUpdateAccepted, ApiError> {
        self.client
            .upload(Method::POST, "/inventory/bulk/inventory/updates", upload)
            .await
    }
}
