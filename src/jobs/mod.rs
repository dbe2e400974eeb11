//! Background job status: bulk product, listing and inventory jobs.
//!
//! Jobs are created and advanced by the backend; the client only reads
//! status and requests cancellation. Progress is never mutated locally — the
//! backend is the sole source of truth, so after a cancel the poller is
//! asked to refresh instead of patching local state.

pub mod poller;

pub use poller::{JobStatusPoller, PollerHandle};

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::client::error::ApiError;
use crate::client::ApiClient;

/// Which bulk pipeline a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Product,
    Listing,
    Inventory,
}

impl JobKind {
    pub fn status_path(&self) -> &'static str {
        match self {
            JobKind::Product => "/products/status",
            JobKind::Listing => "/listings/status",
            JobKind::Inventory => "/inventory/status",
        }
    }

    pub fn cancel_path(&self, job_id: &str) -> String {
        match self {
            JobKind::Product => format!("/products/cancel/{job_id}"),
            JobKind::Listing => format!("/listings/cancel/{job_id}"),
            JobKind::Inventory => format!("/inventory/cancel/{job_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: String,
    pub kind: JobKind,
    pub status: JobState,
    /// 0..=100; out-of-range wire values are clamped.
    #[serde(deserialize_with = "clamp_progress")]
    pub progress: u8,
    pub total_items: u64,
    pub processed_items: u64,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub owner_user_id: Option<String>,
    #[serde(default)]
    pub owner_username: Option<String>,
}

fn clamp_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = u64::deserialize(deserializer)?;
    Ok(value.min(100) as u8)
}

/// One full view of all tracked jobs. Always replaced whole; never merged,
/// so interleaved fetches cannot leave a partially-updated view behind.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub products: Vec<JobStatus>,
    pub listings: Vec<JobStatus>,
    pub inventory: Vec<JobStatus>,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct StatusListResponse {
    jobs: Vec<JobStatus>,
}

pub struct JobsApi {
    client: Arc<ApiClient>,
}

impl JobsApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn status(&self, kind: JobKind) -> Result<Vec<JobStatus>, ApiError> {
        let response: StatusListResponse = self
            .client
            .request(Method::GET, kind.status_path(), None::<&()>)
            .await?;
        Ok(response.jobs)
    }

    /// Fetch all three status lists and assemble a full snapshot.
    pub async fn full_snapshot(&self) -> Result<StatusSnapshot, ApiError> {
        let (products, listings, inventory) = tokio::join!(
            self.status(JobKind::Product),
            self.status(JobKind::Listing),
            self.status(JobKind::Inventory),
        );
        Ok(StatusSnapshot {
            products: products?,
            listings: listings?,
            inventory: inventory?,
            fetched_at: Some(Utc::now()),
        })
    }

    /// Request cancellation of a running job. The job's final state arrives
    /// through the next status fetch.
    pub async fn cancel(&self, kind: JobKind, job_id: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .client
            .request(Method::POST, &kind.cancel_path(job_id), None::<&()>)
            .await?;
        Ok(())
    }
}
