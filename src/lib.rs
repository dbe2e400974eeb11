pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod jobs;
pub mod permissions;
pub mod session;

use std::sync::Arc;

use api::{BrandsApi, InventoryApi};
use auth::AuthApi;
use client::transport::Transport;
use client::ApiClient;
use config::Config;
use jobs::JobsApi;
use permissions::PermissionStore;
use session::SessionStore;

/// Wired-up application state shared by every consumer of the core.
pub struct AppState {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub permissions: Arc<PermissionStore>,
    pub client: Arc<ApiClient>,
    pub auth: AuthApi,
    pub brands: BrandsApi,
    pub inventory: InventoryApi,
    pub jobs: JobsApi,
}

impl AppState {
    pub fn new(config: Config, store: Arc<SessionStore>, transport: Arc<dyn Transport>) -> Self {
        let client = Arc::new(ApiClient::new(
            store.clone(),
            transport,
            config.api.base_url.clone(),
        ));
        Self {
            auth: AuthApi::new(client.clone(), store.clone()),
            brands: BrandsApi::new(client.clone()),
            inventory: InventoryApi::new(client.clone()),
            jobs: JobsApi::new(client.clone()),
            permissions: PermissionStore::new(),
            config,
            store,
            client,
        }
    }
}
