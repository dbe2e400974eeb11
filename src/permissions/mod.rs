//! Per-user permission grants.
//!
//! Permission data is authoritative only from the backend. This store is
//! in-memory only and is never persisted across reloads; a fresh process
//! starts empty and is populated from backend responses. Cleared on logout.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    Brand,
    Marketplace,
    ShippingPlatform,
}

/// A named grant within a category, with an enabled flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub name: String,
    pub enabled: bool,
}

pub type PermissionSet = HashMap<PermissionCategory, Vec<Grant>>;

pub struct PermissionStore {
    state: RwLock<PermissionSet>,
    tx: watch::Sender<PermissionSet>,
}

impl PermissionStore {
    pub fn new() -> Arc<Self> {
        let (tx, _) = watch::channel(PermissionSet::new());
        Arc::new(Self {
            state: RwLock::new(PermissionSet::new()),
            tx,
        })
    }

    /// Replace the grants for one category with a backend-supplied list.
    pub fn replace_category(&self, category: PermissionCategory, grants: Vec<Grant>) {
        let published = {
            let mut state = self.state.write();
            state.insert(category, grants);
            state.clone()
        };
        self.tx.send_replace(published);
    }

    /// Replace the whole set at once (e.g. from a profile response).
    pub fn replace_all(&self, set: PermissionSet) {
        *self.state.write() = set.clone();
        self.tx.send_replace(set);
    }

    /// Whether the named grant exists in the category and is enabled.
    pub fn has_grant(&self, category: PermissionCategory, name: &str) -> bool {
        self.state
            .read()
            .get(&category)
            .map(|grants| grants.iter().any(|g| g.name == name && g.enabled))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> PermissionSet {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PermissionSet> {
        self.tx.subscribe()
    }

    /// Drop all grants. Called on logout.
    pub fn clear(&self) {
        self.state.write().clear();
        self.tx.send_replace(PermissionSet::new());
    }
}
