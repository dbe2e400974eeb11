//! Job status polling loop.
//!
//! Fetches the full status snapshot once on start, then on a fixed interval
//! while the session stays valid. A visibility notification (the host view
//! regaining focus) triggers an immediate out-of-band fetch and resets the
//! interval so the same tick is not fetched twice. One task owns the loop,
//! so fetches never overlap. Transient fetch failures are logged and do not
//! stop the schedule; a shutdown signal or an invalidated session does.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{JobsApi, StatusSnapshot};
use crate::session::SessionStore;

pub struct JobStatusPoller {
    api: JobsApi,
    store: Arc<SessionStore>,
    poll_interval: Duration,
    snapshot_tx: watch::Sender<Option<StatusSnapshot>>,
    visibility: Arc<Notify>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Control surface handed to the owning view.
#[derive(Clone)]
pub struct PollerHandle {
    visibility: Arc<Notify>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    snapshot_rx: watch::Receiver<Option<StatusSnapshot>>,
}

impl PollerHandle {
    /// Signal that the hosting view became visible again; the poller fetches
    /// immediately instead of waiting for the next tick.
    pub fn notify_visible(&self) {
        self.visibility.notify_one();
    }

    /// Ask for an immediate refresh (used after a successful cancel, where
    /// the backend owns the job's new state).
    pub fn refresh_now(&self) {
        self.visibility.notify_one();
    }

    /// Tear the poller down. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Subscribe to published snapshots. Holds `None` until the first
    /// successful fetch.
    pub fn snapshots(&self) -> watch::Receiver<Option<StatusSnapshot>> {
        self.snapshot_rx.clone()
    }
}

impl JobStatusPoller {
    pub fn new(
        api: JobsApi,
        store: Arc<SessionStore>,
        poll_interval: Duration,
    ) -> (Self, PollerHandle) {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let visibility = Arc::new(Notify::new());

        let poller = Self {
            api,
            store,
            poll_interval,
            snapshot_tx,
            visibility: visibility.clone(),
            shutdown_rx,
        };
        let handle = PollerHandle {
            visibility,
            shutdown_tx: Arc::new(shutdown_tx),
            snapshot_rx,
        };
        (poller, handle)
    }

    /// Run the polling loop until shut down or the session becomes invalid.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "job status poller started"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.visibility.notified() => {
                    // The out-of-band fetch replaces this tick.
                    ticker.reset();
                    debug!("visibility regained, fetching immediately");
                }
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if !self.store.is_authenticated() {
                info!("session no longer valid, stopping job status poller");
                break;
            }

            self.poll_once().await;
        }

        info!("job status poller stopped");
    }

    async fn poll_once(&self) {
        match self.api.full_snapshot().await {
            Ok(snapshot) => {
                // Full replacement, never a partial patch.
                self.snapshot_tx.send_replace(Some(snapshot));
            }
            Err(e) => {
                warn!(error = %e, "job status fetch failed, keeping previous snapshot");
            }
        }
    }
}
