//! Listing Feed
//!
//! The view-facing surface: a re-fetchable record list plus an asynchronous
//! per-record provider summary feed. A refresh that fails leaves the
//! previous snapshot in place (stale-but-available); provider resolutions
//! that complete after a newer refresh are discarded by generation token
//! instead of being applied to stale state.

use crate::directory::DirectoryClient;
use crate::error::DirectoryError;
use crate::provider::{ProviderSummary, ResolveCache};
use crate::record::Record;
use crate::types::Cid;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One asynchronous provider-column update for a listed record.
///
/// Updates for different records arrive in no particular order; each row
/// renders independently as its resolution completes.
#[derive(Debug, Clone)]
pub struct ProviderUpdate {
    /// Generation of the refresh this update belongs to.
    pub generation: u64,
    /// Record identity key (`owner/name`).
    pub key: String,
    pub cid: Cid,
    pub summary: ProviderSummary,
}

/// Re-fetchable directory listing with provider aggregation.
pub struct ListingFeed {
    directory: DirectoryClient,
    cache: Arc<ResolveCache>,
    local_node_id: Option<String>,
    provider_deadline: Duration,
    generation: Arc<AtomicU64>,
    records: RwLock<Vec<Record>>,
    refresh_lock: tokio::sync::Mutex<()>,
    updates: mpsc::UnboundedSender<ProviderUpdate>,
}

impl ListingFeed {
    /// Build a feed and the receiving end of its update channel.
    pub fn new(
        directory: DirectoryClient,
        cache: Arc<ResolveCache>,
        local_node_id: Option<String>,
        provider_deadline: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ProviderUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Self {
            directory,
            cache,
            local_node_id,
            provider_deadline,
            generation: Arc::new(AtomicU64::new(0)),
            records: RwLock::new(Vec::new()),
            refresh_lock: tokio::sync::Mutex::new(()),
            updates: tx,
        };
        (feed, rx)
    }

    /// Current snapshot: the last successfully fetched record list.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether an update still belongs to the latest refresh. Consumers
    /// drop anything stale instead of applying it.
    pub fn is_current(&self, update: &ProviderUpdate) -> bool {
        update.generation == self.current_generation()
    }

    /// Re-fetch the listing and start one provider resolution per record.
    ///
    /// On a fetch failure the previous snapshot is retained and the error
    /// returned for the caller to surface as a transient notice; the
    /// generation does not advance, so in-flight resolutions for the
    /// retained records stay valid.
    pub async fn refresh(&self, scope_owner: Option<&str>) -> Result<u64, DirectoryError> {
        let _guard = self.refresh_lock.lock().await;

        let fetched = self.directory.list_entries(scope_owner).await?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.records.write() = fetched.clone();
        info!(
            generation,
            record_count = fetched.len(),
            scope_owner = scope_owner.unwrap_or("<all>"),
            "listing refreshed"
        );

        for record in fetched {
            self.spawn_resolution(generation, record.identity_key(), record.cid);
        }
        Ok(generation)
    }

    fn spawn_resolution(&self, generation: u64, key: String, cid: Cid) {
        let cache = Arc::clone(&self.cache);
        let current = Arc::clone(&self.generation);
        let local_node_id = self.local_node_id.clone();
        let deadline = self.provider_deadline;
        let updates = self.updates.clone();

        tokio::spawn(async move {
            let summary = cache.resolve(&cid, local_node_id, deadline).await;
            if current.load(Ordering::SeqCst) != generation {
                debug!(key, generation, "dropping provider resolution for superseded listing");
                return;
            }
            // Receiver may have gone away; resolution results are advisory.
            let _ = updates.send(ProviderUpdate { generation, key, cid, summary });
        });
    }
}
