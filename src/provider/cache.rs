//! Aggregation Cache
//!
//! Single-flight merge of provider lookups. When many records resolve at
//! once (a directory listing renders one lookup per visible record), all
//! concurrent callers for the same cid join one underlying query instead of
//! issuing duplicates. Entries are one-shot: a completed result is not
//! cached, so the next call re-resolves a fresh provider set.

use super::{ProviderResolver, ProviderSummary};
use crate::types::Cid;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type SharedResolve = Shared<BoxFuture<'static, ProviderSummary>>;

/// One in-flight query. The id guards removal: only the entry a caller
/// actually awaited may be cleared, never a successor for the same cid.
struct InflightEntry {
    id: u64,
    fut: SharedResolve,
}

/// Cache counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Underlying queries started.
    pub issued: u64,
    /// Callers that joined an already-running query.
    pub joined: u64,
}

/// Per-cid single-flight front of the [`ProviderResolver`].
pub struct ResolveCache {
    resolver: Arc<ProviderResolver>,
    inflight: Mutex<HashMap<Cid, InflightEntry>>,
    next_id: AtomicU64,
    stats: RwLock<CacheStats>,
}

impl ResolveCache {
    pub fn new(resolver: ProviderResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
            inflight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn resolver(&self) -> &ProviderResolver {
        &self.resolver
    }

    /// Resolve the provider summary for `cid`, joining an in-flight query
    /// for the same cid when one exists.
    ///
    /// When callers race, the first caller's `local_node_id` and `deadline`
    /// parameterize the merged query; both are process-wide constants in
    /// practice. On failure every joined caller receives the same unknown
    /// sentinel and the entry clears so a later call retries.
    pub async fn resolve(
        &self,
        cid: &str,
        local_node_id: Option<String>,
        deadline: Duration,
    ) -> ProviderSummary {
        let (entry_id, fut) = {
            let mut inflight = self.inflight.lock();
            if let Some(entry) = inflight.get(cid) {
                self.stats.write().joined += 1;
                debug!(cid, "joining in-flight provider query");
                (entry.id, entry.fut.clone())
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let resolver = Arc::clone(&self.resolver);
                let query_cid = cid.to_string();
                let fut = async move {
                    resolver.resolve(&query_cid, local_node_id.as_deref(), deadline).await
                }
                .boxed()
                .shared();
                inflight.insert(cid.to_string(), InflightEntry { id, fut: fut.clone() });
                self.stats.write().issued += 1;
                (id, fut)
            }
        };

        let summary = fut.await;

        let mut inflight = self.inflight.lock();
        if inflight.get(cid).map(|e| e.id) == Some(entry_id) {
            inflight.remove(cid);
        }
        summary
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.read()
    }
}
