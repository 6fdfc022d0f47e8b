//! Provider Resolver
//!
//! One resolution: run a provider-discovery query for a cid, collect the
//! complete peer stream, deduplicate by identity, and classify whether the
//! local node is among the providers. Failures never propagate: a failed or
//! timed-out query yields the unknown sentinel for that one cid and nothing
//! else.

use super::ProviderSummary;
use crate::error::ProviderError;
use crate::network::{ContentNetwork, ProviderInfo};
use futures::TryStreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Resolves provider summaries against an optional content network.
pub struct ProviderResolver {
    network: Option<Arc<dyn ContentNetwork>>,
}

impl ProviderResolver {
    pub fn new(network: Option<Arc<dyn ContentNetwork>>) -> Self {
        Self { network }
    }

    /// Whether a content network is attached at all.
    pub fn has_network(&self) -> bool {
        self.network.is_some()
    }

    /// Resolve the provider summary for `cid`, bounded by `deadline`.
    ///
    /// `local_node_id` is an explicit input, not ambient state; `None` means
    /// the local identity is unknown and `local_node_present` stays false.
    pub async fn resolve(
        &self,
        cid: &str,
        local_node_id: Option<&str>,
        deadline: Duration,
    ) -> ProviderSummary {
        let Some(network) = &self.network else {
            debug!(cid, "no content network attached, provider count unknown");
            return ProviderSummary::unknown();
        };

        let query = async {
            let stream = network.find_providers(cid).await?;
            stream.try_collect::<Vec<ProviderInfo>>().await
        };

        match timeout(deadline, query).await {
            Ok(Ok(peers)) => {
                let summary = summarize(peers, local_node_id);
                debug!(
                    cid,
                    provider_count = summary.provider_count,
                    local_node_present = summary.local_node_present,
                    "resolved providers"
                );
                summary
            }
            Ok(Err(ProviderError::CapabilityUnavailable)) => {
                debug!(cid, "content network reported no capability");
                ProviderSummary::unknown()
            }
            Ok(Err(e)) => {
                warn!(cid, error = %e, "provider query failed");
                ProviderSummary::unknown()
            }
            Err(_) => {
                warn!(cid, deadline_ms = deadline.as_millis() as u64, "provider query timed out");
                ProviderSummary::unknown()
            }
        }
    }
}

/// Deduplicate a complete peer list and classify local membership.
///
/// Takes the fully collected response; partial counts never exist.
pub fn summarize<I>(peers: I, local_node_id: Option<&str>) -> ProviderSummary
where
    I: IntoIterator<Item = ProviderInfo>,
{
    let distinct: HashSet<String> = peers
        .into_iter()
        .map(|p| p.peer_id)
        .filter(|id| !id.is_empty())
        .collect();

    let local_node_present = local_node_id.is_some_and(|id| distinct.contains(id));

    ProviderSummary { provider_count: Some(distinct.len()), local_node_present }
}
