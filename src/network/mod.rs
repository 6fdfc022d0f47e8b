//! Content Network Capability
//!
//! The narrow interface this crate consumes from a content-network node:
//! identify the local peer, and discover which peers currently provide a
//! given cid. The capability is optional; environments without a node run
//! every other feature unchanged and report provider counts as unknown.

pub mod kubo;

use crate::error::ProviderError;
use crate::types::PeerId;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One peer advertising possession of content for a cid.
///
/// The identity may be empty on degraded network paths; such entries are
/// discarded during deduplication and never counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub peer_id: PeerId,
}

/// Stream of provider records for one discovery query. May contain
/// duplicates and empty identities; an item error aborts the query.
pub type ProviderStream = BoxStream<'static, Result<ProviderInfo, ProviderError>>;

/// Capability interface of the content-network node.
#[async_trait]
pub trait ContentNetwork: Send + Sync {
    /// Identity of the local node.
    async fn identify(&self) -> Result<PeerId, ProviderError>;

    /// Start a provider-discovery query for `cid`. The caller bounds the
    /// query with its own deadline and consumes the stream to completion
    /// before counting.
    async fn find_providers(&self, cid: &str) -> Result<ProviderStream, ProviderError>;
}
