//! Core types for the directory and provider-resolution subsystems.

/// Cid: content identifier string. Opaque and content-addressed; two equal
/// cids reference byte-identical content.
pub type Cid = String;

/// PeerId: opaque identity of a content-network peer.
pub type PeerId = String;
