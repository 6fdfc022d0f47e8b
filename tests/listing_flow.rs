//! End-to-end listing behavior: refresh, per-record provider updates,
//! single-flight across records sharing a cid, stale-generation discard,
//! and last-known-good retention on fetch failure.

mod support;

use lodestone::directory::DirectoryClient;
use lodestone::listing::ListingFeed;
use lodestone::provider::{ProviderResolver, ProviderSummary, ResolveCache};
use std::sync::Arc;
use std::time::Duration;
use support::{http_ok, http_response, serve_responses, MockNetwork};
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(5);

fn feed_over(
    base: &str,
    network: Option<Arc<MockNetwork>>,
) -> (ListingFeed, tokio::sync::mpsc::UnboundedReceiver<lodestone::listing::ProviderUpdate>) {
    let directory = DirectoryClient::new(base).unwrap();
    let network = network.map(|n| n as Arc<dyn lodestone::network::ContentNetwork>);
    let cache = Arc::new(ResolveCache::new(ProviderResolver::new(network)));
    ListingFeed::new(directory, cache, Some("local-peer".to_string()), DEADLINE)
}

#[tokio::test]
async fn refresh_delivers_one_update_per_record() {
    let body = r#"[
        {"owner":"alice","name":"notes","cid":"Qm1"},
        {"owner":"bob","name":"site","cid":"Qm2"}]"#;
    let (base, _reqs) = serve_responses(vec![http_ok(body)]).await;
    let network = MockNetwork::immediate(vec!["local-peer", "other", "other"]);
    let (feed, mut updates) = feed_over(&base, Some(Arc::clone(&network)));

    let generation = feed.refresh(None).await.unwrap();
    assert_eq!(generation, 1);
    assert_eq!(feed.records().len(), 2);

    let mut keys = Vec::new();
    for _ in 0..2 {
        let update = timeout(Duration::from_secs(2), updates.recv()).await.unwrap().unwrap();
        assert!(feed.is_current(&update));
        assert_eq!(update.summary.provider_count, Some(2));
        assert!(update.summary.local_node_present);
        keys.push(update.key);
    }
    keys.sort();
    assert_eq!(keys, vec!["alice/notes", "bob/site"]);
}

#[tokio::test]
async fn records_sharing_a_cid_share_one_query() {
    let body = r#"[
        {"owner":"alice","name":"notes","cid":"Qm1"},
        {"owner":"bob","name":"mirror","cid":"Qm1"},
        {"owner":"carol","name":"site","cid":"Qm2"}]"#;
    let (base, _reqs) = serve_responses(vec![http_ok(body)]).await;
    let network = MockNetwork::gated(vec!["other"]);
    let (feed, mut updates) = feed_over(&base, Some(Arc::clone(&network)));

    feed.refresh(None).await.unwrap();

    // Let all three resolutions reach the cache before any query finishes.
    tokio::time::sleep(Duration::from_millis(50)).await;
    network.release(2);

    for _ in 0..3 {
        let update = timeout(Duration::from_secs(2), updates.recv()).await.unwrap().unwrap();
        assert_eq!(update.summary.provider_count, Some(1));
    }
    assert_eq!(network.calls(), 2);
}

#[tokio::test]
async fn failed_refresh_retains_previous_records() {
    let good = r#"[
        {"owner":"alice","name":"notes","cid":"Qm1"},
        {"owner":"bob","name":"site","cid":"Qm2"},
        {"owner":"carol","name":"blog","cid":"Qm3"}]"#;
    let (base, _reqs) = serve_responses(vec![
        http_ok(good),
        http_response("500 Internal Server Error", "database unavailable"),
    ])
    .await;
    let (feed, _updates) = feed_over(&base, None);

    let generation = feed.refresh(None).await.unwrap();
    assert_eq!(feed.records().len(), 3);

    let err = feed.refresh(None).await.unwrap_err();
    assert!(matches!(err, lodestone::error::DirectoryError::Unavailable(_)));

    // Stale-but-available: the three prior records survive the failure and
    // the generation does not advance.
    assert_eq!(feed.records().len(), 3);
    assert_eq!(feed.current_generation(), generation);
}

#[tokio::test]
async fn superseded_resolutions_are_discarded() {
    let first = r#"[{"owner":"alice","name":"old","cid":"QmOld"}]"#;
    let second = r#"[{"owner":"alice","name":"new","cid":"QmNew"}]"#;
    let (base, _reqs) = serve_responses(vec![http_ok(first), http_ok(second)]).await;
    let network = MockNetwork::gated(vec!["other"]);
    let (feed, mut updates) = feed_over(&base, Some(Arc::clone(&network)));

    feed.refresh(None).await.unwrap();
    feed.refresh(None).await.unwrap();
    assert_eq!(feed.current_generation(), 2);

    // Both generations' queries complete only now, after the second refresh
    // superseded the first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    network.release(2);

    let update = timeout(Duration::from_secs(2), updates.recv()).await.unwrap().unwrap();
    assert_eq!(update.generation, 2);
    assert_eq!(update.key, "alice/new");
    assert!(feed.is_current(&update));

    // The superseded generation's resolution never surfaces.
    assert!(timeout(Duration::from_millis(200), updates.recv()).await.is_err());
}

#[tokio::test]
async fn missing_capability_degrades_to_unknown_without_error() {
    let body = r#"[{"owner":"alice","name":"notes","cid":"Qm1"}]"#;
    let (base, _reqs) = serve_responses(vec![http_ok(body)]).await;
    let (feed, mut updates) = feed_over(&base, None);

    feed.refresh(None).await.unwrap();

    let update = timeout(Duration::from_secs(2), updates.recv()).await.unwrap().unwrap();
    assert_eq!(update.summary, ProviderSummary::unknown());
    assert!(!update.summary.local_node_present);
}
