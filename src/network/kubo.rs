//! Kubo RPC client
//!
//! `ContentNetwork` implementation against the HTTP RPC of a local IPFS
//! (Kubo) node: `POST /api/v0/id` for the local identity and
//! `POST /api/v0/routing/findprovs` for provider discovery. The findprovs
//! endpoint streams newline-delimited JSON routing events; provider events
//! (`Type == 4`) carry the peer records we care about.

use super::{ContentNetwork, ProviderInfo, ProviderStream};
use crate::error::ProviderError;
use crate::types::PeerId;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::debug;

/// Routing event type emitted when a query found providers.
const EVENT_PROVIDER: i32 = 4;

/// HTTP RPC client for a Kubo node.
pub struct KuboClient {
    http: reqwest::Client,
    api_url: Url,
}

impl KuboClient {
    /// Create a client for the RPC endpoint, e.g. `http://127.0.0.1:5001`.
    pub fn new(api_url: &str) -> Result<Self, ProviderError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| ProviderError::QueryFailed(format!("invalid api url: {}", e)))?;
        Ok(Self { http: reqwest::Client::new(), api_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.api_url
            .join(path)
            .map_err(|e| ProviderError::QueryFailed(format!("invalid api path: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(rename = "ID")]
    id: PeerId,
}

#[derive(Debug, Deserialize)]
struct RoutingEvent {
    #[serde(rename = "Type")]
    event_type: i32,
    #[serde(rename = "Responses", default)]
    responses: Option<Vec<PeerRecord>>,
}

#[derive(Debug, Deserialize)]
struct PeerRecord {
    #[serde(rename = "ID", default)]
    id: PeerId,
}

#[async_trait]
impl ContentNetwork for KuboClient {
    async fn identify(&self) -> Result<PeerId, ProviderError> {
        let url = self.endpoint("api/v0/id")?;
        let resp = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| ProviderError::QueryFailed(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::QueryFailed(format!("id returned {}: {}", status, body)));
        }
        let id: IdResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::QueryFailed(e.to_string()))?;
        debug!(peer_id = %id.id, "identified local node");
        Ok(id.id)
    }

    async fn find_providers(&self, cid: &str) -> Result<ProviderStream, ProviderError> {
        let mut url = self.endpoint("api/v0/routing/findprovs")?;
        url.query_pairs_mut().append_pair("arg", cid);

        let resp = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| ProviderError::QueryFailed(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::QueryFailed(format!(
                "findprovs returned {}: {}",
                status, body
            )));
        }

        Ok(decode_provider_stream(
            resp.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())),
        ))
    }
}

/// Decode an ndjson chunk stream into provider records. Generic over the
/// inner error so tests can drive it without a live socket.
pub(crate) fn decode_provider_stream<S, E>(inner: S) -> ProviderStream
where
    S: futures::Stream<Item = Result<Vec<u8>, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (Box::pin(inner), DecoderState::default());
    stream::try_unfold(state, |(mut inner, mut decoder)| async move {
        loop {
            if let Some(info) = decoder.pending.pop_front() {
                return Ok(Some((info, (inner, decoder))));
            }
            if let Some(line) = decoder.take_line() {
                decoder.pending.extend(decode_event_line(&line)?);
                continue;
            }
            if decoder.eof {
                return Ok(None);
            }
            match inner.next().await {
                Some(Ok(chunk)) => decoder.buf.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(ProviderError::QueryFailed(e.to_string())),
                None => decoder.eof = true,
            }
        }
    })
    .boxed()
}

#[derive(Default)]
struct DecoderState {
    buf: Vec<u8>,
    pending: VecDeque<ProviderInfo>,
    eof: bool,
}

impl DecoderState {
    /// Next complete line from the buffer; at EOF the unterminated tail
    /// counts as a line.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            return Some(line);
        }
        if self.eof && !self.buf.is_empty() {
            return Some(std::mem::take(&mut self.buf));
        }
        None
    }
}

/// Parse one routing-event line. Non-provider events decode to nothing;
/// malformed JSON fails the whole query.
fn decode_event_line(line: &[u8]) -> Result<Vec<ProviderInfo>, ProviderError> {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }
    let event: RoutingEvent = serde_json::from_slice(line)
        .map_err(|e| ProviderError::QueryFailed(format!("malformed routing event: {}", e)))?;
    if event.event_type != EVENT_PROVIDER {
        return Ok(Vec::new());
    }
    Ok(event
        .responses
        .unwrap_or_default()
        .into_iter()
        .map(|peer| ProviderInfo { peer_id: peer.id })
        .collect())
}
