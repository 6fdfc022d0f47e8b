//! Shared fixtures: a canned-response HTTP server and a gated mock content
//! network.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lodestone::error::ProviderError;
use lodestone::network::{ContentNetwork, ProviderInfo, ProviderStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;

/// Serve one canned HTTP response per incoming connection, in order, then
/// stop accepting. Returns the base URL and a channel of raw request heads.
pub async fn serve_responses(responses: Vec<String>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for response in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), rx)
}

pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

pub fn http_ok(body: &str) -> String {
    http_response("200 OK", body)
}

/// First line of a captured request head, e.g. `GET /alice HTTP/1.1`.
pub fn request_line(head: &str) -> String {
    head.lines().next().unwrap_or_default().to_string()
}

/// Mock content network: counts queries, optionally holds them on a gate,
/// and answers every cid with a fixed peer list.
pub struct MockNetwork {
    pub calls: AtomicUsize,
    pub gate: Option<Semaphore>,
    pub peers: Vec<&'static str>,
}

impl MockNetwork {
    pub fn immediate(peers: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), gate: None, peers })
    }

    pub fn gated(peers: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), gate: Some(Semaphore::new(0)), peers })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }
}

#[async_trait]
impl ContentNetwork for MockNetwork {
    async fn identify(&self) -> Result<String, ProviderError> {
        Ok("local-peer".to_string())
    }

    async fn find_providers(&self, _cid: &str) -> Result<ProviderStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        let items: Vec<Result<ProviderInfo, ProviderError>> = self
            .peers
            .iter()
            .map(|id| Ok(ProviderInfo { peer_id: id.to_string() }))
            .collect();
        Ok(stream::iter(items).boxed())
    }
}
