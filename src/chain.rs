//! Chain connection over WebSocket JSON-RPC.
//!
//! Wraps a `jsonrpsee` WebSocket client with an idempotent connect/disconnect
//! lifecycle, a new-heads subscription, and the point queries the tracker
//! needs. The node returns event records already decoded (section, method,
//! data), so no runtime metadata lives in this client.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Timeout for individual RPC requests.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Block number field as sent by the node (hex string) or a plain number.
fn block_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Hex(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Hex(s) => u64::from_str_radix(s.trim_start_matches("0x"), 16)
            .map_err(serde::de::Error::custom),
    }
}

/// A block header as delivered by the new-heads subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHeader {
    pub parent_hash: String,
    #[serde(deserialize_with = "block_number")]
    pub number: u64,
    #[serde(default)]
    pub digest: HeaderDigest,
}

/// Header digest: SCALE-encoded log entries, hex on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderDigest {
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Result of `chain_getBlock`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedBlock {
    pub block: BlockBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockBody {
    pub header: ChainHeader,
    #[serde(default)]
    pub extrinsics: Vec<String>,
}

/// A chain-state event record, decoded by the node.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// One entry of the node's peer list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub peer_id: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub best_number: u64,
}

/// Result of `system_syncState`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub starting_block: u64,
    pub current_block: u64,
    #[serde(default)]
    pub highest_block: Option<u64>,
}

/// Push stream of new block headers, in chain order.
pub type HeadStream = BoxStream<'static, ChainHeader>;

/// The chain surface the tracker consumes.
///
/// `ChainConnection` is the production implementation; tests substitute
/// their own.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Connect to the node. No-op when already connected; returning `Ok`
    /// means the handshake has completed.
    async fn connect(&self) -> Result<()>;

    async fn is_connected(&self) -> bool;

    /// Subscribe to new block headers. Dropping the stream unsubscribes.
    async fn subscribe_new_heads(&self) -> Result<HeadStream>;

    /// Hash of the block at the given height.
    async fn block_hash(&self, height: u64) -> Result<String>;

    /// Full block by hash.
    async fn block_by_hash(&self, hash: &str) -> Result<SignedBlock>;

    /// Chain-state event records for the block with the given hash.
    async fn events_at(&self, hash: &str) -> Result<Vec<EventRecord>>;

    /// Tear the connection down. Safe to call when never connected.
    async fn disconnect(&self);
}

/// Live WebSocket connection to a Ceres node.
pub struct ChainConnection {
    url: String,
    client: RwLock<Option<Arc<WsClient>>>,
}

impl ChainConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: RwLock::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The current client, failing when disconnected. Point queries do not
    /// reconnect on their own.
    async fn live_client(&self) -> Result<Arc<WsClient>> {
        let guard = self.client.read().await;
        match guard.as_ref() {
            Some(client) if client.is_connected() => Ok(Arc::clone(client)),
            _ => Err(Error::Network(format!("not connected to {}", self.url))),
        }
    }

    /// Connected peers, for the net-status display.
    pub async fn peers(&self) -> Result<Vec<PeerInfo>> {
        let client = self.live_client().await?;
        client
            .request("system_peers", rpc_params![])
            .await
            .map_err(rpc_error)
    }

    /// The node's sync progress.
    pub async fn sync_status(&self) -> Result<SyncStatus> {
        let client = self.live_client().await?;
        client
            .request("system_syncState", rpc_params![])
            .await
            .map_err(rpc_error)
    }
}

#[async_trait]
impl ChainSource for ChainConnection {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.client.write().await;
        if let Some(client) = guard.as_ref() {
            if client.is_connected() {
                return Ok(());
            }
        }

        tracing::info!("Connecting to node at {}", self.url);
        let client = WsClientBuilder::default()
            .request_timeout(RPC_TIMEOUT)
            .build(&self.url)
            .await
            .map_err(rpc_error)?;
        *guard = Some(Arc::new(client));
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match self.client.read().await.as_ref() {
            Some(client) => client.is_connected(),
            None => false,
        }
    }

    async fn subscribe_new_heads(&self) -> Result<HeadStream> {
        let client = self.live_client().await?;
        let subscription: Subscription<ChainHeader> = client
            .subscribe(
                "chain_subscribeNewHeads",
                rpc_params![],
                "chain_unsubscribeNewHeads",
            )
            .await
            .map_err(rpc_error)?;

        Ok(subscription
            .filter_map(|item| async move {
                match item {
                    Ok(header) => Some(header),
                    Err(e) => {
                        tracing::warn!("Dropping undecodable header notification: {}", e);
                        None
                    }
                }
            })
            .boxed())
    }

    async fn block_hash(&self, height: u64) -> Result<String> {
        let client = self.live_client().await?;
        let hash: Option<String> = client
            .request("chain_getBlockHash", rpc_params![height])
            .await
            .map_err(rpc_error)?;
        hash.ok_or_else(|| Error::Network(format!("no block hash at height {}", height)))
    }

    async fn block_by_hash(&self, hash: &str) -> Result<SignedBlock> {
        let client = self.live_client().await?;
        let block: Option<SignedBlock> = client
            .request("chain_getBlock", rpc_params![hash])
            .await
            .map_err(rpc_error)?;
        block.ok_or_else(|| Error::Network(format!("no block with hash {}", hash)))
    }

    async fn events_at(&self, hash: &str) -> Result<Vec<EventRecord>> {
        let client = self.live_client().await?;
        client
            .request("chain_getEvents", rpc_params![hash])
            .await
            .map_err(rpc_error)
    }

    async fn disconnect(&self) {
        let mut guard = self.client.write().await;
        if guard.take().is_some() {
            tracing::info!("Disconnected from node at {}", self.url);
        }
    }
}

fn rpc_error(e: impl std::fmt::Display) -> Error {
    Error::Network(e.to_string())
}
