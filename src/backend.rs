//! Native backend control bridge.
//!
//! The node and farmer processes are owned by a native backend; this module
//! sends it fire-and-forget JSON-RPC commands over HTTP. Success only means
//! the command was accepted, not that the underlying process is healthy.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{Error, Result};

/// Timeout for backend control calls.
const BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period after launching the node before the RPC endpoint is assumed
/// reachable. The backend offers no readiness signal; this fixed delay is a
/// workaround, not a guarantee.
pub const NODE_STARTUP_GRACE: Duration = Duration::from_secs(7);

/// Plot sizes are sent to the backend in rounded KiB units.
const PLOT_UNITS_PER_GIB: f64 = 1_048_576.0;

#[derive(Debug, Serialize)]
struct BackendRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct BackendResponse {
    result: Option<Value>,
    error: Option<BackendError>,
}

#[derive(Debug, Deserialize)]
struct BackendError {
    code: i32,
    message: String,
}

/// Client for the native backend's control endpoint.
pub struct NodeBackend {
    client: reqwest::Client,
    url: String,
}

impl NodeBackend {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(BACKEND_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Launch the native node process.
    ///
    /// Returns once the backend accepts the command; callers should wait
    /// [`NODE_STARTUP_GRACE`] before connecting to the node's RPC endpoint.
    pub async fn start_node(&self, path: &str, node_name: &str) -> Result<()> {
        self.invoke(
            "start_node",
            json!({ "path": path, "nodeName": node_name }),
        )
        .await?;
        tracing::info!("Node launch requested (name: {})", node_name);
        Ok(())
    }

    /// Begin farming with the given plot.
    ///
    /// An empty reward address is passed through with a warning rather than
    /// aborting; the backend rejects it on its own terms.
    pub async fn start_farming(
        &self,
        path: &str,
        reward_address: &str,
        plot_size_gib: f64,
    ) -> Result<()> {
        if reward_address.is_empty() {
            tracing::error!("Sending empty reward address to backend");
        }
        let plot_size = (plot_size_gib * PLOT_UNITS_PER_GIB).round() as u64;

        self.invoke(
            "farming",
            json!({
                "path": path,
                "rewardAddress": reward_address,
                "plotSize": plot_size,
            }),
        )
        .await?;
        tracing::info!("Farming requested ({} GiB plot)", plot_size_gib);
        Ok(())
    }

    async fn invoke(&self, method: &'static str, params: Value) -> Result<Value> {
        let request = BackendRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(format!("backend unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "backend returned HTTP {}",
                response.status()
            )));
        }

        let body: BackendResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("invalid backend response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(Error::Network(format!(
                "backend error {}: {}",
                error.code, error.message
            )));
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}
