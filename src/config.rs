//! Console configuration.
//!
//! The configuration file is the single place the reward address and node
//! name live. The tracker only ever reads it; the `init` command writes it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plot settings handed to the native farmer backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Directory holding the plot files
    #[serde(default = "default_plot_directory")]
    pub directory: PathBuf,

    /// Allocated plot size in GiB
    #[serde(default = "default_plot_size_gib")]
    pub size_gib: f64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            directory: default_plot_directory(),
            size_gib: default_plot_size_gib(),
        }
    }
}

/// Console configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Reward payout address. Empty until `init` generates one.
    #[serde(default)]
    pub reward_address: String,

    /// Display name for the local node
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// WebSocket RPC endpoint of the local node
    #[serde(default = "default_node_rpc_url")]
    pub node_rpc_url: String,

    /// Control endpoint of the native backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Plot settings
    #[serde(default)]
    pub plot: PlotConfig,

    /// File holding the farmed-block ledger
    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,

    /// Explorer base URL; block links are derived from it
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

fn default_node_name() -> String {
    "ceres-node".to_string()
}

fn default_node_rpc_url() -> String {
    "ws://127.0.0.1:9944".to_string()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:7351".to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ceres-farm-console")
}

fn default_plot_directory() -> PathBuf {
    data_dir().join("plot")
}

fn default_plot_size_gib() -> f64 {
    10.0
}

fn default_ledger_file() -> PathBuf {
    data_dir().join("farmed-blocks.json")
}

fn default_explorer_url() -> String {
    "https://apps.ceres.farm/#/explorer/query/".to_string()
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            reward_address: String::new(),
            node_name: default_node_name(),
            node_rpc_url: default_node_rpc_url(),
            backend_url: default_backend_url(),
            plot: PlotConfig::default(),
            ledger_file: default_ledger_file(),
            explorer_url: default_explorer_url(),
        }
    }
}

impl ConsoleConfig {
    /// Default configuration file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ceres-farm-console")
            .join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.plot.size_gib <= 0.0 {
            anyhow::bail!("plot.size_gib must be positive, got {}", self.plot.size_gib);
        }
        if !self.node_rpc_url.starts_with("ws://") && !self.node_rpc_url.starts_with("wss://") {
            anyhow::bail!("node_rpc_url must be a ws:// or wss:// endpoint");
        }
        Ok(())
    }

    /// Derive the explorer URL for a block height.
    pub fn explorer_link(&self, height: u64) -> String {
        format!("{}{}", self.explorer_url, height)
    }
}

/// Handle to the on-disk configuration.
///
/// Reads are asynchronous and may be issued repeatedly; the tracker treats
/// this store as read-only.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current configuration, falling back to defaults for a
    /// missing file.
    pub async fn read(&self) -> anyhow::Result<ConsoleConfig> {
        if !self.path.exists() {
            return Ok(ConsoleConfig::default());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let config: ConsoleConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write the configuration back to disk.
    pub async fn write(&self, config: &ConsoleConfig) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(config)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}
