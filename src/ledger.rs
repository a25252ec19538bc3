//! Farmed-block ledger persistence.
//!
//! The ledger is the locally persisted history of blocks farmed by this
//! node's reward address, newest first. It is rewritten as a whole on every
//! mutation; a later load never observes anything worse than the last
//! successful save.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Maximum number of farmed blocks kept in the history.
pub const MAX_LEDGER_BLOCKS: usize = 1_000;

/// A block detected as farmed by the locally configured reward address.
///
/// Immutable once created; identity is the block `hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FarmedBlock {
    /// Block hash (hex)
    pub hash: String,

    /// Wall-clock detection time (ISO 8601), not chain time
    pub detected_at: String,

    /// Block height
    pub height: u64,

    /// Block reward in CRS, truncated to 2 decimal places
    pub block_reward: f64,

    /// Fee reward in CRS. Reserved; no event currently populates it.
    pub fee_reward: f64,

    /// Reward address the block was farmed to, as configured at capture time
    pub reward_address: String,

    /// Transaction count. Reserved; no event currently populates it.
    pub transactions: u32,

    /// Derived explorer URL for this block
    pub explorer_link: String,
}

/// Persistence adapter for the farmed-block history.
pub struct BlockLedger;

impl BlockLedger {
    /// Load the ledger from a file, newest first.
    ///
    /// Returns an empty history when the file is missing or unreadable;
    /// corruption is logged and never crashes startup.
    pub fn load(path: &Path) -> Vec<FarmedBlock> {
        if !path.exists() {
            tracing::info!("No ledger file found at {:?}, starting empty", path);
            return Vec::new();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to read ledger file {:?}: {}", path, e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<FarmedBlock>>(&content) {
            Ok(blocks) => {
                tracing::info!("Loaded {} farmed blocks from {:?}", blocks.len(), path);
                blocks
            }
            Err(e) => {
                tracing::warn!("Ledger file {:?} is corrupt, starting empty: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Save the full ledger to a file.
    ///
    /// Uses atomic write (temp file, then rename) so a crash mid-save leaves
    /// the previous ledger intact.
    pub fn save(path: &Path, blocks: &[FarmedBlock]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(blocks).map_err(|e| {
            Error::Persistence(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        tracing::debug!("Saved ledger with {} blocks to {:?}", blocks.len(), path);
        Ok(())
    }

    /// Prepend a newly detected block, enforcing the history bound.
    pub fn prepend(blocks: &mut Vec<FarmedBlock>, block: FarmedBlock) {
        blocks.insert(0, block);
        blocks.truncate(MAX_LEDGER_BLOCKS);
    }
}

/// Total rewards in the given history, in CRS.
pub fn total_rewards(blocks: &[FarmedBlock]) -> f64 {
    blocks.iter().map(|b| b.block_reward + b.fee_reward).sum()
}
