//! Farmed-block history command.

use anyhow::Result;

use crate::config::ConfigStore;
use crate::ledger::{total_rewards, BlockLedger};

use super::print_success;

/// Run the history command
pub async fn run(store: &ConfigStore, limit: usize) -> Result<()> {
    let config = store.read().await?;
    let blocks = BlockLedger::load(&config.ledger_file);

    if blocks.is_empty() {
        println!();
        println!("No farmed blocks recorded yet.");
        println!("Run 'ceres-farm-console start' to begin tracking.");
        return Ok(());
    }

    println!();
    print_success(&format!("Farmed blocks ({} recorded)", blocks.len()));
    println!();
    println!(
        "{:<10} {:<12} {:<26} {}",
        "Height", "Reward", "Detected", "Hash"
    );
    println!("{}", "-".repeat(72));

    for block in blocks.iter().take(limit) {
        let hash_short = if block.hash.len() > 14 {
            &block.hash[..14]
        } else {
            &block.hash
        };
        println!(
            "{:<10} {:<12} {:<26} {}...",
            block.height,
            format!("{:.2} CRS", block.block_reward),
            block.detected_at,
            hash_short
        );
    }

    println!();
    println!(
        "Total rewards: {:.2} CRS ({} blocks)",
        total_rewards(&blocks),
        blocks.len()
    );

    Ok(())
}
