//! Start command: launch the node and farmer, then track farmed blocks.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::backend::{NodeBackend, NODE_STARTUP_GRACE};
use crate::chain::ChainConnection;
use crate::config::ConfigStore;
use crate::events::FarmEvent;
use crate::ledger::total_rewards;
use crate::tracker::FarmTracker;

use super::{print_error, print_success};

/// Run the start command
pub async fn run(store: &ConfigStore, no_backend: bool) -> Result<()> {
    let config = store.read().await?;
    config.validate()?;

    if config.reward_address.is_empty() {
        print_error("No reward address configured. Run 'ceres-farm-console init' first.");
        return Ok(());
    }

    if !no_backend {
        let backend = NodeBackend::new(&config.backend_url)?;
        let plot_dir = config.plot.directory.to_string_lossy().to_string();

        backend.start_node(&plot_dir, &config.node_name).await?;
        backend
            .start_farming(&plot_dir, &config.reward_address, config.plot.size_gib)
            .await?;

        println!("Waiting for the node to come up...");
        tokio::time::sleep(NODE_STARTUP_GRACE).await;
    }

    let chain = Arc::new(ChainConnection::new(&config.node_rpc_url));
    let tracker = Arc::new(FarmTracker::new(chain, store.clone()));

    let mut events = tracker.subscribe_events();
    tracker.start().await?;

    print_success("Tracking farmed blocks. Press Ctrl-C to stop.");
    println!();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(FarmEvent::NewBlock { height }) => {
                    tracing::debug!("New block: {}", height);
                }
                Ok(FarmEvent::Farmed(block)) => {
                    print_success(&format!(
                        "Farmed block {} (+{:.2} CRS)",
                        block.height, block.block_reward
                    ));
                    println!("  {}", block.explorer_link);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Display fell behind, skipped {} events", missed);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                tracker.stop().await;
                break;
            }
        }
    }

    let farmed = tracker.farmed_blocks();
    println!();
    println!(
        "Session ledger: {} blocks, {:.2} CRS total",
        farmed.len(),
        total_rewards(&farmed)
    );

    Ok(())
}
