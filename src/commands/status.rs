//! Node status command: peers and sync progress.

use anyhow::Result;

use crate::chain::{ChainConnection, ChainSource};
use crate::config::ConfigStore;

use super::{print_success, print_warning};

/// Run the status command
pub async fn run(store: &ConfigStore) -> Result<()> {
    let config = store.read().await?;

    let connection = ChainConnection::new(&config.node_rpc_url);
    if let Err(e) = connection.connect().await {
        print_warning(&format!(
            "Could not reach the node at {}: {}",
            config.node_rpc_url, e
        ));
        println!("Is the node running? Try 'ceres-farm-console start'.");
        return Ok(());
    }

    let sync = connection.sync_status().await?;
    let peers = connection.peers().await?;

    println!();
    print_success("Node status");
    println!();
    match sync.highest_block {
        Some(highest) if highest > sync.current_block => {
            println!(
                "Sync:  block {} of {} (started at {})",
                sync.current_block, highest, sync.starting_block
            );
        }
        _ => {
            println!("Sync:  at chain tip, block {}", sync.current_block);
        }
    }
    println!("Peers: {}", peers.len());

    for peer in peers.iter().take(10) {
        println!("  {:<52} best #{}", peer.peer_id, peer.best_number);
    }
    if peers.len() > 10 {
        println!("  ... and {} more", peers.len() - 10);
    }

    connection.disconnect().await;
    Ok(())
}
