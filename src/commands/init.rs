//! Console initialization command.
//!
//! Generates a reward identity, shows the recovery phrase once, and writes
//! the configuration file.

use anyhow::{anyhow, Result};

use crate::config::ConfigStore;
use crate::identity::RewardIdentity;

use super::{print_success, print_warning, prompt_confirm};

/// Run the init command
pub async fn run(store: &ConfigStore, node_name: Option<String>) -> Result<()> {
    let mut config = store.read().await.unwrap_or_default();

    if !config.reward_address.is_empty() {
        print_warning("A reward address is already configured.");
        println!("Address: {}", config.reward_address);

        if !prompt_confirm("Generate a new one and overwrite it?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let identity = RewardIdentity::new();
    let address = identity.generate();
    if address.is_empty() {
        return Err(anyhow!("reward address generation failed, see log"));
    }

    println!();
    println!("Your recovery phrase (24 words):");
    println!();
    for (i, word) in identity.reveal_mnemonic().split_whitespace().enumerate() {
        print!("{:>2}. {:<12}", i + 1, word);
        if (i + 1) % 4 == 0 {
            println!();
        }
    }
    println!();
    print_warning("Anyone with this phrase controls your rewards.");
    print_warning("It is not stored anywhere; if you lose it, it is gone.");
    println!();

    if !prompt_confirm("Have you written down your recovery phrase?")? {
        identity.clear_mnemonic();
        return Err(anyhow!(
            "write down your recovery phrase, then run init again"
        ));
    }

    // The phrase is only displayable until this point.
    identity.clear_mnemonic();

    config.reward_address = address.clone();
    if let Some(name) = node_name {
        config.node_name = name;
    }
    config.validate()?;
    store.write(&config).await?;

    println!();
    print_success("Console configured!");
    println!();
    println!("Reward address: {}", address);
    println!("Node name:      {}", config.node_name);
    println!("Config saved:   {}", store.path().display());

    Ok(())
}
