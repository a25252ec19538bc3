//! Reward identity generation.
//!
//! Generates a BIP39 mnemonic, derives an sr25519 keypair from it, and
//! formats the public key as an SS58 address under the Ceres network format.
//!
//! Security: the mnemonic is held in a `Zeroizing<String>` so the recovery
//! phrase is overwritten in memory once cleared or dropped. It is never
//! persisted by this module.

use bip39::{Language, Mnemonic, MnemonicType, Seed};
use blake2::{Blake2b512, Digest};
use schnorrkel::{ExpansionMode, MiniSecretKey};
use std::sync::Mutex;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Registered SS58 address-format parameter for the Ceres network.
pub const ADDRESS_FORMAT: u16 = 886;

/// Number of words in a generated mnemonic phrase.
const MNEMONIC_WORDS: MnemonicType = MnemonicType::Words24;

/// Encode a 32-byte public key as an SS58 address under [`ADDRESS_FORMAT`].
pub fn encode_address(public_key: &[u8; 32]) -> String {
    let mut data = format_prefix_bytes(ADDRESS_FORMAT);
    data.extend_from_slice(public_key);

    let mut hasher = Blake2b512::new();
    hasher.update(b"SS58PRE");
    hasher.update(&data);
    let checksum = hasher.finalize();

    data.extend_from_slice(&checksum[..2]);
    bs58::encode(data).into_string()
}

/// SS58 prefix encoding: one byte below 64, two bytes up to 16383.
fn format_prefix_bytes(format: u16) -> Vec<u8> {
    if format < 64 {
        vec![format as u8]
    } else {
        let ident = format & 0b0011_1111_1111_1111;
        let first = ((ident & 0b0000_0000_1111_1100) >> 2) as u8 | 0b0100_0000;
        let second = ((ident >> 8) as u8) | (((ident & 0b0000_0000_0000_0011) as u8) << 6);
        vec![first, second]
    }
}

/// Derive the SS58 address for a mnemonic phrase.
pub fn derive_address(phrase: &str) -> Result<String> {
    let mnemonic = Mnemonic::from_phrase(phrase, Language::English)
        .map_err(|e| Error::Crypto(format!("invalid mnemonic: {}", e)))?;
    let seed = Seed::new(&mnemonic, "");

    let mini = MiniSecretKey::from_bytes(&seed.as_bytes()[..32])
        .map_err(|e| Error::Crypto(format!("key derivation failed: {}", e)))?;
    let keypair = mini.expand_to_keypair(ExpansionMode::Ed25519);

    Ok(encode_address(&keypair.public.to_bytes()))
}

/// One-shot reward identity for the current session.
///
/// The mnemonic is only retrievable until explicitly cleared; after clearing,
/// reveals return the empty string rather than failing.
pub struct RewardIdentity {
    mnemonic: Mutex<Zeroizing<String>>,
}

impl RewardIdentity {
    pub fn new() -> Self {
        Self {
            mnemonic: Mutex::new(Zeroizing::new(String::new())),
        }
    }

    /// Generate a fresh mnemonic and return the derived reward address.
    ///
    /// Retains the mnemonic for later reveal. On any cryptographic failure
    /// the error is logged and an empty string is returned.
    pub fn generate(&self) -> String {
        let mnemonic = Mnemonic::new(MNEMONIC_WORDS, Language::English);
        match derive_address(mnemonic.phrase()) {
            Ok(address) => {
                *self.mnemonic.lock().expect("mnemonic lock") =
                    Zeroizing::new(mnemonic.phrase().to_string());
                address
            }
            Err(e) => {
                tracing::error!("Reward address generation failed: {}", e);
                String::new()
            }
        }
    }

    /// The generated mnemonic phrase, or an empty string once cleared.
    pub fn reveal_mnemonic(&self) -> String {
        self.mnemonic.lock().expect("mnemonic lock").to_string()
    }

    /// Overwrite the retained mnemonic. Safe to call repeatedly.
    pub fn clear_mnemonic(&self) {
        *self.mnemonic.lock().expect("mnemonic lock") = Zeroizing::new(String::new());
    }
}

impl Default for RewardIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Standard BIP39 test vector (24 words)
    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";

    #[test]
    fn test_generate_returns_address_and_mnemonic() {
        let identity = RewardIdentity::new();
        let address = identity.generate();

        assert!(!address.is_empty());
        assert_eq!(identity.reveal_mnemonic().split_whitespace().count(), 24);
    }

    #[test]
    fn test_clear_mnemonic() {
        let identity = RewardIdentity::new();
        let _ = identity.generate();
        assert!(!identity.reveal_mnemonic().is_empty());

        identity.clear_mnemonic();
        assert_eq!(identity.reveal_mnemonic(), "");

        // Repeated reveals after clearing keep returning empty.
        assert_eq!(identity.reveal_mnemonic(), "");
    }

    #[test]
    fn test_deterministic_derivation() {
        let a = derive_address(TEST_MNEMONIC).unwrap();
        let b = derive_address(TEST_MNEMONIC).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_invalid_mnemonic_rejected() {
        assert!(derive_address("definitely not a mnemonic").is_err());
    }

    #[test]
    fn test_encode_address_checksum() {
        let address = encode_address(&[7u8; 32]);
        let decoded = bs58::decode(&address).into_vec().unwrap();

        // Two-byte prefix + 32-byte key + 2-byte checksum.
        assert_eq!(decoded.len(), 36);
        assert_eq!(&decoded[2..34], &[7u8; 32]);

        let mut hasher = Blake2b512::new();
        hasher.update(b"SS58PRE");
        hasher.update(&decoded[..34]);
        let checksum = hasher.finalize();
        assert_eq!(&decoded[34..], &checksum[..2]);
    }

    #[test]
    fn test_distinct_keys_distinct_addresses() {
        assert_ne!(encode_address(&[1u8; 32]), encode_address(&[2u8; 32]));
    }
}
