//! Block producer digest decoding.
//!
//! Every Ceres block header carries a pre-runtime digest log with the
//! farmer's solution. Decoding it yields the reward address the block was
//! produced for, which is what farm detection compares against.

use codec::{Decode, Encode};

use crate::error::{Error, Result};
use crate::identity::encode_address;

/// Consensus engine identifier for the proof-of-capacity digests.
pub const POC_ENGINE_ID: [u8; 4] = *b"POC_";

/// A single header digest log entry.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum DigestLog {
    #[codec(index = 0)]
    Other(Vec<u8>),
    #[codec(index = 4)]
    Consensus([u8; 4], Vec<u8>),
    #[codec(index = 5)]
    Seal([u8; 4], Vec<u8>),
    #[codec(index = 6)]
    PreRuntime([u8; 4], Vec<u8>),
    #[codec(index = 8)]
    RuntimeEnvironmentUpdated,
}

/// The farmer solution embedded in a pre-runtime digest.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct FarmerSolution {
    /// Public key of the plot that solved the challenge
    pub public_key: [u8; 32],
    /// Reward address the solution pays out to
    pub reward_address: [u8; 32],
}

/// Pre-runtime digest content: the slot and the winning solution.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PreDigest {
    pub slot: u64,
    pub solution: FarmerSolution,
}

/// Decode one hex-encoded digest log entry.
fn decode_log(raw: &str) -> Result<DigestLog> {
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| Error::Decoding(format!("digest log is not hex: {}", e)))?;
    DigestLog::decode(&mut bytes.as_slice())
        .map_err(|e| Error::Decoding(format!("malformed digest log: {}", e)))
}

/// Extract the producer pre-digest from a header's digest logs.
///
/// The header carries exactly one pre-runtime entry; anything else (seals,
/// consensus messages) is skipped.
pub fn producer_pre_digest(logs: &[String]) -> Result<PreDigest> {
    for raw in logs {
        if let DigestLog::PreRuntime(_, payload) = decode_log(raw)? {
            return PreDigest::decode(&mut payload.as_slice())
                .map_err(|e| Error::Decoding(format!("malformed pre-runtime digest: {}", e)));
        }
    }
    Err(Error::Decoding("no pre-runtime digest in header".to_string()))
}

/// The SS58 reward address the block producer farmed to.
pub fn producer_reward_address(logs: &[String]) -> Result<String> {
    let pre_digest = producer_pre_digest(logs)?;
    Ok(encode_address(&pre_digest.solution.reward_address))
}
