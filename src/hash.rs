//! Keccak-256 hashing

use sha3::{Digest, Keccak256};

/// Keccak-256, the hash used for transaction ids, address derivation, and
/// ABI selectors on the chain this wallet targets.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}
