//! Transaction signing
//!
//! Produces the canonical legacy raw-transaction encoding with a
//! replay-protected recoverable signature (EIP-155). Signing is
//! deterministic (RFC 6979 nonces), so the same skeleton and secret
//! always yield byte-identical raw output.

use k256::ecdsa::RecoveryId;
use primitive_types::U256;

use crate::builder::TransactionSkeleton;
use crate::error::{Result, WalletError};
use crate::hash::keccak256;
use crate::rlp;
use crate::secret::ScopedSecret;

/// A signed, broadcast-ready transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Raw encoding, hex without a 0x prefix.
    pub raw_hex: String,
    /// keccak256 of the raw bytes, 0x-prefixed hex.
    pub hash: String,
}

/// Sign a skeleton, consuming it. Fails only on a malformed skeleton;
/// the secret is supplied directly, so there is no mismatch to detect.
pub fn sign(skeleton: TransactionSkeleton, secret: &ScopedSecret) -> Result<SignedTransaction> {
    let nonce = skeleton
        .nonce
        .ok_or_else(|| WalletError::MalformedSkeleton("nonce is not set".into()))?;
    if skeleton.gas_limit == 0 {
        return Err(WalletError::MalformedSkeleton("gas limit is zero".into()));
    }
    if skeleton.to.is_none() && skeleton.payload.is_empty() {
        return Err(WalletError::MalformedSkeleton(
            "no recipient and no deployment payload".into(),
        ));
    }

    // Replay-protected preimage: the nine-field encoding with the chain
    // id standing in for v and empty r, s.
    let digest = keccak256(&rlp::encode_list(&[
        rlp::encode_uint(U256::from(nonce)),
        rlp::encode_uint(skeleton.gas_price),
        rlp::encode_uint(U256::from(skeleton.gas_limit)),
        encode_recipient(&skeleton),
        rlp::encode_uint(skeleton.value),
        rlp::encode_bytes(&skeleton.payload),
        rlp::encode_uint(U256::from(skeleton.chain_id)),
        rlp::encode_uint(U256::zero()),
        rlp::encode_uint(U256::zero()),
    ]));

    let (signature, recovery) = secret
        .signing_key()
        .sign_prehash_recoverable(&digest)
        .map_err(|e| WalletError::MalformedSkeleton(format!("signing failed: {e}")))?;
    // Canonical form requires the low-s half of the signature; flipping
    // s flips the recovered y parity.
    let (signature, recovery) = match signature.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery.is_y_odd(), recovery.is_x_reduced()),
        ),
        None => (signature, recovery),
    };

    let v = skeleton.chain_id * 2 + 35 + u64::from(recovery.to_byte());
    let sig_bytes = signature.to_bytes();
    let r = U256::from_big_endian(&sig_bytes[..32]);
    let s = U256::from_big_endian(&sig_bytes[32..]);

    let raw = rlp::encode_list(&[
        rlp::encode_uint(U256::from(nonce)),
        rlp::encode_uint(skeleton.gas_price),
        rlp::encode_uint(U256::from(skeleton.gas_limit)),
        encode_recipient(&skeleton),
        rlp::encode_uint(skeleton.value),
        rlp::encode_bytes(&skeleton.payload),
        rlp::encode_uint(U256::from(v)),
        rlp::encode_uint(r),
        rlp::encode_uint(s),
    ]);

    Ok(SignedTransaction {
        hash: format!("0x{}", hex::encode(keccak256(&raw))),
        raw_hex: hex::encode(raw),
    })
}

fn encode_recipient(skeleton: &TransactionSkeleton) -> Vec<u8> {
    match skeleton.to {
        Some(to) => rlp::encode_bytes(to.as_bytes()),
        None => rlp::encode_bytes(&[]),
    }
}
