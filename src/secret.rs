//! Scope-limited account secrets
//!
//! A [`ScopedSecret`] is the only form in which a decrypted signing key
//! exists in this process. The backing bytes live on the heap so the
//! memory lock stays valid across moves, are wiped on drop by `zeroize`,
//! and are locked against swapping for the lifetime of the value. The
//! vault hands these out; the signer borrows them and never copies the
//! key into longer-lived state.

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::address::Address;
use crate::error::{Result, WalletError};
use crate::hash::keccak256;
use crate::secmem::{lock_bytes, LockedRegion};

pub const SECRET_LEN: usize = 32;

/// A decrypted 256-bit signing key, wiped and unlocked on scope exit.
pub struct ScopedSecret {
    /// Dropped before `bytes` (declaration order), so munlock runs while
    /// the buffer is still alive.
    _lock: LockedRegion,
    bytes: Zeroizing<Vec<u8>>,
}

impl ScopedSecret {
    /// Wrap raw key bytes, validating that they form a usable secp256k1
    /// scalar (nonzero and below the group order).
    pub(crate) fn from_bytes(raw: [u8; SECRET_LEN]) -> Result<Self> {
        SigningKey::from_slice(&raw).map_err(|_| WalletError::CorruptData {
            what: "account secret",
            detail: "bytes are not a valid secp256k1 scalar".into(),
        })?;
        let bytes = Zeroizing::new(raw.to_vec());
        // SAFETY: the heap buffer lives as long as Self and is not
        // reallocated; the region is dropped first.
        let lock = unsafe { lock_bytes(&bytes) };
        Ok(Self { _lock: lock, bytes })
    }

    /// Generate a fresh random secret from the OS RNG.
    pub(crate) fn generate() -> Self {
        let key = SigningKey::random(&mut OsRng);
        let raw: [u8; SECRET_LEN] = key.to_bytes().into();
        // A freshly generated key is always a valid scalar
        Self::from_bytes(raw).expect("generated key is a valid scalar")
    }

    /// Deterministically derive a secret from a passphrase-like phrase.
    ///
    /// The same phrase always yields the same account; there is no salt
    /// and no randomness. This is strictly weaker than [`ScopedSecret::generate`]:
    /// anyone who can guess the phrase owns the account. Callers must
    /// present it to users as phrase-derived, not as equivalent to a
    /// random account.
    pub(crate) fn from_phrase(phrase: &str) -> Result<Self> {
        Self::from_bytes(keccak256(phrase.as_bytes()))
    }

    /// The address belonging to this secret: the trailing 20 bytes of
    /// keccak256 over the uncompressed public key.
    pub fn address(&self) -> Address {
        let key = self.signing_key();
        let point = key.verifying_key().to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        let mut addr = [0u8; Address::LEN];
        addr.copy_from_slice(&digest[12..]);
        Address::from_bytes(addr)
    }

    /// Borrow the key for a signing operation. The returned key is a
    /// transient copy; callers must not store it.
    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::from_slice(&self.bytes).expect("validated at construction")
    }

    /// Raw key bytes, for encryption into the secrets store.
    pub(crate) fn as_raw(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the backing memory is locked against swapping. Lock
    /// failures are non-fatal; this reports the degraded state.
    pub fn is_memory_locked(&self) -> bool {
        self._lock.is_locked()
    }
}

impl std::fmt::Debug for ScopedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        write!(f, "ScopedSecret({})", self.address())
    }
}
