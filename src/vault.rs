//! Encrypted key vault
//!
//! Two files at caller-chosen locations make up a vault:
//! - the vault file: account index and metadata, plus an Argon2id
//!   passphrase verifier,
//! - the secrets store: one encrypted signing key per account.
//!
//! Keys are derived with Argon2id and sealed with ChaCha20-Poly1305.
//! Unknown JSON fields in either file are preserved across load/save so
//! newer wallet versions can extend the format without stranding older
//! ones.
//!
//! A [`KeyVault`] is an explicit handle: construct it once, load it, and
//! pass it into whatever needs accounts or secrets. Every
//! account-dependent operation fails fast with [`WalletError::NotLoaded`]
//! on an unloaded handle. At most one mutating vault operation may be in
//! flight at a time; the embedding layer is responsible for serializing
//! access (a single-writer lock around the handle is enough).

use std::fs;
use std::path::{Path, PathBuf};

use argon2::{
    password_hash::{rand_core::OsRng as SaltRng, SaltString},
    Argon2, PasswordHasher,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use primitive_types::U256;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::address::Address;
use crate::error::{Result, WalletError};
use crate::secret::{ScopedSecret, SECRET_LEN};

/// Current on-disk format version for both files.
const VAULT_VERSION: u32 = 1;

/// Plaintext sealed under the vault passphrase at creation; decrypting it
/// proves a load attempt supplied the right passphrase.
const VERIFIER_MARKER: &[u8] = b"ember-wallet vault verifier v1";

/// Argon2id parameters, sized for an interactive desktop unlock.
const ARGON2_MEMORY_KB: u32 = 65536; // 64 MB
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

mod u256_dec {
    use primitive_types::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let s = String::deserialize(d)?;
        U256::from_dec_str(&s).map_err(|_| de::Error::custom(format!("invalid balance: {s}")))
    }
}

/// One wallet account. Identity is the address; the id is an opaque tag
/// assigned at creation. Cached balances are written by balance refreshes
/// and consulted by the erase guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub address: Address,
    pub name: String,
    pub hint: String,
    #[serde(with = "u256_dec")]
    pub cached_coin_balance: U256,
    #[serde(with = "u256_dec")]
    pub cached_token_balance: U256,
    /// Fields written by newer wallet versions; carried through untouched.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Account {
    fn new(address: Address, name: String, hint: String) -> Self {
        let mut tag = [0u8; 16];
        rand::thread_rng().fill(&mut tag[..]);
        Self {
            id: hex::encode(tag),
            address,
            name,
            hint,
            cached_coin_balance: U256::zero(),
            cached_token_balance: U256::zero(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cached_coin_balance.is_zero() && self.cached_token_balance.is_zero()
    }
}

#[derive(Serialize, Deserialize)]
struct VaultFile {
    version: u32,
    /// Argon2 salt for the vault passphrase (base64)
    salt: String,
    /// ChaCha20-Poly1305 nonce for the verifier (hex)
    verifier_nonce: String,
    /// Sealed verifier marker (hex)
    verifier: String,
    accounts: Vec<Account>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct SecretEntry {
    address: Address,
    salt: String,
    nonce: String,
    ciphertext: String,
    uses_vault_passphrase: bool,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct SecretsFile {
    version: u32,
    secrets: Vec<SecretEntry>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

struct LoadedVault {
    vault_path: PathBuf,
    secrets_path: PathBuf,
    vault: VaultFile,
    secrets: SecretsFile,
}

/// Handle to an encrypted vault. Starts unloaded.
#[derive(Default)]
pub struct KeyVault {
    state: Option<LoadedVault>,
}

impl KeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize empty stores at the given locations. The vault still has
    /// to be loaded afterwards before any account operation.
    pub fn create_vault(vault_path: &Path, secrets_path: &Path, passphrase: &str) -> Result<()> {
        for path in [vault_path, secrets_path] {
            if path.exists() {
                return Err(WalletError::AlreadyExists {
                    path: path.display().to_string(),
                });
            }
        }

        let salt = SaltString::generate(&mut SaltRng);
        let key = derive_key(passphrase, salt.as_str())?;
        let (verifier_nonce, verifier) = seal(&key, VERIFIER_MARKER)?;

        let vault = VaultFile {
            version: VAULT_VERSION,
            salt: salt.to_string(),
            verifier_nonce,
            verifier,
            accounts: Vec::new(),
            extra: serde_json::Map::new(),
        };
        let secrets = SecretsFile {
            version: VAULT_VERSION,
            secrets: Vec::new(),
            extra: serde_json::Map::new(),
        };

        write_json(vault_path, &vault)?;
        if let Err(error) = write_json(secrets_path, &secrets) {
            // Leave no half-created vault behind; a retry must not hit
            // AlreadyExists on the file we just wrote.
            let _ = fs::remove_file(vault_path);
            return Err(error);
        }
        info!(vault = %vault_path.display(), "created new vault");
        Ok(())
    }

    /// Open and authenticate a vault. On success the handle transitions to
    /// loaded and account operations become available.
    pub fn load(&mut self, vault_path: &Path, secrets_path: &Path, passphrase: &str) -> Result<()> {
        let vault: VaultFile = read_json(vault_path, "vault file")?;
        let secrets: SecretsFile = read_json(secrets_path, "secrets store")?;

        if vault.version != VAULT_VERSION || secrets.version != VAULT_VERSION {
            return Err(WalletError::CorruptData {
                what: "vault file",
                detail: format!(
                    "unsupported format version {} (expected {VAULT_VERSION})",
                    vault.version
                ),
            });
        }

        let key = derive_key(passphrase, &vault.salt)?;
        open_sealed(&key, &vault.verifier_nonce, &vault.verifier)
            .ok()
            .filter(|marker| marker.as_slice() == VERIFIER_MARKER)
            .ok_or_else(|| WalletError::AuthenticationError {
                context: format!("vault at {}", vault_path.display()),
            })?;

        debug!(accounts = vault.accounts.len(), "vault authenticated");
        self.state = Some(LoadedVault {
            vault_path: vault_path.to_path_buf(),
            secrets_path: secrets_path.to_path_buf(),
            vault,
            secrets,
        });
        Ok(())
    }

    /// Drop the loaded state. Secrets handed out earlier keep their own
    /// lifetimes; the index simply becomes unavailable.
    pub fn close(&mut self) {
        self.state = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    fn loaded(&self) -> Result<&LoadedVault> {
        self.state.as_ref().ok_or(WalletError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedVault> {
        self.state.as_mut().ok_or(WalletError::NotLoaded)
    }

    /// Create a fresh random account and persist its encrypted secret.
    ///
    /// The secret is sealed under `passphrase`. With `uses_vault_passphrase`
    /// the supplied passphrase is first checked against the vault verifier,
    /// so an account flagged as vault-keyed can never diverge from it.
    pub fn create_account(
        &mut self,
        name: &str,
        passphrase: &str,
        hint: &str,
        uses_vault_passphrase: bool,
    ) -> Result<Account> {
        self.loaded()?;
        let secret = ScopedSecret::generate();
        self.store_account(secret, name, passphrase, hint, uses_vault_passphrase)
    }

    /// Create an account whose secret is derived deterministically from a
    /// phrase: keccak256(phrase) is the signing key.
    ///
    /// Unlike [`KeyVault::create_account`] there is no randomness: the same
    /// phrase always yields the same account, and anyone who guesses the
    /// phrase owns it. Callers must surface this weaker security property
    /// to the user rather than treating both paths as interchangeable.
    pub fn derive_account_from_phrase(
        &mut self,
        name: &str,
        phrase: &str,
        passphrase: &str,
        hint: &str,
        uses_vault_passphrase: bool,
    ) -> Result<Account> {
        self.loaded()?;
        let secret = ScopedSecret::from_phrase(phrase)?;
        self.store_account(secret, name, passphrase, hint, uses_vault_passphrase)
    }

    fn store_account(
        &mut self,
        secret: ScopedSecret,
        name: &str,
        passphrase: &str,
        hint: &str,
        uses_vault_passphrase: bool,
    ) -> Result<Account> {
        let state = self.loaded()?;
        if uses_vault_passphrase {
            let key = derive_key(passphrase, &state.vault.salt)?;
            let valid = open_sealed(&key, &state.vault.verifier_nonce, &state.vault.verifier)
                .ok()
                .is_some_and(|m| m == VERIFIER_MARKER);
            if !valid {
                return Err(WalletError::AuthenticationError {
                    context: "vault passphrase for new account".into(),
                });
            }
        }

        let address = secret.address();
        let state = self.loaded_mut()?;
        if state.vault.accounts.iter().any(|a| a.address == address) {
            return Err(WalletError::AlreadyExists {
                path: format!("account {address}"),
            });
        }

        let salt = SaltString::generate(&mut SaltRng);
        let key = derive_key(passphrase, salt.as_str())?;
        let (nonce, ciphertext) = seal(&key, secret.as_raw())?;

        let account = Account::new(address, name.to_string(), hint.to_string());
        state.vault.accounts.push(account.clone());
        state.secrets.secrets.push(SecretEntry {
            address,
            salt: salt.to_string(),
            nonce,
            ciphertext,
            uses_vault_passphrase,
            extra: serde_json::Map::new(),
        });
        state.persist()?;
        info!(%address, name, "created account");
        Ok(account)
    }

    /// Remove an account and its encrypted secret, irreversibly.
    ///
    /// Refuses with [`WalletError::NotEmpty`] unless both cached balances
    /// are exactly zero; callers must refresh balances first. This is the
    /// guard against deleting funded accounts.
    pub fn erase_account(&mut self, address: Address) -> Result<()> {
        let state = self.loaded_mut()?;
        let account = state
            .vault
            .accounts
            .iter()
            .find(|a| a.address == address)
            .ok_or_else(|| WalletError::NotFound {
                what: "account",
                which: address.to_string(),
            })?;

        if !account.is_empty() {
            return Err(WalletError::NotEmpty {
                address: address.to_string(),
                coin_balance: account.cached_coin_balance.to_string(),
                token_balance: account.cached_token_balance.to_string(),
            });
        }

        state.vault.accounts.retain(|a| a.address != address);
        state.secrets.secrets.retain(|s| s.address != address);
        state.persist()?;
        info!(%address, "erased account");
        Ok(())
    }

    /// Rename an account. Metadata only; identity is the address.
    pub fn rename_account(&mut self, address: Address, new_name: &str) -> Result<()> {
        let state = self.loaded_mut()?;
        let account = state
            .vault
            .accounts
            .iter_mut()
            .find(|a| a.address == address)
            .ok_or_else(|| WalletError::NotFound {
                what: "account",
                which: address.to_string(),
            })?;
        account.name = new_name.to_string();
        state.persist()
    }

    /// Record refreshed balances on an account. `None` leaves a cached
    /// value untouched.
    pub fn set_cached_balances(
        &mut self,
        address: Address,
        coin: Option<U256>,
        token: Option<U256>,
    ) -> Result<()> {
        let state = self.loaded_mut()?;
        let account = state
            .vault
            .accounts
            .iter_mut()
            .find(|a| a.address == address)
            .ok_or_else(|| WalletError::NotFound {
                what: "account",
                which: address.to_string(),
            })?;
        if let Some(coin) = coin {
            account.cached_coin_balance = coin;
        }
        if let Some(token) = token {
            account.cached_token_balance = token;
        }
        state.persist()
    }

    /// Decrypt the secret for `address`, bound to a wipe-on-drop guard.
    pub fn unlock_secret(&self, address: Address, passphrase: &str) -> Result<ScopedSecret> {
        let state = self.loaded()?;
        let entry = state
            .secrets
            .secrets
            .iter()
            .find(|s| s.address == address)
            .ok_or_else(|| WalletError::NotFound {
                what: "secret",
                which: address.to_string(),
            })?;

        let key = derive_key(passphrase, &entry.salt)?;
        let plaintext = Zeroizing::new(open_sealed(&key, &entry.nonce, &entry.ciphertext)
            .map_err(|_| WalletError::AuthenticationError {
                context: format!("secret for account {address}"),
            })?);

        let raw: [u8; SECRET_LEN] =
            plaintext
                .as_slice()
                .try_into()
                .map_err(|_| WalletError::CorruptData {
                    what: "secrets store",
                    detail: format!("secret for {address} has wrong length"),
                })?;
        let secret = ScopedSecret::from_bytes(raw)?;

        // The decrypted key must derive the address it is filed under
        if secret.address() != address {
            return Err(WalletError::CorruptData {
                what: "secrets store",
                detail: format!("secret for {address} derives a different address"),
            });
        }
        Ok(secret)
    }

    /// Resolve user input to an address: account-name lookup first, then
    /// raw hex validation. `None` means no match; callers must treat that
    /// as user error and never substitute a default address.
    pub fn resolve_address(&self, input: &str) -> Option<Address> {
        if let Some(state) = &self.state {
            if let Some(account) = state.vault.accounts.iter().find(|a| a.name == input) {
                return Some(account.address);
            }
        }
        Address::parse(input)
    }

    /// Accounts in creation order.
    pub fn list_accounts(&self) -> Result<&[Account]> {
        Ok(&self.loaded()?.vault.accounts)
    }

    pub fn account(&self, address: Address) -> Result<&Account> {
        self.loaded()?
            .vault
            .accounts
            .iter()
            .find(|a| a.address == address)
            .ok_or_else(|| WalletError::NotFound {
                what: "account",
                which: address.to_string(),
            })
    }
}

impl LoadedVault {
    fn persist(&self) -> Result<()> {
        write_json(&self.vault_path, &self.vault)?;
        write_json(&self.secrets_path, &self.secrets)
    }
}

fn derive_key(passphrase: &str, salt: &str) -> Result<Zeroizing<[u8; 32]>> {
    let salt = SaltString::from_b64(salt).map_err(|_| WalletError::CorruptData {
        what: "vault file",
        detail: "invalid key derivation salt".into(),
    })?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::new(ARGON2_MEMORY_KB, ARGON2_ITERATIONS, ARGON2_PARALLELISM, Some(32))
            .expect("static Argon2 parameters are valid"),
    );

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| WalletError::CorruptData {
            what: "vault file",
            detail: format!("key derivation failed: {e}"),
        })?;
    let output = hash.hash.ok_or_else(|| WalletError::CorruptData {
        what: "vault file",
        detail: "key derivation produced no output".into(),
    })?;

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&output.as_bytes()[..32]);
    Ok(key)
}

fn seal(key: &Zeroizing<[u8; 32]>, plaintext: &[u8]) -> Result<(String, String)> {
    let cipher =
        ChaCha20Poly1305::new_from_slice(key.as_slice()).expect("key is always 32 bytes");
    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| WalletError::CorruptData {
            what: "vault file",
            detail: "encryption failed".into(),
        })?;
    Ok((hex::encode(nonce_bytes), hex::encode(ciphertext)))
}

fn open_sealed(
    key: &Zeroizing<[u8; 32]>,
    nonce_hex: &str,
    ciphertext_hex: &str,
) -> std::result::Result<Vec<u8>, ()> {
    let nonce_bytes = hex::decode(nonce_hex).map_err(|_| ())?;
    let ciphertext = hex::decode(ciphertext_hex).map_err(|_| ())?;
    if nonce_bytes.len() != 12 {
        return Err(());
    }
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_slice()).map_err(|_| ())?;
    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| ())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, what: &'static str) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WalletError::NotFound {
                what,
                which: path.display().to_string(),
            }
        } else {
            WalletError::io(path.display().to_string(), e)
        }
    })?;
    serde_json::from_str(&text).map_err(|e| WalletError::CorruptData {
        what,
        detail: e.to_string(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WalletError::io(parent.display().to_string(), e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| WalletError::CorruptData {
        what: "vault file",
        detail: format!("serialization failed: {e}"),
    })?;

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| WalletError::io(path.display().to_string(), e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| WalletError::io(path.display().to_string(), e))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, json).map_err(|e| WalletError::io(path.display().to_string(), e))?;
    }

    Ok(())
}
