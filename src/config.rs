//! Wallet configuration
//!
//! Optional TOML file; every field has a default so a missing file just
//! means stock settings. The chain id matters for replay protection, so
//! it travels with the node endpoint rather than being hardcoded at the
//! call sites.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-RPC endpoint of the node.
    pub node_url: String,
    /// Price history service endpoint.
    pub price_url: String,
    /// Chain id used for replay-protected signing.
    pub chain_id: u64,
    /// Factory contract consulted for pair lookups.
    pub pair_factory: String,
    /// Token contract tracked alongside the coin. Consulted when a
    /// command needs a token and none was given, such as the erase
    /// guard's token-balance check.
    pub default_token: Option<String>,
    /// Directory holding the vault and secrets stores. Defaults to
    /// `~/.ember-wallet`.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_url: "https://api.avax.network/ext/bc/C/rpc".into(),
            price_url: "https://price.ember-wallet.org".into(),
            chain_id: 43114,
            pair_factory: "0xefa94DE7a4656D787667C749f7E1223D71E9FD82".into(),
            default_token: None,
            data_dir: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location, or fall back to
    /// stock settings when no file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = default_data_dir().join("config.toml");
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|e| WalletError::io(path.display().to_string(), e))?;
        toml::from_str(&text).map_err(|e| WalletError::CorruptData {
            what: "config file",
            detail: e.to_string(),
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn vault_path(&self) -> PathBuf {
        self.data_dir().join("vault.json")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.data_dir().join("secrets.json")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ember-wallet")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.chain_id, 43114);
        assert!(config.vault_path().ends_with("vault.json"));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "chain_id = 43113\nnode_url = \"http://localhost:9650\"\n\
             default_token = \"0x1ecd47ff4d9598f89721a2866bfeb99505a413ed\"\n",
        )
        .unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.chain_id, 43113);
        assert_eq!(config.node_url, "http://localhost:9650");
        assert_eq!(
            config.default_token.as_deref(),
            Some("0x1ecd47ff4d9598f89721a2866bfeb99505a413ed")
        );
        // untouched fields keep their defaults
        assert_eq!(config.pair_factory, Config::default().pair_factory);
    }

    #[test]
    fn bad_toml_is_corrupt_data() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "chain_id = \"not a number").unwrap();
        assert!(matches!(
            Config::load(Some(&path)).unwrap_err(),
            WalletError::CorruptData { .. }
        ));
    }
}
