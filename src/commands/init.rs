//! Vault creation command

use anyhow::{anyhow, Result};

use ember_wallet::{Config, KeyVault};

use super::{print_success, prompt_password};

pub fn run(config: &Config) -> Result<()> {
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let passphrase = prompt_password("Choose a vault passphrase: ")?;
    let confirm = prompt_password("Confirm passphrase: ")?;
    if *passphrase != *confirm {
        return Err(anyhow!("passphrases do not match"));
    }

    KeyVault::create_vault(&config.vault_path(), &config.secrets_path(), &passphrase)?;

    print_success(&format!("Vault created in {}", data_dir.display()));
    println!("Add an account with 'ember-wallet new-account <name>'.");
    Ok(())
}
