//! CLI Commands
//!
//! Implementation of all wallet CLI commands.

pub mod accounts;
pub mod balance;
pub mod decode;
pub mod erase;
pub mod fee;
pub mod import_phrase;
pub mod init;
pub mod new_account;
pub mod receipt;
pub mod rename;
pub mod send;
pub mod token;

use std::io::{self, Write};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use zeroize::Zeroizing;

use ember_wallet::{Address, Config, HttpNodeClient, KeyVault};

/// Prompt for password input (hidden)
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let password = rpassword::read_password()?;
    Ok(Zeroizing::new(password))
}

/// Prompt for confirmation
pub fn prompt_confirm(message: &str) -> Result<bool> {
    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y") || input.trim().eq_ignore_ascii_case("yes"))
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}

/// Prompt for the vault passphrase and open the vault at the configured
/// locations.
pub fn open_vault(config: &Config) -> Result<(KeyVault, Zeroizing<String>)> {
    let vault_path = config.vault_path();
    if !vault_path.exists() {
        print_error("No vault found. Run 'ember-wallet init' first.");
        return Err(anyhow!("vault missing at {}", vault_path.display()));
    }

    let passphrase = prompt_password("Enter vault passphrase: ")?;
    let mut vault = KeyVault::new();
    vault.load(&vault_path, &config.secrets_path(), &passphrase)?;
    Ok((vault, passphrase))
}

/// Build the node client from config.
pub fn node_client(config: &Config) -> Result<HttpNodeClient> {
    let factory = Address::from_str(&config.pair_factory)?;
    Ok(HttpNodeClient::new(
        &config.node_url,
        &config.price_url,
        factory,
    )?)
}
