//! Account creation command

use anyhow::Result;

use ember_wallet::Config;

use super::{open_vault, print_success, print_warning};

pub fn run(config: &Config, name: &str, hint: &str) -> Result<()> {
    let (mut vault, passphrase) = open_vault(config)?;

    let account = vault.create_account(name, &passphrase, hint, true)?;

    print_success(&format!("Account '{}' created", account.name));
    println!("Address: 0x{}", account.address.to_checksum());
    if hint.is_empty() {
        print_warning("No passphrase hint set. Losing the passphrase loses the account.");
    }
    Ok(())
}
