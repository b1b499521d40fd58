//! Account rename command

use std::str::FromStr;

use anyhow::Result;

use ember_wallet::{Address, Config};

use super::{open_vault, print_success};

pub fn run(config: &Config, address: &str, new_name: &str) -> Result<()> {
    let address = Address::from_str(address)?;
    let (mut vault, _passphrase) = open_vault(config)?;

    vault.rename_account(address, new_name)?;
    print_success(&format!(
        "0x{} renamed to '{}'",
        address.to_checksum(),
        new_name
    ));
    Ok(())
}
