//! Phrase-derived account import command

use anyhow::Result;

use ember_wallet::Config;

use super::{open_vault, print_success, print_warning, prompt_password};

pub fn run(config: &Config, name: &str) -> Result<()> {
    let (mut vault, passphrase) = open_vault(config)?;

    print_warning(
        "Phrase-derived accounts are only as strong as the phrase. \
         Anyone who can guess it owns the account.",
    );
    let phrase = prompt_password("Enter recovery phrase: ")?;

    let account = vault.derive_account_from_phrase(name, &phrase, &passphrase, "", true)?;

    print_success(&format!("Account '{}' imported", account.name));
    println!("Address: 0x{}", account.address.to_checksum());
    Ok(())
}
