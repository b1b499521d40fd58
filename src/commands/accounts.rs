//! Account listing command

use anyhow::Result;

use ember_wallet::amount::{self, COIN_DECIMALS};
use ember_wallet::Config;

use super::open_vault;

pub fn run(config: &Config) -> Result<()> {
    let (vault, _passphrase) = open_vault(config)?;

    let accounts = vault.list_accounts()?;
    if accounts.is_empty() {
        println!("No accounts yet. Run 'ember-wallet new-account <name>'.");
        return Ok(());
    }

    println!();
    for account in accounts {
        println!("{} (0x{})", account.name, account.address.to_checksum());
        println!(
            "  coin: {}  token: {}",
            amount::to_decimal(account.cached_coin_balance, COIN_DECIMALS),
            account.cached_token_balance
        );
    }
    println!();
    println!("Balances are cached; run 'ember-wallet balance' to refresh.");
    Ok(())
}
