//! Account erase command
//!
//! Refreshes both the coin balance and the token balance first so the
//! erase guard judges current numbers, not stale cache. The token leg
//! needs a contract to query: `--token`, or `default_token` from the
//! config. Without one the cached token balance is unverifiable and the
//! command refuses rather than risk destroying a funded key.

use std::str::FromStr;

use anyhow::{anyhow, Result};

use ember_wallet::{Address, BalanceOracle, Config};

use super::{node_client, open_vault, print_success, print_warning, prompt_confirm};

pub fn run(config: &Config, address: &str, token: Option<&str>) -> Result<()> {
    let address = Address::from_str(address)?;
    let token = match token.or(config.default_token.as_deref()) {
        Some(raw) => Address::from_str(raw)?,
        None => {
            return Err(anyhow!(
                "no token contract to verify against; pass --token or set \
                 default_token in the config"
            ))
        }
    };

    let (mut vault, _passphrase) = open_vault(config)?;
    let client = node_client(config)?;

    let oracle = BalanceOracle::new(&client);
    let report = oracle.refresh_coin_balances(&mut vault, &[address])?;
    if !report.is_complete() {
        return Err(anyhow!(
            "could not verify balances for 0x{}; refusing to erase",
            address.to_checksum()
        ));
    }
    oracle.refresh_token_balance(&mut vault, address, token)?;

    let name = vault.account(address)?.name.clone();
    print_warning("Erasing an account destroys its key. This cannot be undone.");
    if !prompt_confirm(&format!("Erase account '{}'?", name))? {
        return Err(anyhow!("aborted"));
    }

    vault.erase_account(address)?;
    print_success(&format!("Account '{}' erased", name));
    Ok(())
}
