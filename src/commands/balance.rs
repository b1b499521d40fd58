//! Balance refresh command

use std::str::FromStr;

use anyhow::Result;

use ember_wallet::amount::{self, COIN_DECIMALS};
use ember_wallet::{Address, BalanceOracle, ChainClient, Config};

use super::{node_client, open_vault, print_error};

pub fn run(config: &Config, token: Option<&str>) -> Result<()> {
    let (mut vault, _passphrase) = open_vault(config)?;
    let client = node_client(config)?;
    let oracle = BalanceOracle::new(&client);

    println!("Refreshing balances...");
    let report = oracle.refresh_all_coin_balances(&mut vault)?;
    for failure in &report.failures {
        print_error(&failure.to_string());
    }

    let token = match token {
        Some(t) => {
            let contract = Address::from_str(t)?;
            let meta = client.get_token_metadata(contract)?;
            Some((contract, meta))
        }
        None => None,
    };

    println!();
    let addresses: Vec<Address> = vault.list_accounts()?.iter().map(|a| a.address).collect();
    for address in addresses {
        let account = vault.account(address)?;
        println!("{} (0x{})", account.name, address.to_checksum());
        println!(
            "  coin: {}",
            amount::to_decimal(account.cached_coin_balance, COIN_DECIMALS)
        );
        if let Some((contract, meta)) = &token {
            let balance = oracle.refresh_token_balance(&mut vault, address, *contract)?;
            println!(
                "  {}: {}",
                meta.symbol,
                amount::to_decimal(balance, meta.decimals)
            );
        }
    }
    Ok(())
}
