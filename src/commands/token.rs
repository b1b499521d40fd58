//! Token metadata lookup command

use std::str::FromStr;

use anyhow::{anyhow, Result};

use ember_wallet::{Address, ChainClient, Config};

use super::node_client;

pub fn run(config: &Config, contract: &str) -> Result<()> {
    let contract = Address::from_str(contract)?;
    let client = node_client(config)?;

    if !client.token_exists(contract)? {
        return Err(anyhow!(
            "no contract code at 0x{}",
            contract.to_checksum()
        ));
    }

    let meta = client.get_token_metadata(contract)?;
    println!("Name:     {}", meta.name);
    println!("Symbol:   {}", meta.symbol);
    println!("Decimals: {}", meta.decimals);
    Ok(())
}
