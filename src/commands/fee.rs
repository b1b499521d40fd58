//! Gas price lookup command

use anyhow::Result;

use ember_wallet::amount::{self, GAS_PRICE_DECIMALS};
use ember_wallet::{ChainClient, Config};

use super::node_client;

pub fn run(config: &Config) -> Result<()> {
    let client = node_client(config)?;
    let gas_price = client.get_gas_price()?;
    println!(
        "Recommended gas price: {} ({} base units)",
        amount::to_decimal(gas_price, GAS_PRICE_DECIMALS),
        gas_price
    );
    Ok(())
}
