//! Send command: native coin or token transfer

use std::str::FromStr;

use anyhow::{anyhow, Result};

use ember_wallet::amount::{self, GAS_PRICE_DECIMALS};
use ember_wallet::{signer, Address, ChainClient, Config, TransactionBuilder};

use super::{node_client, open_vault, print_success, prompt_confirm};

const COIN_TRANSFER_GAS: u64 = 21_000;
const TOKEN_TRANSFER_GAS: u64 = 70_000;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &Config,
    from: &str,
    to: &str,
    amount: &str,
    token: Option<&str>,
    gas_limit: Option<u64>,
    gas_price: Option<&str>,
    yes: bool,
) -> Result<()> {
    let (vault, passphrase) = open_vault(config)?;
    let client = node_client(config)?;
    let builder = TransactionBuilder::new(&client, config.chain_id);

    let gas_price = match gas_price {
        Some(p) => p.to_string(),
        None => {
            let suggested = builder.estimate_fee()?;
            amount::to_decimal(suggested, GAS_PRICE_DECIMALS)
        }
    };

    let skeleton = match token {
        None => builder.build_coin_transfer(
            &vault,
            from,
            to,
            amount,
            gas_limit.unwrap_or(COIN_TRANSFER_GAS),
            &gas_price,
        )?,
        Some(contract) => {
            let contract = Address::from_str(contract)?;
            let meta = client.get_token_metadata(contract)?;
            println!("Token: {} ({})", meta.name, meta.symbol);
            builder.build_token_transfer(
                &vault,
                from,
                to,
                contract,
                amount,
                meta.decimals,
                gas_limit.unwrap_or(TOKEN_TRANSFER_GAS),
                &gas_price,
            )?
        }
    };

    println!();
    println!("From:      0x{}", skeleton.from.to_checksum());
    if let Some(to) = skeleton.to {
        println!("To:        0x{}", to.to_checksum());
    }
    println!("Amount:    {}", amount);
    println!("Gas price: {}", gas_price);
    println!("Gas limit: {}", skeleton.gas_limit);

    if !yes && !prompt_confirm("Send this transaction?")? {
        return Err(anyhow!("aborted"));
    }

    let secret = vault.unlock_secret(skeleton.from, &passphrase)?;
    let signed = signer::sign(skeleton, &secret)?;
    let tx_hash = client.broadcast_raw_transaction(&signed.raw_hex)?;

    print_success("Transaction broadcast");
    println!("Hash: {}", tx_hash);
    Ok(())
}
