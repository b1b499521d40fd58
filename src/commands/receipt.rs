//! Transaction receipt lookup command

use anyhow::Result;

use ember_wallet::{ChainClient, Config};

use super::node_client;

pub fn run(config: &Config, tx_hash: &str) -> Result<()> {
    let client = node_client(config)?;

    match client.get_transaction_receipt(tx_hash)? {
        None => println!("Transaction not mined yet."),
        Some(receipt) => {
            println!("Hash:   {}", receipt.transaction_hash);
            match receipt.status {
                Some(true) => println!("Status: success"),
                Some(false) => println!("Status: reverted"),
                None => println!("Status: unknown"),
            }
            if let Some(block) = receipt.block_number {
                println!("Block:  {}", block);
            }
            if let Some(gas) = receipt.gas_used {
                println!("Gas:    {}", gas);
            }
            if let Some(contract) = receipt.contract_address {
                println!("Deployed contract: 0x{}", contract.to_checksum());
            }
        }
    }
    Ok(())
}
