//! Raw transaction decode command

use anyhow::Result;

use ember_wallet::amount::{self, COIN_DECIMALS};
use ember_wallet::decoder;

pub fn run(raw_hex: &str) -> Result<()> {
    let tx = decoder::decode(raw_hex)?;

    println!("Hash:      {}", tx.hash);
    println!("Sender:    0x{}", tx.sender.to_checksum());
    match tx.to {
        Some(to) => println!("To:        0x{}", to.to_checksum()),
        None => println!("To:        (contract creation)"),
    }
    if let Some(creates) = tx.creates {
        println!("Creates:   0x{}", creates.to_checksum());
    }
    println!("Value:     {}", amount::to_decimal(tx.value, COIN_DECIMALS));
    println!("Nonce:     {}", tx.nonce);
    println!("Gas limit: {}", tx.gas_limit);
    println!("Gas price: {}", tx.gas_price);
    match tx.chain_id {
        Some(id) => println!("Chain id:  {}", id),
        None => println!("Chain id:  (pre-replay-protection signature)"),
    }
    if let Some(call) = tx.token_transfer {
        println!(
            "Token transfer: {} base units to 0x{}",
            call.amount,
            call.recipient.to_checksum()
        );
    } else if !tx.payload.is_empty() {
        println!("Payload:   0x{}", hex::encode(&tx.payload));
    }
    Ok(())
}
