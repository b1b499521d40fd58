//! Transaction assembly
//!
//! Builds unsigned transaction skeletons for native-coin and token
//! transfers. Amounts arrive as human decimal strings and are converted
//! through the amount codec; the sender nonce comes from the node. A
//! skeleton is immutable once built and consumed exactly once by the
//! signer.

use primitive_types::U256;

use crate::abi;
use crate::address::Address;
use crate::amount::{self, COIN_DECIMALS, GAS_PRICE_DECIMALS};
use crate::error::{Result, WalletError};
use crate::rpc::ChainClient;
use crate::vault::KeyVault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    CoinTransfer,
    TokenTransfer,
}

/// An unsigned transaction with every field populated except the
/// signature. `to` is `None` only for contract deployment, which the
/// builder never produces but the decoder must represent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSkeleton {
    pub kind: TxKind,
    pub from: Address,
    pub to: Option<Address>,
    /// Native-coin value in base units. Zero for token transfers, where
    /// the moved amount lives in the payload.
    pub value: U256,
    pub gas_limit: u64,
    /// Gas price in base units of the native coin.
    pub gas_price: U256,
    pub nonce: Option<u64>,
    /// Empty for coin transfers; ABI-encoded `transfer` call otherwise.
    pub payload: Vec<u8>,
    /// Deployed-contract address, set only by the decoder.
    pub creates: Option<Address>,
    pub chain_id: u64,
}

pub struct TransactionBuilder<'a, C: ChainClient + ?Sized> {
    client: &'a C,
    chain_id: u64,
}

impl<'a, C: ChainClient + ?Sized> TransactionBuilder<'a, C> {
    pub fn new(client: &'a C, chain_id: u64) -> Self {
        Self { client, chain_id }
    }

    /// Current recommended gas price in base units. Failure is surfaced
    /// as [`WalletError::FeeUnavailable`]; callers must never substitute
    /// a guessed price.
    pub fn estimate_fee(&self) -> Result<U256> {
        self.client
            .get_gas_price()
            .map_err(|e| WalletError::FeeUnavailable(e.to_string()))
    }

    /// Assemble a native-coin transfer. `from` and `to` accept an account
    /// name or a raw hex address; `amount` is human decimal coin units and
    /// `gas_price` is human decimal gas-price units.
    pub fn build_coin_transfer(
        &self,
        vault: &KeyVault,
        from: &str,
        to: &str,
        amount: &str,
        gas_limit: u64,
        gas_price: &str,
    ) -> Result<TransactionSkeleton> {
        let (from, to) = self.resolve_endpoints(vault, from, to)?;
        let value = convert_amount("transfer", amount, COIN_DECIMALS)?;
        let gas_price = convert_amount("gas price", gas_price, GAS_PRICE_DECIMALS)?;
        let nonce = self.client.get_transaction_count(from)?;

        Ok(TransactionSkeleton {
            kind: TxKind::CoinTransfer,
            from,
            to: Some(to),
            value,
            gas_limit,
            gas_price,
            nonce: Some(nonce),
            payload: Vec::new(),
            creates: None,
            chain_id: self.chain_id,
        })
    }

    /// Assemble a token transfer. The skeleton's `to` is the token
    /// contract; the recipient and amount are ABI-encoded into the
    /// payload and the native-coin value is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn build_token_transfer(
        &self,
        vault: &KeyVault,
        from: &str,
        to: &str,
        token_contract: Address,
        amount: &str,
        token_decimals: u32,
        gas_limit: u64,
        gas_price: &str,
    ) -> Result<TransactionSkeleton> {
        let (from, recipient) = self.resolve_endpoints(vault, from, to)?;
        let token_amount = convert_amount("transfer", amount, token_decimals)?;
        let gas_price = convert_amount("gas price", gas_price, GAS_PRICE_DECIMALS)?;
        let nonce = self.client.get_transaction_count(from)?;

        Ok(TransactionSkeleton {
            kind: TxKind::TokenTransfer,
            from,
            to: Some(token_contract),
            value: U256::zero(),
            gas_limit,
            gas_price,
            nonce: Some(nonce),
            payload: abi::encode_transfer(recipient, token_amount),
            creates: None,
            chain_id: self.chain_id,
        })
    }

    fn resolve_endpoints(
        &self,
        vault: &KeyVault,
        from: &str,
        to: &str,
    ) -> Result<(Address, Address)> {
        if !vault.is_loaded() {
            return Err(WalletError::NotLoaded);
        }
        let from = vault
            .resolve_address(from)
            .ok_or_else(|| WalletError::UnresolvedAddress {
                input: from.to_string(),
            })?;
        let to = vault
            .resolve_address(to)
            .ok_or_else(|| WalletError::UnresolvedAddress {
                input: to.to_string(),
            })?;
        Ok((from, to))
    }
}

fn convert_amount(field: &'static str, amount: &str, decimals: u32) -> Result<U256> {
    amount::to_base_units(amount, decimals).map_err(|e| WalletError::InvalidAmount {
        field,
        source: Box::new(e),
    })
}
