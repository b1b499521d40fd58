//! Balance refresh
//!
//! Fetches coin and token balances and writes them back into the vault's
//! cached account fields. Coin balances go out in batches of at most
//! [`COIN_BALANCE_BATCH`] addresses; the chunking lives here so callers
//! cannot exceed the limit. A failed batch is recorded and the remaining
//! batches still run, so one bad query never blanks the whole refresh.

use std::collections::HashMap;

use primitive_types::U256;
use tracing::{debug, warn};

use crate::address::Address;
use crate::error::{Result, WalletError};
use crate::rpc::{ChainClient, COIN_BALANCE_BATCH};
use crate::vault::KeyVault;

/// Outcome of a coin-balance refresh. `balances` holds every address
/// whose batch succeeded; `failures` holds one error per failed batch.
#[derive(Debug, Default)]
pub struct BalanceReport {
    pub balances: HashMap<Address, U256>,
    pub failures: Vec<WalletError>,
}

impl BalanceReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BalanceOracle<'a, C: ChainClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ChainClient + ?Sized> BalanceOracle<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Refresh the native-coin balances of every account in the vault.
    pub fn refresh_all_coin_balances(&self, vault: &mut KeyVault) -> Result<BalanceReport> {
        let addresses: Vec<Address> =
            vault.list_accounts()?.iter().map(|a| a.address).collect();
        self.refresh_coin_balances(vault, &addresses)
    }

    /// Refresh the native-coin balances of the given addresses and cache
    /// the results on their vault accounts. Returns the partial report;
    /// the outer `Err` is reserved for vault-state failures.
    pub fn refresh_coin_balances(
        &self,
        vault: &mut KeyVault,
        addresses: &[Address],
    ) -> Result<BalanceReport> {
        if !vault.is_loaded() {
            return Err(WalletError::NotLoaded);
        }

        let mut report = BalanceReport::default();
        for batch in addresses.chunks(COIN_BALANCE_BATCH) {
            debug!(size = batch.len(), "coin balance batch");
            match self.client.get_coin_balances(batch) {
                Ok(balances) => {
                    for (address, balance) in balances {
                        // Addresses without a vault account are reported
                        // but not cached.
                        match vault.set_cached_balances(address, Some(balance), None) {
                            Ok(()) | Err(WalletError::NotFound { .. }) => {}
                            Err(e) => return Err(e),
                        }
                        report.balances.insert(address, balance);
                    }
                }
                Err(error) => {
                    warn!(size = batch.len(), %error, "coin balance batch failed");
                    report.failures.push(error);
                }
            }
        }
        Ok(report)
    }

    /// Fetch one token balance and cache it on the account. The external
    /// API has no batched form; callers iterate sequentially.
    pub fn refresh_token_balance(
        &self,
        vault: &mut KeyVault,
        address: Address,
        token_contract: Address,
    ) -> Result<U256> {
        if !vault.is_loaded() {
            return Err(WalletError::NotLoaded);
        }
        let balance = self.client.get_token_balance(token_contract, address)?;
        vault.set_cached_balances(address, None, Some(balance))?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use tempfile::TempDir;

    use super::*;
    use crate::builder::TransactionSkeleton;
    use crate::rpc::{PricePoint, TokenMetadata, TransactionReceipt};

    /// Hands out a fixed balance per address and fails the configured
    /// batch (by index) to exercise partial-failure handling.
    struct ScriptedNode {
        batch_sizes: RefCell<Vec<usize>>,
        failing_batch: Option<usize>,
    }

    impl ScriptedNode {
        fn new(failing_batch: Option<usize>) -> Self {
            Self {
                batch_sizes: RefCell::new(Vec::new()),
                failing_batch,
            }
        }
    }

    impl ChainClient for ScriptedNode {
        fn get_coin_balances(&self, addresses: &[Address]) -> Result<HashMap<Address, U256>> {
            let index = self.batch_sizes.borrow().len();
            self.batch_sizes.borrow_mut().push(addresses.len());
            if self.failing_batch == Some(index) {
                return Err(WalletError::network("batched coin balances", "boom"));
            }
            Ok(addresses
                .iter()
                .map(|a| (*a, U256::from(a.as_bytes()[19] as u64)))
                .collect())
        }
        fn get_token_balance(&self, _: Address, _: Address) -> Result<U256> {
            Ok(U256::from(777u64))
        }
        fn get_current_block_number(&self) -> Result<u64> {
            unimplemented!()
        }
        fn get_transaction_receipt(&self, _: &str) -> Result<Option<TransactionReceipt>> {
            unimplemented!()
        }
        fn estimate_gas_limit(&self, _: &TransactionSkeleton) -> Result<u64> {
            unimplemented!()
        }
        fn get_gas_price(&self) -> Result<U256> {
            unimplemented!()
        }
        fn get_transaction_count(&self, _: Address) -> Result<u64> {
            unimplemented!()
        }
        fn token_exists(&self, _: Address) -> Result<bool> {
            unimplemented!()
        }
        fn get_token_metadata(&self, _: Address) -> Result<TokenMetadata> {
            unimplemented!()
        }
        fn get_allowance(&self, _: Address, _: Address, _: Address) -> Result<U256> {
            unimplemented!()
        }
        fn get_pair_address(&self, _: Address, _: Address) -> Result<Option<Address>> {
            unimplemented!()
        }
        fn get_reserves(&self, _: Address) -> Result<(U256, U256)> {
            unimplemented!()
        }
        fn broadcast_raw_transaction(&self, _: &str) -> Result<String> {
            unimplemented!()
        }
        fn get_price_history(&self, _: Address, _: u32) -> Result<Vec<PricePoint>> {
            unimplemented!()
        }
    }

    fn loaded_vault(dir: &TempDir) -> KeyVault {
        let vault_path = dir.path().join("vault.json");
        let secrets_path = dir.path().join("secrets.json");
        KeyVault::create_vault(&vault_path, &secrets_path, "pass").unwrap();
        let mut vault = KeyVault::new();
        vault.load(&vault_path, &secrets_path, "pass").unwrap();
        vault
    }

    fn synthetic_addresses(n: u8) -> Vec<Address> {
        (1..=n)
            .map(|i| {
                let mut bytes = [0u8; Address::LEN];
                bytes[19] = i;
                Address::from_bytes(bytes)
            })
            .collect()
    }

    #[test]
    fn forty_one_addresses_make_three_batches() {
        let dir = TempDir::new().unwrap();
        let mut vault = loaded_vault(&dir);
        let node = ScriptedNode::new(None);
        let oracle = BalanceOracle::new(&node);

        let addresses = synthetic_addresses(41);
        let report = oracle.refresh_coin_balances(&mut vault, &addresses).unwrap();

        assert_eq!(*node.batch_sizes.borrow(), vec![20, 20, 1]);
        assert!(report.is_complete());
        assert_eq!(report.balances.len(), 41);
    }

    #[test]
    fn failed_batch_keeps_results_from_the_others() {
        let dir = TempDir::new().unwrap();
        let mut vault = loaded_vault(&dir);
        let node = ScriptedNode::new(Some(1));
        let oracle = BalanceOracle::new(&node);

        let addresses = synthetic_addresses(41);
        let report = oracle.refresh_coin_balances(&mut vault, &addresses).unwrap();

        assert_eq!(*node.batch_sizes.borrow(), vec![20, 20, 1]);
        assert_eq!(report.failures.len(), 1);
        // first and third batch results survive
        assert_eq!(report.balances.len(), 21);
        assert!(report.balances.contains_key(&addresses[0]));
        assert!(report.balances.contains_key(&addresses[40]));
        assert!(!report.balances.contains_key(&addresses[20]));
    }

    #[test]
    fn refresh_updates_the_cached_balances() {
        let dir = TempDir::new().unwrap();
        let mut vault = loaded_vault(&dir);
        let account = vault.create_account("a", "pass", "", true).unwrap();
        let node = ScriptedNode::new(None);
        let oracle = BalanceOracle::new(&node);

        let report = oracle.refresh_all_coin_balances(&mut vault).unwrap();
        assert!(report.is_complete());
        let expected = U256::from(account.address.as_bytes()[19] as u64);
        assert_eq!(
            vault.account(account.address).unwrap().cached_coin_balance,
            expected
        );

        let token = Address::from_bytes([0xbb; Address::LEN]);
        let balance = oracle
            .refresh_token_balance(&mut vault, account.address, token)
            .unwrap();
        assert_eq!(balance, U256::from(777u64));
        assert_eq!(
            vault.account(account.address).unwrap().cached_token_balance,
            U256::from(777u64)
        );
    }

    #[test]
    fn refresh_requires_a_loaded_vault() {
        let mut vault = KeyVault::new();
        let node = ScriptedNode::new(None);
        let oracle = BalanceOracle::new(&node);
        let err = oracle
            .refresh_coin_balances(&mut vault, &synthetic_addresses(1))
            .unwrap_err();
        assert!(matches!(err, WalletError::NotLoaded));
    }
}
