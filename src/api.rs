//! Engine request/response surface
//!
//! The embedding layer (a UI, a test harness) drives the wallet through
//! JSON request/response pairs. Every request carries an opaque `id`
//! that is echoed back verbatim, so a caller dispatching work across
//! threads can correlate answers without the engine knowing anything
//! about its threading. The engine itself stays synchronous; callers
//! serialize mutating vault operations.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::address::Address;
use crate::amount;
use crate::builder::TransactionBuilder;
use crate::decoder;
use crate::error::{Result, WalletError};
use crate::oracle::BalanceOracle;
use crate::rpc::ChainClient;
use crate::signer;
use crate::vault::KeyVault;

#[derive(Debug, Deserialize)]
pub struct EngineRequest {
    /// Opaque correlation id, echoed back untouched.
    pub id: Value,
    #[serde(flatten)]
    pub op: EngineOp,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineOp {
    CreateVault {
        vault_path: String,
        secrets_path: String,
        passphrase: String,
    },
    LoadVault {
        vault_path: String,
        secrets_path: String,
        passphrase: String,
    },
    CloseVault,
    CreateAccount {
        name: String,
        passphrase: String,
        #[serde(default)]
        hint: String,
        #[serde(default)]
        uses_vault_passphrase: bool,
    },
    DeriveAccountFromPhrase {
        name: String,
        phrase: String,
        passphrase: String,
        #[serde(default)]
        hint: String,
        #[serde(default)]
        uses_vault_passphrase: bool,
    },
    EraseAccount {
        address: String,
    },
    RenameAccount {
        address: String,
        new_name: String,
    },
    ListAccounts,
    RefreshCoinBalances,
    RefreshTokenBalance {
        address: String,
        token_contract: String,
    },
    EstimateFee,
    SendCoinTransfer {
        from: String,
        to: String,
        amount: String,
        gas_limit: u64,
        gas_price: String,
        passphrase: String,
    },
    SendTokenTransfer {
        from: String,
        to: String,
        token_contract: String,
        amount: String,
        token_decimals: u32,
        gas_limit: u64,
        gas_price: String,
        passphrase: String,
    },
    DecodeTransaction {
        raw_hex: String,
    },
    GetCurrentBlockNumber,
    GetTransactionReceipt {
        tx_hash: String,
    },
    GetTokenMetadata {
        contract: String,
    },
    GetAllowance {
        token_contract: String,
        owner: String,
        spender: String,
    },
    GetPairAddress {
        asset_a: String,
        asset_b: String,
    },
    GetReserves {
        pair: String,
    },
    GetPriceHistory {
        token: String,
        days: u32,
    },
}

/// Response envelope. Exactly one of `result` and `error` is set.
#[derive(Debug)]
pub struct EngineResponse {
    pub id: Value,
    pub result: std::result::Result<Value, WalletError>,
}

impl EngineResponse {
    pub fn to_json(&self) -> Value {
        match &self.result {
            Ok(value) => json!({ "id": self.id, "result": value }),
            Err(error) => json!({
                "id": self.id,
                "error": { "code": error.code(), "message": error.to_string() },
            }),
        }
    }
}

/// The wallet engine: one vault, one network client, one chain.
pub struct Engine<C: ChainClient> {
    vault: KeyVault,
    client: C,
    chain_id: u64,
}

impl<C: ChainClient> Engine<C> {
    pub fn new(client: C, chain_id: u64) -> Self {
        Self {
            vault: KeyVault::new(),
            client,
            chain_id,
        }
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn handle(&mut self, request: EngineRequest) -> EngineResponse {
        let result = self.dispatch(request.op);
        EngineResponse {
            id: request.id,
            result,
        }
    }

    /// Parse and dispatch a raw JSON request. A request that does not
    /// parse at all gets a null-id error response.
    pub fn handle_json(&mut self, raw: &str) -> Value {
        match serde_json::from_str::<EngineRequest>(raw) {
            Ok(request) => self.handle(request).to_json(),
            Err(e) => EngineResponse {
                id: Value::Null,
                result: Err(WalletError::MalformedEncoding(format!(
                    "unparseable request: {e}"
                ))),
            }
            .to_json(),
        }
    }

    fn dispatch(&mut self, op: EngineOp) -> Result<Value> {
        match op {
            EngineOp::CreateVault {
                vault_path,
                secrets_path,
                passphrase,
            } => {
                KeyVault::create_vault(
                    Path::new(&vault_path),
                    Path::new(&secrets_path),
                    &passphrase,
                )?;
                Ok(json!({}))
            }
            EngineOp::LoadVault {
                vault_path,
                secrets_path,
                passphrase,
            } => {
                self.vault
                    .load(Path::new(&vault_path), Path::new(&secrets_path), &passphrase)?;
                info!(accounts = self.vault.list_accounts()?.len(), "vault loaded");
                Ok(json!({}))
            }
            EngineOp::CloseVault => {
                self.vault.close();
                Ok(json!({}))
            }
            EngineOp::CreateAccount {
                name,
                passphrase,
                hint,
                uses_vault_passphrase,
            } => {
                let account =
                    self.vault
                        .create_account(&name, &passphrase, &hint, uses_vault_passphrase)?;
                Ok(serde_json::to_value(account).map_err(|e| WalletError::CorruptData {
                    what: "account",
                    detail: e.to_string(),
                })?)
            }
            EngineOp::DeriveAccountFromPhrase {
                name,
                phrase,
                passphrase,
                hint,
                uses_vault_passphrase,
            } => {
                let account = self.vault.derive_account_from_phrase(
                    &name,
                    &phrase,
                    &passphrase,
                    &hint,
                    uses_vault_passphrase,
                )?;
                Ok(serde_json::to_value(account).map_err(|e| WalletError::CorruptData {
                    what: "account",
                    detail: e.to_string(),
                })?)
            }
            EngineOp::EraseAccount { address } => {
                self.vault.erase_account(address.parse()?)?;
                Ok(json!({}))
            }
            EngineOp::RenameAccount { address, new_name } => {
                self.vault.rename_account(address.parse()?, &new_name)?;
                Ok(json!({}))
            }
            EngineOp::ListAccounts => {
                let accounts = self.vault.list_accounts()?;
                Ok(serde_json::to_value(accounts).map_err(|e| WalletError::CorruptData {
                    what: "account",
                    detail: e.to_string(),
                })?)
            }
            EngineOp::RefreshCoinBalances => {
                let oracle = BalanceOracle::new(&self.client);
                let report = oracle.refresh_all_coin_balances(&mut self.vault)?;
                let balances: Value = report
                    .balances
                    .iter()
                    .map(|(a, b)| (a.to_string(), json!(b.to_string())))
                    .collect::<serde_json::Map<String, Value>>()
                    .into();
                let failures: Vec<String> =
                    report.failures.iter().map(|e| e.to_string()).collect();
                Ok(json!({ "balances": balances, "failures": failures }))
            }
            EngineOp::RefreshTokenBalance {
                address,
                token_contract,
            } => {
                let oracle = BalanceOracle::new(&self.client);
                let balance = oracle.refresh_token_balance(
                    &mut self.vault,
                    address.parse()?,
                    token_contract.parse()?,
                )?;
                Ok(json!({ "balance": balance.to_string() }))
            }
            EngineOp::EstimateFee => {
                let builder = TransactionBuilder::new(&self.client, self.chain_id);
                let gas_price = builder.estimate_fee()?;
                Ok(json!({
                    "gas_price": gas_price.to_string(),
                    "gas_price_decimal": amount::to_decimal(gas_price, amount::GAS_PRICE_DECIMALS),
                }))
            }
            EngineOp::SendCoinTransfer {
                from,
                to,
                amount,
                gas_limit,
                gas_price,
                passphrase,
            } => {
                let builder = TransactionBuilder::new(&self.client, self.chain_id);
                let skeleton = builder
                    .build_coin_transfer(&self.vault, &from, &to, &amount, gas_limit, &gas_price)?;
                self.sign_and_broadcast(skeleton, &passphrase)
            }
            EngineOp::SendTokenTransfer {
                from,
                to,
                token_contract,
                amount,
                token_decimals,
                gas_limit,
                gas_price,
                passphrase,
            } => {
                let builder = TransactionBuilder::new(&self.client, self.chain_id);
                let skeleton = builder.build_token_transfer(
                    &self.vault,
                    &from,
                    &to,
                    token_contract.parse()?,
                    &amount,
                    token_decimals,
                    gas_limit,
                    &gas_price,
                )?;
                self.sign_and_broadcast(skeleton, &passphrase)
            }
            EngineOp::DecodeTransaction { raw_hex } => {
                let decoded = decoder::decode(&raw_hex)?;
                let token_transfer = decoded.token_transfer.as_ref().map(|call| {
                    json!({
                        "recipient": call.recipient.to_string(),
                        "amount": call.amount.to_string(),
                    })
                });
                Ok(json!({
                    "nonce": decoded.nonce,
                    "gas_price": decoded.gas_price.to_string(),
                    "gas_limit": decoded.gas_limit,
                    "to": decoded.to.map(|a| a.to_string()),
                    "value": decoded.value.to_string(),
                    "payload": hex::encode(&decoded.payload),
                    "chain_id": decoded.chain_id,
                    "sender": decoded.sender.to_string(),
                    "creates": decoded.creates.map(|a| a.to_string()),
                    "token_transfer": token_transfer,
                    "hash": decoded.hash,
                }))
            }
            EngineOp::GetCurrentBlockNumber => {
                Ok(json!({ "block": self.client.get_current_block_number()? }))
            }
            EngineOp::GetTransactionReceipt { tx_hash } => {
                let receipt = self.client.get_transaction_receipt(&tx_hash)?;
                Ok(match receipt {
                    None => Value::Null,
                    Some(r) => json!({
                        "transaction_hash": r.transaction_hash,
                        "block_number": r.block_number,
                        "status": r.status,
                        "gas_used": r.gas_used,
                        "contract_address": r.contract_address.map(|a| a.to_string()),
                    }),
                })
            }
            EngineOp::GetTokenMetadata { contract } => {
                let contract: Address = contract.parse()?;
                if !self.client.token_exists(contract)? {
                    return Err(WalletError::NotFound {
                        what: "token contract",
                        which: contract.to_string(),
                    });
                }
                let meta = self.client.get_token_metadata(contract)?;
                Ok(json!({
                    "decimals": meta.decimals,
                    "symbol": meta.symbol,
                    "name": meta.name,
                }))
            }
            EngineOp::GetAllowance {
                token_contract,
                owner,
                spender,
            } => {
                let allowance = self.client.get_allowance(
                    token_contract.parse()?,
                    owner.parse()?,
                    spender.parse()?,
                )?;
                Ok(json!({ "allowance": allowance.to_string() }))
            }
            EngineOp::GetPairAddress { asset_a, asset_b } => {
                let pair = self
                    .client
                    .get_pair_address(asset_a.parse()?, asset_b.parse()?)?;
                Ok(json!({ "pair": pair.map(|a| a.to_string()) }))
            }
            EngineOp::GetReserves { pair } => {
                let (a, b) = self.client.get_reserves(pair.parse()?)?;
                Ok(json!({ "reserve_a": a.to_string(), "reserve_b": b.to_string() }))
            }
            EngineOp::GetPriceHistory { token, days } => {
                let points = self.client.get_price_history(token.parse()?, days)?;
                let points: Vec<Value> = points
                    .iter()
                    .map(|p| json!({ "timestamp": p.timestamp, "price": p.price }))
                    .collect();
                Ok(json!(points))
            }
        }
    }

    fn sign_and_broadcast(
        &self,
        skeleton: crate::builder::TransactionSkeleton,
        passphrase: &str,
    ) -> Result<Value> {
        let sender = skeleton.from;
        let secret = self.vault.unlock_secret(sender, passphrase)?;
        let signed = signer::sign(skeleton, &secret)?;
        let tx_hash = self.client.broadcast_raw_transaction(&signed.raw_hex)?;
        info!(%sender, tx_hash, "transaction broadcast");
        Ok(json!({ "hash": tx_hash, "raw_hex": signed.raw_hex }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    struct NullNode;

    impl ChainClient for NullNode {
        fn get_coin_balances(
            &self,
            _: &[Address],
        ) -> Result<std::collections::HashMap<Address, primitive_types::U256>> {
            Ok(std::collections::HashMap::new())
        }
        fn get_token_balance(
            &self,
            _: Address,
            _: Address,
        ) -> Result<primitive_types::U256> {
            Ok(primitive_types::U256::zero())
        }
        fn get_current_block_number(&self) -> Result<u64> {
            Ok(1234)
        }
        fn get_transaction_receipt(
            &self,
            _: &str,
        ) -> Result<Option<crate::rpc::TransactionReceipt>> {
            Ok(None)
        }
        fn estimate_gas_limit(&self, _: &crate::builder::TransactionSkeleton) -> Result<u64> {
            Ok(21000)
        }
        fn get_gas_price(&self) -> Result<primitive_types::U256> {
            Ok(primitive_types::U256::from(25_000_000_000u64))
        }
        fn get_transaction_count(&self, _: Address) -> Result<u64> {
            Ok(0)
        }
        fn token_exists(&self, _: Address) -> Result<bool> {
            Ok(false)
        }
        fn get_token_metadata(&self, _: Address) -> Result<crate::rpc::TokenMetadata> {
            unimplemented!()
        }
        fn get_allowance(
            &self,
            _: Address,
            _: Address,
            _: Address,
        ) -> Result<primitive_types::U256> {
            Ok(primitive_types::U256::zero())
        }
        fn get_pair_address(&self, _: Address, _: Address) -> Result<Option<Address>> {
            Ok(None)
        }
        fn get_reserves(
            &self,
            _: Address,
        ) -> Result<(primitive_types::U256, primitive_types::U256)> {
            Ok((primitive_types::U256::zero(), primitive_types::U256::zero()))
        }
        fn broadcast_raw_transaction(&self, _: &str) -> Result<String> {
            Ok("0xfeed".into())
        }
        fn get_price_history(&self, _: Address, _: u32) -> Result<Vec<crate::rpc::PricePoint>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn responses_echo_the_opaque_id() {
        let mut engine = Engine::new(NullNode, 1);
        let response = engine.handle(EngineRequest {
            id: json!({"seq": 42, "tab": "main"}),
            op: EngineOp::GetCurrentBlockNumber,
        });
        let wire = response.to_json();
        assert_eq!(wire["id"], json!({"seq": 42, "tab": "main"}));
        assert_eq!(wire["result"]["block"], 1234);
    }

    #[test]
    fn errors_carry_stable_codes() {
        let mut engine = Engine::new(NullNode, 1);
        let response = engine.handle(EngineRequest {
            id: json!(7),
            op: EngineOp::ListAccounts,
        });
        let wire = response.to_json();
        assert_eq!(wire["id"], json!(7));
        assert_eq!(wire["error"]["code"], "not_loaded");
    }

    #[test]
    fn full_vault_lifecycle_over_json() {
        let dir = TempDir::new().unwrap();
        let vault_path = dir.path().join("vault.json");
        let secrets_path = dir.path().join("secrets.json");
        let mut engine = Engine::new(NullNode, 1);

        let create = json!({
            "id": 1, "op": "create_vault",
            "vault_path": vault_path.to_str().unwrap(),
            "secrets_path": secrets_path.to_str().unwrap(),
            "passphrase": "hunter2",
        });
        let out = engine.handle_json(&create.to_string());
        assert!(out.get("error").is_none(), "{out}");

        let load = json!({
            "id": 2, "op": "load_vault",
            "vault_path": vault_path.to_str().unwrap(),
            "secrets_path": secrets_path.to_str().unwrap(),
            "passphrase": "hunter2",
        });
        let out = engine.handle_json(&load.to_string());
        assert!(out.get("error").is_none(), "{out}");

        let out = engine.handle_json(
            &json!({
                "id": 3, "op": "create_account",
                "name": "main", "passphrase": "hunter2",
                "uses_vault_passphrase": true,
            })
            .to_string(),
        );
        assert_eq!(out["result"]["name"], "main");

        let out = engine.handle_json(&json!({"id": 4, "op": "list_accounts"}).to_string());
        assert_eq!(out["result"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn unparseable_requests_get_a_null_id_error() {
        let mut engine = Engine::new(NullNode, 1);
        let out = engine.handle_json("{nonsense");
        assert_eq!(out["id"], Value::Null);
        assert_eq!(out["error"]["code"], "malformed_encoding");
    }

    #[test]
    fn send_signs_and_broadcasts() {
        let dir = TempDir::new().unwrap();
        let vault_path = dir.path().join("vault.json");
        let secrets_path = dir.path().join("secrets.json");
        KeyVault::create_vault(&vault_path, &secrets_path, "pw").unwrap();

        let mut engine = Engine::new(NullNode, 43114);
        engine
            .vault
            .load(&vault_path, &secrets_path, "pw")
            .unwrap();
        engine.vault.create_account("main", "pw", "", true).unwrap();

        let out = engine.handle_json(
            &json!({
                "id": 9, "op": "send_coin_transfer",
                "from": "main",
                "to": "0x000000000000000000000000000000000000beef",
                "amount": "1.5", "gas_limit": 21000, "gas_price": "25",
                "passphrase": "pw",
            })
            .to_string(),
        );
        assert_eq!(out["result"]["hash"], "0xfeed");
        let raw = out["result"]["raw_hex"].as_str().unwrap();
        let decoded = decoder::decode(raw).unwrap();
        assert_eq!(decoded.nonce, 0);
        assert_eq!(decoded.chain_id, Some(43114));
    }
}
