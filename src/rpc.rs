//! Network collaborator
//!
//! The engine talks to the chain only through [`ChainClient`], a small
//! abstract surface: balance queries, fee/nonce lookups, token calls, and
//! raw-transaction broadcast. [`HttpNodeClient`] implements it over
//! blocking JSON-RPC 2.0 against a single node plus a separate
//! price-history service. Blocking is deliberate: every engine operation
//! is one synchronous unit of work, and any parallelism happens in the
//! embedding layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::abi;
use crate::address::Address;
use crate::builder::TransactionSkeleton;
use crate::error::{Result, WalletError};

/// Hard upper bound on addresses per coin-balance query. This is an
/// external API constraint, not a tunable.
pub const COIN_BALANCE_BATCH: usize = 20;

/// Timeout for node requests.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC request id counter.
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Metadata reported by a token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub decimals: u32,
    pub symbol: String,
    pub name: String,
}

/// The subset of a transaction receipt the wallet displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub status: Option<bool>,
    pub gas_used: Option<u64>,
    pub contract_address: Option<Address>,
}

/// One point of fiat price history.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PricePoint {
    pub timestamp: u64,
    pub price: f64,
}

/// Abstract chain/network operations the engine consumes.
///
/// Implementations must not retain or log any argument that could be a
/// secret; only public data crosses this boundary.
pub trait ChainClient {
    /// Native-coin balances for up to [`COIN_BALANCE_BATCH`] addresses in
    /// one query. Callers (the balance oracle) are responsible for
    /// chunking; passing more is a contract violation surfaced as an
    /// error, never a silent truncation.
    fn get_coin_balances(&self, addresses: &[Address]) -> Result<HashMap<Address, U256>>;

    /// Token balance of one address on one contract. The external API has
    /// no batched form for this.
    fn get_token_balance(&self, contract: Address, address: Address) -> Result<U256>;

    fn get_current_block_number(&self) -> Result<u64>;

    /// Receipt for a broadcast transaction, `None` while unmined.
    fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>>;

    fn estimate_gas_limit(&self, skeleton: &TransactionSkeleton) -> Result<u64>;

    /// Current recommended gas price in base units.
    fn get_gas_price(&self) -> Result<U256>;

    /// Current account nonce (number of sent transactions).
    fn get_transaction_count(&self, address: Address) -> Result<u64>;

    /// Whether `address` hosts a token contract.
    fn token_exists(&self, address: Address) -> Result<bool>;

    fn get_token_metadata(&self, address: Address) -> Result<TokenMetadata>;

    fn get_allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// Pair contract for two assets, `None` if the factory has no pair.
    fn get_pair_address(&self, asset_a: Address, asset_b: Address) -> Result<Option<Address>>;

    /// Reserves held by a pair contract.
    fn get_reserves(&self, pair: Address) -> Result<(U256, U256)>;

    /// Submit a signed raw transaction; returns the transaction hash.
    fn broadcast_raw_transaction(&self, raw_hex: &str) -> Result<String>;

    /// Fiat price history of a token over the last `days` days.
    fn get_price_history(&self, token: Address, days: u32) -> Result<Vec<PricePoint>>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Value,
    id: u64,
}

impl JsonRpcRequest {
    fn new(method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id: REQUEST_ID.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Blocking JSON-RPC client for one node endpoint.
pub struct HttpNodeClient {
    http: reqwest::blocking::Client,
    rpc_url: String,
    price_url: String,
    /// Factory contract consulted for pair lookups.
    pair_factory: Address,
}

impl HttpNodeClient {
    pub fn new(rpc_url: &str, price_url: &str, pair_factory: Address) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| WalletError::network("http client setup", e))?;
        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
            price_url: price_url.trim_end_matches('/').to_string(),
            pair_factory,
        })
    }

    fn call(&self, context: &str, method: &'static str, params: Value) -> Result<Value> {
        let request = JsonRpcRequest::new(method, params);
        debug!(method, id = request.id, "rpc call");
        let response: JsonRpcResponse = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| WalletError::network(context, e))?;

        if let Some(err) = response.error {
            return Err(WalletError::network(
                context,
                format!("rpc error {}: {}", err.code, err.message),
            ));
        }
        response
            .result
            .ok_or_else(|| WalletError::network(context, "missing result in rpc response"))
    }

    /// `eth_call` against a contract, returning the raw return data.
    fn eth_call(&self, context: &str, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let result = self.call(
            context,
            "eth_call",
            json!([{ "to": format!("0x{to}"), "data": format!("0x{}", hex::encode(data)) }, "latest"]),
        )?;
        decode_hex_value(context, &result)
    }
}

impl ChainClient for HttpNodeClient {
    fn get_coin_balances(&self, addresses: &[Address]) -> Result<HashMap<Address, U256>> {
        if addresses.len() > COIN_BALANCE_BATCH {
            return Err(WalletError::network(
                "coin balance batch",
                format!(
                    "{} addresses exceeds the batch limit of {COIN_BALANCE_BATCH}",
                    addresses.len()
                ),
            ));
        }
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }

        let requests: Vec<JsonRpcRequest> = addresses
            .iter()
            .map(|a| {
                JsonRpcRequest::new("eth_getBalance", json!([format!("0x{a}"), "latest"]))
            })
            .collect();
        let by_id: HashMap<u64, Address> = requests
            .iter()
            .zip(addresses)
            .map(|(req, addr)| (req.id, *addr))
            .collect();

        let context = "batched coin balances";
        let responses: Vec<JsonRpcResponse> = self
            .http
            .post(&self.rpc_url)
            .json(&requests)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| WalletError::network(context, e))?;

        let mut balances = HashMap::with_capacity(addresses.len());
        for response in responses {
            let address = *by_id.get(&response.id).ok_or_else(|| {
                WalletError::network(context, format!("unknown response id {}", response.id))
            })?;
            if let Some(err) = response.error {
                return Err(WalletError::network(
                    format!("coin balance for {address}"),
                    format!("rpc error {}: {}", err.code, err.message),
                ));
            }
            let result = response.result.ok_or_else(|| {
                WalletError::network(format!("coin balance for {address}"), "missing result")
            })?;
            balances.insert(address, parse_quantity(context, &result)?);
        }
        if balances.len() != addresses.len() {
            return Err(WalletError::network(context, "incomplete batch response"));
        }
        Ok(balances)
    }

    fn get_token_balance(&self, contract: Address, address: Address) -> Result<U256> {
        let context = format!("token {contract} balance for {address}");
        let data = self.eth_call(&context, contract, abi::encode_balance_of(address))?;
        abi::decode_uint(&data, 0)
    }

    fn get_current_block_number(&self) -> Result<u64> {
        let result = self.call("current block number", "eth_blockNumber", json!([]))?;
        parse_quantity("current block number", &result).map(|v| v.low_u64())
    }

    fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        let context = format!("receipt for {tx_hash}");
        let result = self.call(&context, "eth_getTransactionReceipt", json!([tx_hash]))?;
        if result.is_null() {
            return Ok(None);
        }

        let quantity = |field: &str| -> Result<Option<u64>> {
            match result.get(field) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => Ok(Some(parse_quantity(&context, v)?.low_u64())),
            }
        };
        let contract_address = match result.get("contractAddress") {
            None | Some(Value::Null) => None,
            Some(v) => v.as_str().and_then(Address::parse),
        };
        Ok(Some(TransactionReceipt {
            transaction_hash: tx_hash.to_string(),
            block_number: quantity("blockNumber")?,
            status: quantity("status")?.map(|s| s == 1),
            gas_used: quantity("gasUsed")?,
            contract_address,
        }))
    }

    fn estimate_gas_limit(&self, skeleton: &TransactionSkeleton) -> Result<u64> {
        let context = "gas limit estimate";
        let mut call_object = json!({
            "from": format!("0x{}", skeleton.from),
            "value": format!("0x{:x}", skeleton.value),
            "data": format!("0x{}", hex::encode(&skeleton.payload)),
        });
        if let Some(to) = skeleton.to {
            call_object["to"] = json!(format!("0x{to}"));
        }
        let result = self.call(context, "eth_estimateGas", json!([call_object]))?;
        parse_quantity(context, &result).map(|v| v.low_u64())
    }

    fn get_gas_price(&self) -> Result<U256> {
        let result = self.call("gas price", "eth_gasPrice", json!([]))?;
        parse_quantity("gas price", &result)
    }

    fn get_transaction_count(&self, address: Address) -> Result<u64> {
        let context = format!("nonce for {address}");
        let result = self.call(
            &context,
            "eth_getTransactionCount",
            json!([format!("0x{address}"), "latest"]),
        )?;
        parse_quantity(&context, &result).map(|v| v.low_u64())
    }

    fn token_exists(&self, address: Address) -> Result<bool> {
        let context = format!("token lookup for {address}");
        let result = self.call(&context, "eth_getCode", json!([format!("0x{address}"), "latest"]))?;
        let code = decode_hex_value(&context, &result)?;
        Ok(!code.is_empty())
    }

    fn get_token_metadata(&self, address: Address) -> Result<TokenMetadata> {
        let context = format!("metadata for token {address}");
        let decimals = {
            let data = self.eth_call(&context, address, abi::encode_decimals())?;
            abi::decode_uint(&data, 0)?.low_u32()
        };
        let symbol = abi::decode_string(&self.eth_call(&context, address, abi::encode_symbol())?)?;
        let name = abi::decode_string(&self.eth_call(&context, address, abi::encode_name())?)?;
        Ok(TokenMetadata {
            decimals,
            symbol,
            name,
        })
    }

    fn get_allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let context = format!("allowance on {token} from {owner} to {spender}");
        let data = self.eth_call(&context, token, abi::encode_allowance(owner, spender))?;
        abi::decode_uint(&data, 0)
    }

    fn get_pair_address(&self, asset_a: Address, asset_b: Address) -> Result<Option<Address>> {
        let context = format!("pair for {asset_a}/{asset_b}");
        let data = self.eth_call(
            &context,
            self.pair_factory,
            abi::encode_get_pair(asset_a, asset_b),
        )?;
        let pair = abi::decode_address(&data, 0)?;
        Ok(if pair.is_zero() { None } else { Some(pair) })
    }

    fn get_reserves(&self, pair: Address) -> Result<(U256, U256)> {
        let context = format!("reserves of pair {pair}");
        let data = self.eth_call(&context, pair, abi::encode_get_reserves())?;
        Ok((abi::decode_uint(&data, 0)?, abi::decode_uint(&data, 1)?))
    }

    fn broadcast_raw_transaction(&self, raw_hex: &str) -> Result<String> {
        let raw = if raw_hex.starts_with("0x") {
            raw_hex.to_string()
        } else {
            format!("0x{raw_hex}")
        };
        let result = self.call("transaction broadcast", "eth_sendRawTransaction", json!([raw]))?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::network("transaction broadcast", "non-string tx hash"))
    }

    fn get_price_history(&self, token: Address, days: u32) -> Result<Vec<PricePoint>> {
        let context = format!("price history for {token}");
        let url = format!("{}/tokens/0x{token}/history?days={days}", self.price_url);
        self.http
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| WalletError::network(context, e))
    }
}

/// Parse a JSON-RPC quantity (`"0x..."`) into a U256.
fn parse_quantity(context: &str, value: &Value) -> Result<U256> {
    let text = value
        .as_str()
        .ok_or_else(|| WalletError::network(context, "expected hex quantity string"))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::network(context, format!("quantity missing 0x: {text}")))?;
    U256::from_str_radix(digits, 16)
        .map_err(|_| WalletError::network(context, format!("bad hex quantity: {text}")))
}

/// Decode JSON-RPC return data (`"0x..."`) into bytes.
fn decode_hex_value(context: &str, value: &Value) -> Result<Vec<u8>> {
    let text = value
        .as_str()
        .ok_or_else(|| WalletError::network(context, "expected hex data string"))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).map_err(|_| WalletError::network(context, format!("bad hex data: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_parse() {
        assert_eq!(
            parse_quantity("t", &json!("0x0")).unwrap(),
            U256::zero()
        );
        assert_eq!(
            parse_quantity("t", &json!("0x5208")).unwrap(),
            U256::from(21000u64)
        );
        assert!(parse_quantity("t", &json!("5208")).is_err());
        assert!(parse_quantity("t", &json!(42)).is_err());
    }

    #[test]
    fn hex_data_decodes() {
        assert_eq!(decode_hex_value("t", &json!("0x")).unwrap(), Vec::<u8>::new());
        assert_eq!(
            decode_hex_value("t", &json!("0xdeadbeef")).unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert!(decode_hex_value("t", &json!("0xnope")).is_err());
    }

    #[test]
    fn request_ids_are_unique() {
        let a = JsonRpcRequest::new("eth_gasPrice", json!([]));
        let b = JsonRpcRequest::new("eth_gasPrice", json!([]));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn request_wire_shape() {
        let req = JsonRpcRequest::new("eth_blockNumber", json!([]));
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["method"], "eth_blockNumber");
        assert!(wire["id"].is_u64());
    }
}
