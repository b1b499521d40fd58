//! Ember wallet core
//!
//! The engine behind an EVM-compatible desktop wallet: an encrypted key
//! vault, balance refresh against a JSON-RPC node, and legacy
//! transaction assembly, signing, and decoding. The core is synchronous
//! by contract; embedding layers run it from worker threads and talk to
//! it through [`api::Engine`] request/response pairs.
//!
//! Secrets never touch disk in cleartext and live in memory only inside
//! a [`secret::ScopedSecret`], which wipes its bytes on drop.

pub mod abi;
pub mod address;
pub mod amount;
pub mod api;
pub mod builder;
pub mod config;
pub mod decoder;
pub mod error;
pub mod hash;
pub mod oracle;
pub mod rlp;
pub mod rpc;
pub mod secmem;
pub mod secret;
pub mod signer;
pub mod vault;

pub use address::Address;
pub use api::{Engine, EngineOp, EngineRequest, EngineResponse};
pub use builder::{TransactionBuilder, TransactionSkeleton, TxKind};
pub use config::Config;
pub use decoder::DecodedTransaction;
pub use error::{Result, WalletError};
pub use oracle::{BalanceOracle, BalanceReport};
pub use rpc::{ChainClient, HttpNodeClient, TokenMetadata, COIN_BALANCE_BATCH};
pub use secret::ScopedSecret;
pub use signer::SignedTransaction;
pub use vault::{Account, KeyVault};
