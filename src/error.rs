//! Wallet error taxonomy
//!
//! Every failure mode names the offending account, address, or field.
//! Money operations never fail silently and never substitute defaults.

use thiserror::Error;

/// Errors surfaced by the wallet core.
///
/// All variants are recoverable by the caller except [`WalletError::CorruptData`]
/// on the vault file, which is fatal to that vault (no automatic repair).
#[derive(Debug, Error)]
pub enum WalletError {
    /// Wrong passphrase for the vault or an account secret
    #[error("authentication failed for {context}")]
    AuthenticationError { context: String },

    /// A vault, account, or secret that was expected to exist does not
    #[error("{what} not found: {which}")]
    NotFound { what: &'static str, which: String },

    /// A vault already exists at the given location
    #[error("vault already exists at {path}")]
    AlreadyExists { path: String },

    /// Erase guard: the account still holds funds
    #[error("account {address} is not empty (coin: {coin_balance}, token: {token_balance})")]
    NotEmpty {
        address: String,
        coin_balance: String,
        token_balance: String,
    },

    /// Persisted store is malformed. Fatal for the vault file.
    #[error("corrupt data in {what}: {detail}")]
    CorruptData { what: &'static str, detail: String },

    /// A raw transaction or RLP structure failed to parse
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// A decimal amount has more fractional digits than the token allows
    #[error("amount {amount} has more than {decimals} fractional digits")]
    PrecisionError { amount: String, decimals: u32 },

    /// A decimal amount string is not numeric
    #[error("amount {amount} is not a valid decimal number")]
    FormatError { amount: String },

    /// Amount conversion failed while building a transaction
    #[error("invalid {field} amount: {source}")]
    InvalidAmount {
        field: &'static str,
        #[source]
        source: Box<WalletError>,
    },

    /// A recipient name or address did not resolve to a known address
    #[error("unresolved address: {input}")]
    UnresolvedAddress { input: String },

    /// Gas price estimation failed; callers must not fall back to a guess
    #[error("fee estimation unavailable: {0}")]
    FeeUnavailable(String),

    /// The network collaborator failed
    #[error("network error during {context}: {detail}")]
    Network { context: String, detail: String },

    /// An account-dependent call was made before the vault was loaded
    #[error("vault is not loaded")]
    NotLoaded,

    /// A transaction skeleton is missing required fields
    #[error("malformed transaction skeleton: {0}")]
    MalformedSkeleton(String),

    /// Filesystem failure on the vault or secrets store
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl WalletError {
    pub(crate) fn network(context: impl Into<String>, detail: impl ToString) -> Self {
        Self::Network {
            context: context.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable name for the presentation boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationError { .. } => "authentication_error",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotEmpty { .. } => "not_empty",
            Self::CorruptData { .. } => "corrupt_data",
            Self::MalformedEncoding(_) => "malformed_encoding",
            Self::PrecisionError { .. } => "precision_error",
            Self::FormatError { .. } => "format_error",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::UnresolvedAddress { .. } => "unresolved_address",
            Self::FeeUnavailable(_) => "fee_unavailable",
            Self::Network { .. } => "network_error",
            Self::NotLoaded => "not_loaded",
            Self::MalformedSkeleton(_) => "malformed_skeleton",
            Self::Io { .. } => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offender() {
        let err = WalletError::NotEmpty {
            address: "ab".repeat(20),
            coin_balance: "0".into(),
            token_balance: "5".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains(&"ab".repeat(20)));
        assert!(msg.contains("token: 5"));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(WalletError::NotLoaded.code(), "not_loaded");
        assert_eq!(
            WalletError::FeeUnavailable("x".into()).code(),
            "fee_unavailable"
        );
    }
}
