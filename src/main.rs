//! Ember Wallet CLI
//!
//! A command-line front end over the wallet core, for an EVM-compatible
//! chain.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ember-wallet")]
#[command(about = "Ember wallet - manage accounts and send coin or tokens")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty vault
    Init,

    /// Create a new randomly generated account
    NewAccount {
        /// Display name for the account
        name: String,

        /// Passphrase hint stored alongside the account
        #[arg(long, default_value = "")]
        hint: String,
    },

    /// Import an account derived from a phrase
    ///
    /// The same phrase always yields the same account. A guessable
    /// phrase is a guessable key; prefer 'new-account' unless you need
    /// deterministic recovery.
    ImportPhrase {
        /// Display name for the account
        name: String,
    },

    /// List accounts with their cached balances
    Accounts,

    /// Refresh and show balances for all accounts
    Balance {
        /// Also fetch balances for this token contract
        #[arg(long)]
        token: Option<String>,
    },

    /// Send coin or tokens to a name or address
    Send {
        /// Sending account (name or address)
        from: String,

        /// Recipient (name or address)
        to: String,

        /// Amount in human decimal units
        amount: String,

        /// Token contract to send instead of the native coin
        #[arg(long)]
        token: Option<String>,

        /// Gas limit; defaults to 21000 for coin, 70000 for tokens
        #[arg(long)]
        gas_limit: Option<u64>,

        /// Gas price in human decimal units; fetched from the node if
        /// omitted
        #[arg(long)]
        gas_price: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show the current recommended gas price
    Fee,

    /// Decode a raw transaction hex string
    Decode {
        /// Raw transaction, hex with or without 0x
        raw_hex: String,
    },

    /// Look up a transaction receipt
    Receipt {
        /// Transaction hash
        tx_hash: String,
    },

    /// Show metadata for a token contract
    Token {
        /// Token contract address
        contract: String,
    },

    /// Rename an account
    Rename {
        /// Account address
        address: String,

        /// New display name
        new_name: String,
    },

    /// Erase an account. Refuses unless both cached balances are zero
    Erase {
        /// Account address
        address: String,
        /// Token contract whose balance is verified before erasing.
        /// Falls back to `default_token` from the config
        #[arg(long)]
        token: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = ember_wallet::Config::load(cli.config.as_deref().map(std::path::Path::new))?;

    match cli.command {
        Commands::Init => commands::init::run(&config),
        Commands::NewAccount { name, hint } => commands::new_account::run(&config, &name, &hint),
        Commands::ImportPhrase { name } => commands::import_phrase::run(&config, &name),
        Commands::Accounts => commands::accounts::run(&config),
        Commands::Balance { token } => commands::balance::run(&config, token.as_deref()),
        Commands::Send {
            from,
            to,
            amount,
            token,
            gas_limit,
            gas_price,
            yes,
        } => commands::send::run(
            &config,
            &from,
            &to,
            &amount,
            token.as_deref(),
            gas_limit,
            gas_price.as_deref(),
            yes,
        ),
        Commands::Fee => commands::fee::run(&config),
        Commands::Decode { raw_hex } => commands::decode::run(&raw_hex),
        Commands::Receipt { tx_hash } => commands::receipt::run(&config, &tx_hash),
        Commands::Token { contract } => commands::token::run(&config, &contract),
        Commands::Rename { address, new_name } => {
            commands::rename::run(&config, &address, &new_name)
        }
        Commands::Erase { address, token } => {
            commands::erase::run(&config, &address, token.as_deref())
        }
    }
}
