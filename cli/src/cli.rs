//! # CLI Interface
//!
//! Defines the command-line argument structure for `vault-cli` using
//! `clap` derive. Every connection setting has an environment fallback so
//! the binary can be configured entirely from the environment in a
//! container.

use clap::{Args, Parser, Subcommand};
use vault_client::config::{DEFAULT_FROM_BLOCK, DEFAULT_RPC_URL, DEFAULT_VAULT_ADDRESS};
use vault_client::Address;

use crate::logging::LogFormat;

/// SimpleVault client.
///
/// Reads balances and lock state from a deployed SimpleVault, submits
/// deposits and withdrawals, rebuilds the account history from the event
/// log, and can serve all of that over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "vault-cli",
    about = "SimpleVault interaction client",
    version,
    propagate_version = true
)]
pub struct VaultCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and logging settings shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// JSON-RPC endpoint of the ledger node.
    #[arg(long, global = true, env = "VAULT_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Address of the deployed vault contract.
    #[arg(long, global = true, env = "VAULT_ADDRESS", default_value_t = DEFAULT_VAULT_ADDRESS)]
    pub vault: Address,

    /// First block included in history scans.
    #[arg(long, global = true, env = "VAULT_FROM_BLOCK", default_value_t = DEFAULT_FROM_BLOCK)]
    pub from_block: u64,

    /// Optional compiled contract artifact (Hardhat JSON or bare ABI array)
    /// to validate against before doing anything else.
    #[arg(long, global = true, env = "VAULT_ABI")]
    pub abi: Option<std::path::PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log level. `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show balance, lock state and whether a withdrawal would go through now.
    Status(AccountArgs),
    /// Print the account's deposit and withdrawal history.
    History(AccountArgs),
    /// Deposit native currency into the vault.
    Deposit(TransferArgs),
    /// Withdraw from the vault.
    Withdraw(TransferArgs),
    /// Serve the HTTP API and Prometheus metrics for one account.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct AccountArgs {
    /// Account address.
    pub account: Address,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Account address. The node must be able to sign for it.
    pub account: Address,
    /// Amount in ETH, e.g. `0.01`.
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the HTTP API.
    #[arg(long, env = "VAULT_API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "VAULT_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Account the API acts for.
    pub account: Address,
}

impl Commands {
    /// `true` for subcommands that talk to the ledger.
    pub fn needs_ledger(&self) -> bool {
        !matches!(self, Self::Version)
    }
}
