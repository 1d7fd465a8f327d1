// Copyright (c) 2026 SimpleVault Contributors. MIT License.
// See LICENSE for details.

//! # SimpleVault CLI
//!
//! Entry point for the `vault-cli` binary. Parses arguments, initializes
//! logging, checks that the vault is actually deployed, and dispatches to a
//! subcommand:
//!
//! - `status`   — snapshot plus whether a withdrawal would go through now
//! - `history`  — the account's deposit/withdrawal timeline
//! - `deposit`  — submit a deposit
//! - `withdraw` — validate and submit a withdrawal
//! - `serve`    — HTTP API and Prometheus metrics for one account
//! - `version`  — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::Parser;
use tokio::signal;

use vault_client::gateway::JsonRpcGateway;
use vault_client::session::unix_now;
use vault_client::{
    validate, Address, HistoryKind, ValidationVerdict, VaultClient, VaultConfig, VaultInterface,
    VaultSnapshot,
};

use cli::{Commands, GlobalArgs, VaultCli};
use metrics::VaultMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VaultCli::parse();
    if !cli.command.needs_ledger() {
        print_version();
        return Ok(());
    }

    logging::init_logging(
        &logging::default_directive(&cli.global.log_level),
        cli.global.log_format,
    );

    let client = connect_ledger(&cli.global).await?;

    match cli.command {
        Commands::Status(args) => show_status(&client, args.account).await,
        Commands::History(args) => show_history(&client, args.account).await,
        Commands::Deposit(args) => {
            open_session(&client, args.account).await;
            client.deposit(&args.amount).await?;
            println!("{}", client.status_message().unwrap_or_default());
            Ok(())
        }
        Commands::Withdraw(args) => {
            open_session(&client, args.account).await;
            client.withdraw(&args.amount).await?;
            println!("{}", client.status_message().unwrap_or_default());
            Ok(())
        }
        Commands::Serve(args) => serve(client, args).await,
        Commands::Version => Ok(()),
    }
}

/// Loads the contract interface, builds the gateway and confirms the vault
/// address holds contract code.
async fn connect_ledger(global: &GlobalArgs) -> Result<VaultClient<JsonRpcGateway>> {
    let interface = load_interface(global.abi.as_deref())?;
    let gateway = Arc::new(JsonRpcGateway::new(global.rpc_url.clone(), interface));

    let code = gateway
        .code_at(global.vault)
        .await
        .with_context(|| format!("failed to query contract code on {}", global.rpc_url))?;
    if code.is_empty() {
        bail!(
            "no contract deployed at {} on {}; check --vault and --rpc-url",
            global.vault,
            global.rpc_url
        );
    }

    match gateway.block_number().await {
        Ok(height) => tracing::info!(
            rpc_url = %global.rpc_url,
            vault = %global.vault,
            height,
            "connected to ledger"
        ),
        Err(e) => tracing::warn!(error = %e, "could not read latest block number"),
    }

    let config = VaultConfig::new(global.vault).with_from_block(global.from_block);
    Ok(VaultClient::new(gateway, config))
}

fn load_interface(abi: Option<&Path>) -> Result<VaultInterface> {
    let Some(path) = abi else {
        return Ok(VaultInterface::simple_vault());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ABI artifact {}", path.display()))?;
    let interface = VaultInterface::from_artifact(&json)
        .with_context(|| format!("ABI artifact {} does not match the vault", path.display()))?;
    tracing::info!(path = %path.display(), "ABI artifact validated");
    Ok(interface)
}

/// Connects `account`. A history failure is logged, not fatal: submissions
/// do not depend on it.
async fn open_session(client: &VaultClient<JsonRpcGateway>, account: Address) {
    if let Err(e) = client.connect(account).await {
        tracing::warn!(error = %e, "history unavailable");
    }
}

async fn show_status(client: &VaultClient<JsonRpcGateway>, account: Address) -> Result<()> {
    open_session(client, account).await;
    let snapshot = client.snapshot();
    let view = client.view();

    println!("Account        : {account}");
    println!("Vault          : {}", client.config().vault_address);
    println!(
        "Balance        : {}",
        view.balance
            .map(|b| format!("{b} {}", vault_client::config::NATIVE_SYMBOL))
            .unwrap_or_else(|| "unknown".into())
    );
    println!(
        "Lock period    : {}",
        view.lock_period_seconds
            .map(|s| format!("{s} s"))
            .unwrap_or_else(|| "unknown".into())
    );
    println!(
        "Last deposit   : {}",
        match view.last_deposit_timestamp {
            None => "unknown".to_string(),
            Some(0) => "never".to_string(),
            Some(ts) => format_timestamp(ts),
        }
    );
    if let Some(unlock) = view.unlock_time {
        println!("Unlocks at     : {}", format_timestamp(unlock));
    }
    println!("Withdrawal now : {}", withdrawal_outlook(&snapshot, unix_now()));
    Ok(())
}

async fn show_history(client: &VaultClient<JsonRpcGateway>, account: Address) -> Result<()> {
    client.connect(account).await?;
    let history = client.history();
    if history.is_empty() {
        println!("No deposits or withdrawals for {account}.");
        return Ok(());
    }

    println!("{:>10}  {:<10}  {:>24}  TRANSACTION", "BLOCK", "KIND", "AMOUNT");
    for entry in history {
        let kind = match entry.kind {
            HistoryKind::Deposit => "deposit",
            HistoryKind::Withdrawal => "withdrawal",
        };
        println!(
            "{:>10}  {:<10}  {:>24}  {}",
            entry.block_number, kind, entry.amount, entry.transaction_id
        );
    }
    Ok(())
}

/// Whether withdrawing the full balance right now would pass local checks.
fn withdrawal_outlook(snapshot: &VaultSnapshot, now: u64) -> String {
    match snapshot.balance {
        None => "unknown (balance unavailable)".to_string(),
        Some(balance) if balance.is_zero() => "nothing to withdraw".to_string(),
        Some(balance) => match validate(balance, snapshot, now) {
            ValidationVerdict::Accept => "allowed".to_string(),
            ValidationVerdict::Reject(reason) => reason.to_string(),
        },
    }
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

/// Serves the HTTP API and the metrics endpoint until a shutdown signal.
async fn serve(client: VaultClient<JsonRpcGateway>, args: cli::ServeArgs) -> Result<()> {
    let metrics = Arc::new(VaultMetrics::new().context("failed to create metrics registry")?);

    if let Err(e) = client.connect(args.account).await {
        metrics.record_failure(&e);
        tracing::warn!(error = %e, "initial history load failed");
    } else {
        metrics.record_history(client.history().len());
    }

    let state = api::AppState {
        client: Arc::new(client),
        metrics: Arc::clone(&metrics),
    };

    let api_router = api::create_router(state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!(account = %args.account, "API server listening on {}", api_addr);

    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(metrics);
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("vault-cli stopped");
    Ok(())
}

fn print_version() {
    println!("vault-cli {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first. If a
/// handler cannot be installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
