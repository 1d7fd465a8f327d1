// Copyright (c) 2026 SimpleVault Contributors. MIT License.
// See LICENSE for details.

//! # SimpleVault Client — Core Library
//!
//! Everything a front end needs to talk to a deployed SimpleVault custody
//! contract without holding any ledger state of its own. The contract is the
//! authority on balances and lock periods; this crate reads what it says,
//! refuses withdrawals that are certain to fail, submits the ones that might
//! succeed, and rebuilds the account's history from the event log.
//!
//! ## Architecture
//!
//! - **amount** — Decimal string ⇄ wei conversion. No floats, ever.
//! - **interface** — Typed description of the vault contract (selectors,
//!   event topics) with optional ABI artifact validation.
//! - **gateway** — The [`LedgerGateway`] seam plus a JSON-RPC adapter and an
//!   in-memory ledger for tests.
//! - **reader** — Fetches balance, lock period and last deposit time.
//! - **validator** — Pure withdrawal precondition check.
//! - **submitter** — Deposit / withdraw submission.
//! - **history** — Two log scans merged into one ordered timeline.
//! - **session** — [`VaultClient`], the stateful facade a UI binds to.
//! - **config** — Defaults and the immutable [`VaultConfig`].
//!
//! ## Ground Rules
//!
//! 1. The client never patches state; snapshots and histories are replaced
//!    whole, so a reader never sees half of a refresh.
//! 2. Every failing path ends in exactly one human-readable message.
//! 3. Re-synchronization after a write is explicit. Nothing refreshes behind
//!    the caller's back except [`VaultClient`], which does it on purpose.

pub mod amount;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod interface;
pub mod reader;
pub mod session;
pub mod submitter;
pub mod validator;

pub use amount::{to_display_form, to_ledger_form, AmountError, UnitCodec};
pub use config::VaultConfig;
pub use error::VaultError;
pub use gateway::{
    GatewayError, LedgerGateway, LogFilter, RawLog, ReadCall, TransactionId, TransactionRequest,
    VaultEvent, WriteCall,
};
pub use history::{HistoryEntry, HistoryKind, HistoryReconstructor};
pub use interface::{AbiError, VaultInterface};
pub use reader::{VaultSnapshot, VaultStateReader};
pub use session::{ClientView, VaultClient};
pub use submitter::TransactionSubmitter;
pub use validator::{validate, RejectReason, ValidationVerdict};

pub use alloy_primitives::{Address, U256};
