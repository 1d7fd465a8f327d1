//! # Ledger Gateway
//!
//! The seam between the client core and whatever actually talks to the
//! ledger. The core only ever sees the statically typed calls defined here;
//! which selector or topic a call maps to is the gateway's business (see
//! [`crate::interface::VaultInterface`]).
//!
//! ## Implementations
//!
//! ```text
//! jsonrpc.rs — Ethereum JSON-RPC over HTTP (eth_call, eth_getLogs, ...)
//! memory.rs  — In-memory ledger with failure injection, for tests and demos
//! ```
//!
//! Neither implementation retries. Backoff belongs to the transport, and a
//! failed call is surfaced to the caller as a [`GatewayError`].

pub mod jsonrpc;
pub mod memory;

use std::fmt;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::READ_FAILURE_FALLBACK;

pub use jsonrpc::JsonRpcGateway;
pub use memory::InMemoryLedger;

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Read-only view calls the client issues against the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadCall {
    /// `balanceOf(account)` — custodied balance in wei.
    BalanceOf(Address),
    /// `lockPeriod()` — seconds a deposit stays locked.
    LockPeriod,
    /// `lastDepositTime(account)` — unix seconds, zero if never deposited.
    LastDepositTime(Address),
}

/// State-changing calls the client submits to the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteCall {
    /// `deposit()` carrying `value` wei.
    Deposit { value: U256 },
    /// `withdraw(amount)`.
    Withdraw { amount: U256 },
}

impl WriteCall {
    /// Native value attached to the transaction.
    pub fn value(&self) -> U256 {
        match self {
            Self::Deposit { value } => *value,
            Self::Withdraw { .. } => U256::ZERO,
        }
    }
}

/// A write call submitted on behalf of `from`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    /// The connected account paying for and signing the transaction.
    pub from: Address,
    /// What to call.
    pub call: WriteCall,
}

// ---------------------------------------------------------------------------
// Events & Logs
// ---------------------------------------------------------------------------

/// The two event classes the vault emits for an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultEvent {
    /// `Deposited(address indexed user, uint256 amount)`
    Deposited,
    /// `Withdrawn(address indexed user, uint256 amount)`
    Withdrawn,
}

/// Filter applied to a log scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogFilter {
    /// Value of the indexed `user` field.
    pub user: Address,
    /// First block scanned (inclusive).
    pub from_block: u64,
    /// Last block scanned (inclusive). `None` means the latest block.
    pub to_block: Option<u64>,
}

impl LogFilter {
    /// Scans `user`'s logs from `from_block` to the latest block.
    pub fn for_user(user: Address, from_block: u64) -> Self {
        Self {
            user,
            from_block,
            to_block: None,
        }
    }
}

/// One raw event record as returned by a log scan, decoded just far enough
/// to carry its amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLog {
    /// The event's `amount` field in wei.
    pub amount: U256,
    /// Transaction that emitted the event.
    pub transaction_id: TransactionId,
    /// Containing block. `None` for logs of pending transactions.
    pub block_number: Option<u64>,
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Opaque handle to a submitted transaction, as issued by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps a gateway-issued identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as issued.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Structured failure from a gateway call.
///
/// Mirrors what wallet libraries expose: an optional short, user-facing
/// message and an optional longer generic one. Either may be missing, so
/// callers resolve the text through [`GatewayError::human_message`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayError {
    /// Short human message, e.g. a decoded revert reason.
    pub short_message: Option<String>,
    /// Generic message, e.g. the raw RPC or transport error.
    pub message: Option<String>,
}

impl GatewayError {
    /// An error with a generic message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            short_message: None,
            message: Some(message.into()),
        }
    }

    /// An error carrying no message at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attaches a short, user-facing message.
    pub fn with_short_message(mut self, short: impl Into<String>) -> Self {
        self.short_message = Some(short.into());
        self
    }

    /// Short message if present and non-blank, else the generic message if
    /// present and non-blank, else `fallback`.
    pub fn human_message(&self, fallback: &str) -> String {
        [&self.short_message, &self.message]
            .into_iter()
            .flatten()
            .map(|m| m.trim())
            .find(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// Generic message if present and non-blank, else the short message,
    /// else `fallback`. Log scans resolve their failures this way.
    pub fn generic_message(&self, fallback: &str) -> String {
        [&self.message, &self.short_message]
            .into_iter()
            .flatten()
            .map(|m| m.trim())
            .find(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.human_message(READ_FAILURE_FALLBACK))
    }
}

impl std::error::Error for GatewayError {}

// ---------------------------------------------------------------------------
// LedgerGateway
// ---------------------------------------------------------------------------

/// Capability interface over a remote ledger hosting the vault.
///
/// All three operations are asynchronous and may fail with a
/// [`GatewayError`]. Implementations must not retry on the caller's behalf.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Executes a read-only view call and returns its `uint256` result.
    async fn read_state(&self, contract: Address, call: ReadCall) -> Result<U256, GatewayError>;

    /// Returns every `event` log emitted by `contract` matching `filter`,
    /// in ledger order.
    async fn scan_logs(
        &self,
        contract: Address,
        event: VaultEvent,
        filter: LogFilter,
    ) -> Result<Vec<RawLog>, GatewayError>;

    /// Submits a transaction and returns its identifier once the ledger
    /// has accepted it (not necessarily mined it).
    async fn send_transaction(
        &self,
        contract: Address,
        request: TransactionRequest,
    ) -> Result<TransactionId, GatewayError>;
}
