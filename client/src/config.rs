//! # Client Configuration & Constants
//!
//! The handful of fixed values the client consumes: where the vault lives,
//! which events it emits, how many decimals the native unit has. Nothing in
//! here is ever mutated after construction; a [`VaultConfig`] is built once
//! and handed to every component that needs it.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Contract Identity
// ---------------------------------------------------------------------------

/// Address of the first contract deployed by the default Hardhat account on
/// a fresh local node. That is where the deploy script puts SimpleVault.
pub const DEFAULT_VAULT_ADDRESS: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

/// Local Hardhat / Anvil JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Log scans start at genesis unless told otherwise.
pub const DEFAULT_FROM_BLOCK: u64 = 0;

// ---------------------------------------------------------------------------
// Contract Signatures
// ---------------------------------------------------------------------------

/// `balanceOf(address) returns (uint256)`
pub const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";

/// `lockPeriod() returns (uint256)` — seconds.
pub const LOCK_PERIOD_SIGNATURE: &str = "lockPeriod()";

/// `lastDepositTime(address) returns (uint256)` — unix seconds.
pub const LAST_DEPOSIT_TIME_SIGNATURE: &str = "lastDepositTime(address)";

/// `deposit() payable`
pub const DEPOSIT_SIGNATURE: &str = "deposit()";

/// `withdraw(uint256 amount)`
pub const WITHDRAW_SIGNATURE: &str = "withdraw(uint256)";

/// `event Deposited(address indexed user, uint256 amount)`
pub const DEPOSITED_EVENT_SIGNATURE: &str = "Deposited(address,uint256)";

/// `event Withdrawn(address indexed user, uint256 amount)`
pub const WITHDRAWN_EVENT_SIGNATURE: &str = "Withdrawn(address,uint256)";

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Fractional digits of the native unit (ether → wei).
pub const NATIVE_DECIMALS: u8 = 18;

/// Display symbol for the native unit.
pub const NATIVE_SYMBOL: &str = "ETH";

// ---------------------------------------------------------------------------
// Fallback Messages
// ---------------------------------------------------------------------------

/// Used when a failed deposit carries no message at all.
pub const DEPOSIT_FAILURE_FALLBACK: &str = "Error sending deposit transaction";

/// Used when a failed withdrawal carries no message at all.
pub const WITHDRAW_FAILURE_FALLBACK: &str = "Error sending withdraw transaction";

/// Used when a failed history scan carries no message at all.
pub const HISTORY_FAILURE_FALLBACK: &str = "Error loading history";

/// Used when a state read fails without a message.
pub const READ_FAILURE_FALLBACK: &str = "Error reading vault state";

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Immutable client configuration, passed into the client at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Address of the deployed vault contract.
    pub vault_address: Address,
    /// First block included in history scans.
    pub from_block: u64,
    /// Fractional digits of the unit amounts are denominated in.
    pub decimals: u8,
}

impl VaultConfig {
    /// Configuration for a vault at `vault_address`, scanning from genesis.
    pub fn new(vault_address: Address) -> Self {
        Self {
            vault_address,
            from_block: DEFAULT_FROM_BLOCK,
            decimals: NATIVE_DECIMALS,
        }
    }

    /// Sets the first block included in history scans.
    pub fn with_from_block(mut self, from_block: u64) -> Self {
        self.from_block = from_block;
        self
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::new(DEFAULT_VAULT_ADDRESS)
    }
}
