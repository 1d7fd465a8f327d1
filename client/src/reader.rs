//! # Vault State Reader
//!
//! Fetches the three pieces of remote state the client needs: custodied
//! balance, global lock period, and the account's last deposit time.
//!
//! A failed read never aborts its siblings. Each accessor turns a gateway
//! failure into `None` ("unknown") and logs it, so a flaky `lockPeriod()`
//! still leaves the balance visible. A completed read whose value exceeds
//! `u64` saturates to `u64::MAX` instead.

use std::sync::{Arc, OnceLock};

use alloy_primitives::{Address, U256};
use tracing::{debug, warn};

use crate::config::VaultConfig;
use crate::gateway::{LedgerGateway, ReadCall};

// ---------------------------------------------------------------------------
// VaultSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the vault for one account.
///
/// Always replaced as a whole. Each field is `None` when its own read
/// failed (or, for a fresh session, has not happened yet).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VaultSnapshot {
    /// Custodied balance in wei.
    pub balance: Option<U256>,
    /// Seconds a deposit stays locked.
    pub lock_period_seconds: Option<u64>,
    /// Unix seconds of the last deposit; `Some(0)` means never.
    pub last_deposit_timestamp: Option<u64>,
}

impl VaultSnapshot {
    /// A snapshot with nothing known.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when all three fields resolved.
    pub fn is_complete(&self) -> bool {
        self.balance.is_some()
            && self.lock_period_seconds.is_some()
            && self.last_deposit_timestamp.is_some()
    }

    /// `true` when a deposit has been recorded for the account.
    pub fn has_deposit(&self) -> bool {
        matches!(self.last_deposit_timestamp, Some(ts) if ts > 0)
    }

    /// Unix second at which the last deposit unlocks, when both inputs are
    /// known and a deposit exists. Saturates instead of overflowing.
    pub fn unlock_time(&self) -> Option<u64> {
        match (self.last_deposit_timestamp, self.lock_period_seconds) {
            (Some(last), Some(lock)) if last > 0 => Some(last.saturating_add(lock)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// VaultStateReader
// ---------------------------------------------------------------------------

/// Idempotent reads against the vault through a [`LedgerGateway`].
pub struct VaultStateReader<G> {
    gateway: Arc<G>,
    config: VaultConfig,
    lock_period: OnceLock<u64>,
}

impl<G: LedgerGateway> VaultStateReader<G> {
    /// Reader for the vault named in `config`.
    pub fn new(gateway: Arc<G>, config: VaultConfig) -> Self {
        Self {
            gateway,
            config,
            lock_period: OnceLock::new(),
        }
    }

    /// Custodied balance of `account`, or `None` if the read failed.
    pub async fn balance(&self, account: Address) -> Option<U256> {
        self.read(ReadCall::BalanceOf(account)).await
    }

    /// The vault's lock period in seconds.
    ///
    /// Cached after the first successful read: the owner may change it, but
    /// the client does not need to observe that within a session. Failures
    /// are not cached, so the next call tries again.
    pub async fn lock_period(&self) -> Option<u64> {
        if let Some(cached) = self.lock_period.get() {
            return Some(*cached);
        }
        let value = self.read_u64(ReadCall::LockPeriod).await?;
        Some(*self.lock_period.get_or_init(|| value))
    }

    /// Last deposit time of `account` in unix seconds. `Some(0)` means the
    /// account never deposited.
    pub async fn last_deposit_timestamp(&self, account: Address) -> Option<u64> {
        self.read_u64(ReadCall::LastDepositTime(account)).await
    }

    /// Reads all three fields and returns a fresh snapshot.
    pub async fn snapshot(&self, account: Address) -> VaultSnapshot {
        let balance = self.balance(account).await;
        let lock_period_seconds = self.lock_period().await;
        let last_deposit_timestamp = self.last_deposit_timestamp(account).await;

        let snapshot = VaultSnapshot {
            balance,
            lock_period_seconds,
            last_deposit_timestamp,
        };
        debug!(%account, complete = snapshot.is_complete(), "vault snapshot refreshed");
        snapshot
    }

    async fn read(&self, call: ReadCall) -> Option<U256> {
        match self.gateway.read_state(self.config.vault_address, call).await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(call = ?call, error = %err, "vault read failed; treating as unknown");
                None
            }
        }
    }

    async fn read_u64(&self, call: ReadCall) -> Option<u64> {
        let value = self.read(call).await?;
        Some(u64::try_from(value).unwrap_or_else(|_| {
            warn!(call = ?call, %value, "vault value exceeds u64; saturating");
            u64::MAX
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{InMemoryLedger, ReadKind};
    use crate::gateway::GatewayError;

    const VAULT: Address = Address::new([0xaa; 20]);
    const ALICE: Address = Address::new([0x01; 20]);

    fn reader(ledger: &Arc<InMemoryLedger>) -> VaultStateReader<InMemoryLedger> {
        VaultStateReader::new(Arc::clone(ledger), VaultConfig::new(VAULT))
    }

    #[tokio::test]
    async fn snapshot_reads_all_three_fields() {
        let ledger = Arc::new(InMemoryLedger::new(VAULT, 600, 5_000));
        ledger.set_balance(ALICE, U256::from(42u8));
        ledger.set_last_deposit(ALICE, 4_000);

        let snapshot = reader(&ledger).snapshot(ALICE).await;
        assert_eq!(
            snapshot,
            VaultSnapshot {
                balance: Some(U256::from(42u8)),
                lock_period_seconds: Some(600),
                last_deposit_timestamp: Some(4_000),
            }
        );
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.unlock_time(), Some(4_600));
    }

    #[tokio::test]
    async fn failed_read_leaves_other_fields_intact() {
        let ledger = Arc::new(InMemoryLedger::new(VAULT, 600, 5_000));
        ledger.set_balance(ALICE, U256::from(7u8));
        ledger.fail_reads(ReadKind::LastDepositTime, GatewayError::new("timeout"));

        let snapshot = reader(&ledger).snapshot(ALICE).await;
        assert_eq!(snapshot.balance, Some(U256::from(7u8)));
        assert_eq!(snapshot.lock_period_seconds, Some(600));
        assert_eq!(snapshot.last_deposit_timestamp, None);
        assert!(!snapshot.is_complete());
    }

    #[tokio::test]
    async fn lock_period_is_cached_after_success() {
        let ledger = Arc::new(InMemoryLedger::new(VAULT, 600, 0));
        let reader = reader(&ledger);

        assert_eq!(reader.lock_period().await, Some(600));
        ledger.set_lock_period(U256::from(1u8));
        assert_eq!(reader.lock_period().await, Some(600));
        assert_eq!(ledger.read_count(), 1);
    }

    #[tokio::test]
    async fn lock_period_failure_is_retried() {
        let ledger = Arc::new(InMemoryLedger::new(VAULT, 600, 0));
        let reader = reader(&ledger);

        ledger.fail_reads(ReadKind::LockPeriod, GatewayError::new("down"));
        assert_eq!(reader.lock_period().await, None);
        ledger.clear_failures();
        assert_eq!(reader.lock_period().await, Some(600));
    }

    #[tokio::test]
    async fn oversized_values_saturate() {
        let ledger = Arc::new(InMemoryLedger::new(VAULT, 0, 0));
        ledger.set_lock_period(U256::MAX);
        assert_eq!(reader(&ledger).lock_period().await, Some(u64::MAX));
    }

    #[test]
    fn unlock_time_requires_a_deposit() {
        let never = VaultSnapshot {
            balance: Some(U256::ZERO),
            lock_period_seconds: Some(60),
            last_deposit_timestamp: Some(0),
        };
        assert!(!never.has_deposit());
        assert_eq!(never.unlock_time(), None);

        let saturating = VaultSnapshot {
            last_deposit_timestamp: Some(u64::MAX - 1),
            lock_period_seconds: Some(10),
            ..never
        };
        assert_eq!(saturating.unlock_time(), Some(u64::MAX));
    }
}
