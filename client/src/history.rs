//! # History Reconstructor
//!
//! Rebuilds an account's deposit/withdrawal timeline from the vault's event
//! log. There is no local journal: every call scans the chain from the
//! configured start block to the latest block, once for `Deposited` and once
//! for `Withdrawn`, and merges the two.
//!
//! ## Ordering
//!
//! Entries are sorted by block number, ascending. Deposits are laid down
//! before withdrawals and the sort is stable, so within a single block every
//! deposit precedes every withdrawal. Logs without a block number (pending)
//! are placed at block 0.
//!
//! Either scan failing fails the whole reconstruction. Showing deposits
//! without the matching withdrawals would misstate the account.

use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::amount::UnitCodec;
use crate::config::{VaultConfig, HISTORY_FAILURE_FALLBACK};
use crate::error::VaultError;
use crate::gateway::{GatewayError, LedgerGateway, LogFilter, RawLog, TransactionId, VaultEvent};

/// Direction of a history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Deposit,
    Withdrawal,
}

impl From<VaultEvent> for HistoryKind {
    fn from(event: VaultEvent) -> Self {
        match event {
            VaultEvent::Deposited => Self::Deposit,
            VaultEvent::Withdrawn => Self::Withdrawal,
        }
    }
}

/// One row of the reconstructed timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    /// Amount in display form, e.g. `"0.5"`.
    pub amount: String,
    pub transaction_id: TransactionId,
    /// Containing block; 0 when the log was pending.
    pub block_number: u64,
}

/// Rebuilds history for one vault.
pub struct HistoryReconstructor<G> {
    gateway: Arc<G>,
    config: VaultConfig,
    codec: UnitCodec,
}

impl<G: LedgerGateway> HistoryReconstructor<G> {
    pub fn new(gateway: Arc<G>, config: VaultConfig) -> Self {
        let codec = UnitCodec::new(config.decimals);
        Self {
            gateway,
            config,
            codec,
        }
    }

    /// Scans both event streams for `account` and returns the merged,
    /// ordered timeline.
    ///
    /// Restartable: calling it again re-scans from scratch and, absent new
    /// events, yields the same list.
    ///
    /// # Errors
    ///
    /// [`VaultError::PartialHistoryFailure`] if either scan fails.
    pub async fn reconstruct(&self, account: Address) -> Result<Vec<HistoryEntry>, VaultError> {
        let (deposits, withdrawals) = futures::try_join!(
            self.scan(account, VaultEvent::Deposited),
            self.scan(account, VaultEvent::Withdrawn),
        )
        .map_err(|err| {
            warn!(%account, error = %err, "history scan failed");
            VaultError::partial_history(err, HISTORY_FAILURE_FALLBACK)
        })?;

        let mut entries: Vec<HistoryEntry> = deposits
            .into_iter()
            .map(|log| self.entry(HistoryKind::Deposit, log))
            .chain(
                withdrawals
                    .into_iter()
                    .map(|log| self.entry(HistoryKind::Withdrawal, log)),
            )
            .collect();
        entries.sort_by_key(|entry| entry.block_number);

        debug!(%account, entries = entries.len(), "history reconstructed");
        Ok(entries)
    }

    async fn scan(
        &self,
        account: Address,
        event: VaultEvent,
    ) -> Result<Vec<RawLog>, GatewayError> {
        let filter = LogFilter::for_user(account, self.config.from_block);
        self.gateway
            .scan_logs(self.config.vault_address, event, filter)
            .await
    }

    fn entry(&self, kind: HistoryKind, log: RawLog) -> HistoryEntry {
        HistoryEntry {
            kind,
            amount: self.codec.to_display_form(log.amount),
            transaction_id: log.transaction_id,
            block_number: log.block_number.unwrap_or(0),
        }
    }
}
