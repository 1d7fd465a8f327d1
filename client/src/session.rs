//! # Vault Client Session
//!
//! [`VaultClient`] is the stateful facade a presentation layer binds to. It
//! owns the connected account, the latest [`VaultSnapshot`], the latest
//! history and the single status message, and it drives the reader,
//! submitter and history reconstructor on the caller's behalf.
//!
//! State lives behind one `RwLock` and is only ever swapped, never patched.
//! The lock is never held across an `.await`. Results that come back for an
//! account that is no longer connected are dropped.

use std::sync::Arc;

use alloy_primitives::Address;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::amount::UnitCodec;
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::gateway::{LedgerGateway, TransactionId};
use crate::history::{HistoryEntry, HistoryReconstructor};
use crate::reader::{VaultSnapshot, VaultStateReader};
use crate::submitter::TransactionSubmitter;

/// Current wall-clock time in unix seconds. Clamps pre-epoch clocks to 0.
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

#[derive(Clone, Debug, Default)]
struct ClientState {
    account: Option<Address>,
    snapshot: VaultSnapshot,
    history: Vec<HistoryEntry>,
    status_message: Option<String>,
    history_error: Option<String>,
}

/// Serializable copy of everything the session exposes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientView {
    pub account: Option<Address>,
    /// Balance in display form; `None` when unknown.
    pub balance: Option<String>,
    pub lock_period_seconds: Option<u64>,
    pub last_deposit_timestamp: Option<u64>,
    /// When the last deposit unlocks, if there is one and it is known.
    pub unlock_time: Option<u64>,
    pub history: Vec<HistoryEntry>,
    pub status_message: Option<String>,
    pub history_error: Option<String>,
}

#[derive(Clone, Copy)]
enum Submission {
    Deposit,
    Withdraw,
}

impl Submission {
    fn confirmation(self, id: &TransactionId) -> String {
        match self {
            Self::Deposit => format!("Deposit transaction sent: {id}"),
            Self::Withdraw => format!("Withdraw transaction sent: {id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// VaultClient
// ---------------------------------------------------------------------------

/// One user's session against one vault.
pub struct VaultClient<G> {
    config: VaultConfig,
    codec: UnitCodec,
    reader: VaultStateReader<G>,
    submitter: TransactionSubmitter<G>,
    history: HistoryReconstructor<G>,
    state: RwLock<ClientState>,
}

impl<G: LedgerGateway> VaultClient<G> {
    /// A disconnected session over `gateway`.
    pub fn new(gateway: Arc<G>, config: VaultConfig) -> Self {
        Self {
            codec: UnitCodec::new(config.decimals),
            reader: VaultStateReader::new(Arc::clone(&gateway), config.clone()),
            submitter: TransactionSubmitter::new(Arc::clone(&gateway), config.clone()),
            history: HistoryReconstructor::new(gateway, config.clone()),
            config,
            state: RwLock::new(ClientState::default()),
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Connects `account`, discarding any previous session state, then
    /// loads its snapshot and history.
    ///
    /// # Errors
    ///
    /// The history failure, if the history could not be loaded. The account
    /// stays connected and the snapshot is refreshed either way.
    pub async fn connect(&self, account: Address) -> Result<(), VaultError> {
        *self.state.write() = ClientState {
            account: Some(account),
            ..ClientState::default()
        };
        info!(%account, vault = %self.config.vault_address, "account connected");

        self.refresh().await;
        self.refresh_history().await
    }

    /// Forgets the account and everything loaded for it.
    pub fn disconnect(&self) {
        let previous = std::mem::take(&mut *self.state.write());
        if let Some(account) = previous.account {
            info!(%account, "account disconnected");
        }
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Re-reads the snapshot and replaces it whole. Without an account the
    /// snapshot becomes the empty one.
    pub async fn refresh(&self) {
        let Some(account) = self.account() else {
            self.state.write().snapshot = VaultSnapshot::empty();
            return;
        };

        let snapshot = self.reader.snapshot(account).await;

        let mut state = self.state.write();
        if state.account == Some(account) {
            state.snapshot = snapshot;
        } else {
            debug!(%account, "dropping snapshot for a disconnected account");
        }
    }

    /// Rebuilds the history. On failure the previous history is kept and
    /// the failure message is recorded as the history error.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotConnected`] or [`VaultError::PartialHistoryFailure`].
    pub async fn refresh_history(&self) -> Result<(), VaultError> {
        let account = self.account().ok_or(VaultError::NotConnected)?;
        let result = self.history.reconstruct(account).await;

        let mut state = self.state.write();
        if state.account != Some(account) {
            debug!(%account, "dropping history for a disconnected account");
            return Ok(());
        }
        match result {
            Ok(entries) => {
                state.history = entries;
                state.history_error = None;
                Ok(())
            }
            Err(err) => {
                state.history_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Submissions
    // -----------------------------------------------------------------------

    /// Deposits `amount` (display form) from the connected account.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotConnected`], [`VaultError::MalformedAmount`] or
    /// [`VaultError::GatewayFailure`]. The error's message also becomes the
    /// status message.
    pub async fn deposit(&self, amount: &str) -> Result<TransactionId, VaultError> {
        let account = self.begin_submission()?;
        let result = self.submitter.submit_deposit(account, amount).await;
        self.finish_submission(Submission::Deposit, result).await
    }

    /// Withdraws `amount` (display form) to the connected account, checked
    /// against the snapshot held right now and the wall clock.
    ///
    /// # Errors
    ///
    /// As [`VaultClient::withdraw_at`].
    pub async fn withdraw(&self, amount: &str) -> Result<TransactionId, VaultError> {
        self.withdraw_at(amount, unix_now()).await
    }

    /// [`VaultClient::withdraw`] with an explicit clock (unix seconds).
    ///
    /// # Errors
    ///
    /// [`VaultError::NotConnected`], [`VaultError::MalformedAmount`],
    /// [`VaultError::Rejected`] or [`VaultError::GatewayFailure`].
    pub async fn withdraw_at(&self, amount: &str, now: u64) -> Result<TransactionId, VaultError> {
        let account = self.begin_submission()?;
        let snapshot = self.snapshot();
        let result = self
            .submitter
            .submit_withdraw(account, amount, &snapshot, now)
            .await;
        self.finish_submission(Submission::Withdraw, result).await
    }

    fn begin_submission(&self) -> Result<Address, VaultError> {
        let mut state = self.state.write();
        match state.account {
            Some(account) => {
                state.status_message = None;
                Ok(account)
            }
            None => {
                let err = VaultError::NotConnected;
                state.status_message = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn finish_submission(
        &self,
        kind: Submission,
        result: Result<TransactionId, VaultError>,
    ) -> Result<TransactionId, VaultError> {
        match result {
            Ok(id) => {
                self.state.write().status_message = Some(kind.confirmation(&id));
                self.refresh().await;
                Ok(id)
            }
            Err(err) => {
                if !err.is_local() {
                    warn!(error = %err, "submission failed");
                }
                self.state.write().status_message = Some(err.to_string());
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn account(&self) -> Option<Address> {
        self.state.read().account
    }

    pub fn snapshot(&self) -> VaultSnapshot {
        self.state.read().snapshot.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().history.clone()
    }

    pub fn status_message(&self) -> Option<String> {
        self.state.read().status_message.clone()
    }

    pub fn history_error(&self) -> Option<String> {
        self.state.read().history_error.clone()
    }

    /// Everything above in one consistent copy.
    pub fn view(&self) -> ClientView {
        let state = self.state.read().clone();
        ClientView {
            account: state.account,
            balance: state
                .snapshot
                .balance
                .map(|wei| self.codec.to_display_form(wei)),
            lock_period_seconds: state.snapshot.lock_period_seconds,
            last_deposit_timestamp: state.snapshot.last_deposit_timestamp,
            unlock_time: state.snapshot.unlock_time(),
            history: state.history,
            status_message: state.status_message,
            history_error: state.history_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{InMemoryLedger, ReadKind};
    use crate::gateway::{GatewayError, VaultEvent};
    use crate::history::HistoryKind;
    use crate::validator::RejectReason;
    use alloy_primitives::U256;

    const VAULT: Address = Address::new([0xaa; 20]);
    const ALICE: Address = Address::new([0x01; 20]);
    const BOB: Address = Address::new([0x02; 20]);
    const NOW: u64 = 1_700_000_000;
    const ONE_ETHER: u64 = 1_000_000_000_000_000_000;

    fn setup() -> (Arc<InMemoryLedger>, VaultClient<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new(VAULT, 600, NOW));
        let client = VaultClient::new(Arc::clone(&ledger), VaultConfig::new(VAULT));
        (ledger, client)
    }

    #[tokio::test]
    async fn operations_without_account_fail() {
        let (ledger, client) = setup();

        assert_eq!(client.deposit("1").await, Err(VaultError::NotConnected));
        assert_eq!(client.withdraw("1").await, Err(VaultError::NotConnected));
        assert_eq!(client.refresh_history().await, Err(VaultError::NotConnected));
        assert_eq!(client.status_message().as_deref(), Some("No account connected."));
        assert!(ledger.sent_transactions().is_empty());
        assert_eq!(ledger.scan_count(), 0);

        client.refresh().await;
        assert_eq!(client.snapshot(), VaultSnapshot::empty());
        assert_eq!(ledger.read_count(), 0);
    }

    #[tokio::test]
    async fn connect_loads_snapshot_and_history() {
        let (ledger, client) = setup();
        ledger.set_balance(ALICE, U256::from(ONE_ETHER));
        ledger.set_last_deposit(ALICE, NOW - 10);
        ledger.push_log(VaultEvent::Deposited, ALICE, U256::from(ONE_ETHER), Some(1));

        client.connect(ALICE).await.unwrap();

        let view = client.view();
        assert_eq!(view.account, Some(ALICE));
        assert_eq!(view.balance.as_deref(), Some("1"));
        assert_eq!(view.lock_period_seconds, Some(600));
        assert_eq!(view.unlock_time, Some(NOW + 590));
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.history[0].kind, HistoryKind::Deposit);
        assert_eq!(view.status_message, None);
    }

    #[tokio::test]
    async fn successful_deposit_refreshes_snapshot() {
        let (_ledger, client) = setup();
        client.connect(ALICE).await.unwrap();
        assert_eq!(client.snapshot().balance, Some(U256::ZERO));

        let id = client.deposit("1").await.unwrap();

        assert_eq!(
            client.status_message(),
            Some(format!("Deposit transaction sent: {id}"))
        );
        let snapshot = client.snapshot();
        assert_eq!(snapshot.balance, Some(U256::from(ONE_ETHER)));
        assert_eq!(snapshot.last_deposit_timestamp, Some(NOW));
    }

    #[tokio::test]
    async fn withdraw_uses_held_snapshot_and_explicit_clock() {
        let (ledger, client) = setup();
        client.connect(ALICE).await.unwrap();
        client.deposit("1").await.unwrap();

        let err = client.withdraw_at("0.5", NOW + 10).await.unwrap_err();
        assert_eq!(
            err,
            VaultError::Rejected(RejectReason::StillLocked {
                remaining_seconds: 590
            })
        );
        assert_eq!(
            client.status_message().as_deref(),
            Some("Funds are still locked. Try again in ~590 seconds.")
        );
        assert_eq!(ledger.sent_transactions().len(), 1);

        ledger.advance_time(601);
        let id = client.withdraw_at("0.5", NOW + 601).await.unwrap();
        assert_eq!(
            client.status_message(),
            Some(format!("Withdraw transaction sent: {id}"))
        );
        assert_eq!(
            client.snapshot().balance,
            Some(U256::from(ONE_ETHER / 2))
        );
    }

    #[tokio::test]
    async fn oversized_lock_period_still_blocks_withdrawal() {
        let (ledger, client) = setup();
        ledger.set_lock_period(U256::from(u64::MAX) + U256::from(1u8));
        client.connect(ALICE).await.unwrap();
        client.deposit("1").await.unwrap();
        assert_eq!(client.snapshot().lock_period_seconds, Some(u64::MAX));

        let err = client.withdraw_at("0.5", NOW + 10).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Rejected(RejectReason::StillLocked { .. })
        ));
        assert_eq!(ledger.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn new_submission_clears_previous_message() {
        let (_ledger, client) = setup();
        client.connect(ALICE).await.unwrap();

        client.deposit("abc").await.unwrap_err();
        assert!(client
            .status_message()
            .is_some_and(|m| m.starts_with("Invalid amount")));

        client.deposit("0.1").await.unwrap();
        assert!(client
            .status_message()
            .is_some_and(|m| m.starts_with("Deposit transaction sent: ")));
    }

    #[tokio::test]
    async fn gateway_failure_sets_status_and_keeps_snapshot() {
        let (ledger, client) = setup();
        ledger.set_balance(ALICE, U256::from(5u8));
        client.connect(ALICE).await.unwrap();

        ledger.fail_sends(GatewayError::empty());
        let err = client.deposit("1").await.unwrap_err();
        assert!(matches!(err, VaultError::GatewayFailure { .. }));
        assert_eq!(
            client.status_message().as_deref(),
            Some("Error sending deposit transaction")
        );
        assert_eq!(client.snapshot().balance, Some(U256::from(5u8)));
    }

    #[tokio::test]
    async fn failed_history_refresh_preserves_previous_history() {
        let (ledger, client) = setup();
        ledger.push_log(VaultEvent::Deposited, ALICE, U256::from(1u8), Some(1));
        client.connect(ALICE).await.unwrap();
        assert_eq!(client.history().len(), 1);

        ledger.push_log(VaultEvent::Withdrawn, ALICE, U256::from(1u8), Some(2));
        ledger.fail_scans(VaultEvent::Withdrawn, GatewayError::empty());
        assert!(client.refresh_history().await.is_err());
        assert_eq!(client.history().len(), 1);
        assert_eq!(client.history_error().as_deref(), Some("Error loading history"));

        ledger.clear_failures();
        client.refresh_history().await.unwrap();
        assert_eq!(client.history().len(), 2);
        assert_eq!(client.history_error(), None);
    }

    #[tokio::test]
    async fn failed_read_leaves_field_unknown() {
        let (ledger, client) = setup();
        ledger.fail_reads(ReadKind::Balance, GatewayError::new("timeout"));
        client.connect(ALICE).await.unwrap();

        assert_eq!(client.view().balance, None);
        let err = client.withdraw_at("0.1", NOW).await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to read vault balance.");
    }

    #[tokio::test]
    async fn reconnect_and_disconnect_reset_state() {
        let (ledger, client) = setup();
        ledger.push_log(VaultEvent::Deposited, ALICE, U256::from(1u8), Some(1));
        client.connect(ALICE).await.unwrap();
        client.deposit("x").await.unwrap_err();

        client.connect(BOB).await.unwrap();
        assert_eq!(client.account(), Some(BOB));
        assert!(client.history().is_empty());
        assert_eq!(client.status_message(), None);

        client.disconnect();
        let view = client.view();
        assert_eq!(view.account, None);
        assert_eq!(view.balance, None);
        assert!(view.history.is_empty());
    }

    #[test]
    fn view_serializes_for_presentation() {
        let (_ledger, client) = setup();
        let json = serde_json::to_value(client.view()).unwrap();
        assert!(json["account"].is_null());
        assert_eq!(json["history"], serde_json::json!([]));
    }
}
