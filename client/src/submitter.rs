//! # Transaction Submitter
//!
//! Turns a display amount into a deposit or withdraw transaction. Deposits
//! only need a well-formed amount; withdrawals must also pass
//! [`validate`](crate::validator::validate) against the snapshot the caller
//! hands in, and a rejection never reaches the gateway.
//!
//! The submitter holds no state and never refreshes anything. Callers own
//! re-synchronization after a successful write.

use std::sync::Arc;

use alloy_primitives::Address;
use tracing::{info, warn};

use crate::amount::UnitCodec;
use crate::config::{VaultConfig, DEPOSIT_FAILURE_FALLBACK, WITHDRAW_FAILURE_FALLBACK};
use crate::error::VaultError;
use crate::gateway::{LedgerGateway, TransactionId, TransactionRequest, WriteCall};
use crate::reader::VaultSnapshot;
use crate::validator::{validate, ValidationVerdict};

/// Submits deposit and withdraw transactions to the vault.
pub struct TransactionSubmitter<G> {
    gateway: Arc<G>,
    config: VaultConfig,
    codec: UnitCodec,
}

impl<G: LedgerGateway> TransactionSubmitter<G> {
    /// Submitter for the vault named in `config`.
    pub fn new(gateway: Arc<G>, config: VaultConfig) -> Self {
        let codec = UnitCodec::new(config.decimals);
        Self {
            gateway,
            config,
            codec,
        }
    }

    /// Deposits `amount` (display form) from `from`.
    ///
    /// # Errors
    ///
    /// [`VaultError::MalformedAmount`] before any network call, or
    /// [`VaultError::GatewayFailure`] if the ledger refused the transaction.
    pub async fn submit_deposit(
        &self,
        from: Address,
        amount: &str,
    ) -> Result<TransactionId, VaultError> {
        let value = self.codec.to_ledger_form(amount)?;
        self.send(from, WriteCall::Deposit { value }, DEPOSIT_FAILURE_FALLBACK)
            .await
    }

    /// Withdraws `amount` (display form) to `from`, after validating it
    /// against `snapshot` at unix time `now`.
    ///
    /// The snapshot is used as given; a stale snapshot can produce a stale
    /// verdict, which the contract will then overrule on-chain.
    ///
    /// # Errors
    ///
    /// [`VaultError::MalformedAmount`] or [`VaultError::Rejected`] before any
    /// network call, or [`VaultError::GatewayFailure`].
    pub async fn submit_withdraw(
        &self,
        from: Address,
        amount: &str,
        snapshot: &VaultSnapshot,
        now: u64,
    ) -> Result<TransactionId, VaultError> {
        let requested = self.codec.to_ledger_form(amount)?;
        if let ValidationVerdict::Reject(reason) = validate(requested, snapshot, now) {
            info!(account = %from, %requested, %reason, "withdrawal rejected locally");
            return Err(reason.into());
        }
        self.send(
            from,
            WriteCall::Withdraw { amount: requested },
            WITHDRAW_FAILURE_FALLBACK,
        )
        .await
    }

    async fn send(
        &self,
        from: Address,
        call: WriteCall,
        fallback: &str,
    ) -> Result<TransactionId, VaultError> {
        let request = TransactionRequest { from, call };
        match self
            .gateway
            .send_transaction(self.config.vault_address, request)
            .await
        {
            Ok(id) => {
                info!(account = %from, call = ?call, tx = %id, "transaction submitted");
                Ok(id)
            }
            Err(err) => {
                let err = VaultError::gateway(err, fallback);
                warn!(account = %from, call = ?call, error = %err, "transaction submission failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::InMemoryLedger;
    use crate::gateway::GatewayError;
    use crate::validator::RejectReason;
    use alloy_primitives::U256;

    const VAULT: Address = Address::new([0xaa; 20]);
    const ALICE: Address = Address::new([0x01; 20]);
    const NOW: u64 = 1_700_000_000;

    fn setup() -> (Arc<InMemoryLedger>, TransactionSubmitter<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new(VAULT, 600, NOW));
        let submitter = TransactionSubmitter::new(Arc::clone(&ledger), VaultConfig::new(VAULT));
        (ledger, submitter)
    }

    fn funded_snapshot() -> VaultSnapshot {
        VaultSnapshot {
            balance: Some(U256::from(1_000_000_000_000_000_000u64)),
            lock_period_seconds: Some(600),
            last_deposit_timestamp: Some(0),
        }
    }

    #[tokio::test]
    async fn deposit_sends_value() {
        let (ledger, submitter) = setup();
        let id = submitter.submit_deposit(ALICE, "0.01").await.unwrap();
        assert!(id.as_str().starts_with("0x"));

        let sent = ledger.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].call,
            WriteCall::Deposit {
                value: U256::from(10_000_000_000_000_000u64)
            }
        );
        assert_eq!(sent[0].from, ALICE);
    }

    #[tokio::test]
    async fn malformed_deposit_never_reaches_gateway() {
        let (ledger, submitter) = setup();
        let err = submitter.submit_deposit(ALICE, "ten").await.unwrap_err();
        assert!(matches!(err, VaultError::MalformedAmount(_)));
        assert!(ledger.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn rejected_withdrawal_never_reaches_gateway() {
        let (ledger, submitter) = setup();
        let err = submitter
            .submit_withdraw(ALICE, "2", &funded_snapshot(), NOW)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Rejected(RejectReason::InsufficientBalance { .. })
        ));
        assert_eq!(err.to_string(), "Insufficient vault balance.");
        assert!(ledger.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn accepted_withdrawal_sends_amount() {
        let (ledger, submitter) = setup();
        ledger.set_balance(ALICE, U256::from(1_000_000_000_000_000_000u64));
        submitter
            .submit_withdraw(ALICE, "0.005", &funded_snapshot(), NOW)
            .await
            .unwrap();
        assert_eq!(
            ledger.sent_transactions()[0].call,
            WriteCall::Withdraw {
                amount: U256::from(5_000_000_000_000_000u64)
            }
        );
    }

    #[tokio::test]
    async fn gateway_failure_uses_fallback_when_silent() {
        let (ledger, submitter) = setup();
        ledger.fail_sends(GatewayError::empty());
        let err = submitter.submit_deposit(ALICE, "1").await.unwrap_err();
        assert_eq!(err.to_string(), "Error sending deposit transaction");

        let err = submitter
            .submit_withdraw(ALICE, "0.1", &funded_snapshot(), NOW)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Error sending withdraw transaction");
    }

    #[tokio::test]
    async fn gateway_failure_prefers_short_message() {
        let (ledger, submitter) = setup();
        ledger.fail_sends(
            GatewayError::new("user rejected the request: long text")
                .with_short_message("User rejected the request."),
        );
        let err = submitter.submit_deposit(ALICE, "1").await.unwrap_err();
        assert_eq!(err.to_string(), "User rejected the request.");
    }

    #[tokio::test]
    async fn stale_snapshot_is_overruled_on_chain() {
        let (ledger, submitter) = setup();
        // Snapshot says funded and unlocked; the ledger disagrees.
        let err = submitter
            .submit_withdraw(ALICE, "0.5", &funded_snapshot(), NOW)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Execution reverted: Insufficient balance");
        assert_eq!(ledger.sent_transactions().len(), 1);
    }
}
