//! In-memory ledger hosting a single SimpleVault.
//!
//! Behaves like the deployed contract closely enough to drive the client end
//! to end without a node: deposits credit the sender and stamp the deposit
//! time, withdrawals are refused on-chain while locked or overdrawn, and both
//! emit logs that the history scan returns. Every operation can be made to
//! fail on demand.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    GatewayError, LedgerGateway, LogFilter, RawLog, ReadCall, TransactionId, TransactionRequest,
    VaultEvent, WriteCall,
};

/// Which class of read to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadKind {
    Balance,
    LockPeriod,
    LastDepositTime,
}

impl From<&ReadCall> for ReadKind {
    fn from(call: &ReadCall) -> Self {
        match call {
            ReadCall::BalanceOf(_) => Self::Balance,
            ReadCall::LockPeriod => Self::LockPeriod,
            ReadCall::LastDepositTime(_) => Self::LastDepositTime,
        }
    }
}

#[derive(Clone, Debug)]
struct StoredLog {
    event: VaultEvent,
    user: Address,
    amount: U256,
    transaction_id: TransactionId,
    block_number: Option<u64>,
}

#[derive(Debug, Default)]
struct LedgerState {
    lock_period: U256,
    balances: HashMap<Address, U256>,
    last_deposit: HashMap<Address, u64>,
    logs: Vec<StoredLog>,
    block_number: u64,
    timestamp: u64,
    tx_counter: u64,
    read_failures: HashMap<ReadKind, GatewayError>,
    scan_failures: HashMap<VaultEvent, GatewayError>,
    send_failure: Option<GatewayError>,
    sent: Vec<TransactionRequest>,
    reads: usize,
    scans: usize,
}

impl LedgerState {
    fn next_transaction_id(&mut self) -> TransactionId {
        self.tx_counter += 1;
        TransactionId::new(format!("0x{:064x}", self.tx_counter))
    }
}

/// A single-vault ledger kept in memory.
#[derive(Debug)]
pub struct InMemoryLedger {
    vault: Address,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// A ledger with the vault at `vault`, the given lock period, block 1
    /// and clock at `timestamp`.
    pub fn new(vault: Address, lock_period_seconds: u64, timestamp: u64) -> Self {
        Self {
            vault,
            state: Mutex::new(LedgerState {
                lock_period: U256::from(lock_period_seconds),
                block_number: 1,
                timestamp,
                ..LedgerState::default()
            }),
        }
    }

    /// Address the vault is deployed at.
    pub fn vault(&self) -> Address {
        self.vault
    }

    /// Current ledger time (unix seconds).
    pub fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    /// Current block height.
    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Moves the ledger clock forward.
    pub fn advance_time(&self, seconds: u64) {
        self.state.lock().timestamp += seconds;
    }

    /// Overrides the raw `lockPeriod()` return value.
    pub fn set_lock_period(&self, lock_period: U256) {
        self.state.lock().lock_period = lock_period;
    }

    /// Overrides an account's balance without emitting a log.
    pub fn set_balance(&self, account: Address, balance: U256) {
        self.state.lock().balances.insert(account, balance);
    }

    /// Overrides an account's last deposit time without emitting a log.
    pub fn set_last_deposit(&self, account: Address, timestamp: u64) {
        self.state.lock().last_deposit.insert(account, timestamp);
    }

    /// Appends a raw log at an arbitrary block, leaving balances untouched.
    /// Returns the synthetic transaction id.
    pub fn push_log(
        &self,
        event: VaultEvent,
        user: Address,
        amount: U256,
        block_number: Option<u64>,
    ) -> TransactionId {
        let mut state = self.state.lock();
        let transaction_id = state.next_transaction_id();
        state.logs.push(StoredLog {
            event,
            user,
            amount,
            transaction_id: transaction_id.clone(),
            block_number,
        });
        transaction_id
    }

    /// Makes every read of `kind` fail with `error` until cleared.
    pub fn fail_reads(&self, kind: ReadKind, error: GatewayError) {
        self.state.lock().read_failures.insert(kind, error);
    }

    /// Makes every scan for `event` fail with `error` until cleared.
    pub fn fail_scans(&self, event: VaultEvent, error: GatewayError) {
        self.state.lock().scan_failures.insert(event, error);
    }

    /// Makes every submission fail with `error` until cleared.
    pub fn fail_sends(&self, error: GatewayError) {
        self.state.lock().send_failure = Some(error);
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.read_failures.clear();
        state.scan_failures.clear();
        state.send_failure = None;
    }

    /// Every transaction request that reached the ledger, accepted or not.
    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.state.lock().sent.clone()
    }

    /// Number of `read_state` calls served (including failed ones).
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Number of `scan_logs` calls served (including failed ones).
    pub fn scan_count(&self) -> usize {
        self.state.lock().scans
    }

    fn check_contract(&self, contract: Address) -> Result<(), GatewayError> {
        if contract == self.vault {
            Ok(())
        } else {
            Err(GatewayError::new(format!("no contract deployed at {contract}")))
        }
    }
}

fn revert(reason: &str) -> GatewayError {
    GatewayError::new(format!(
        "VM Exception while processing transaction: reverted with reason string '{reason}'"
    ))
    .with_short_message(format!("Execution reverted: {reason}"))
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn read_state(&self, contract: Address, call: ReadCall) -> Result<U256, GatewayError> {
        self.check_contract(contract)?;
        let mut state = self.state.lock();
        state.reads += 1;
        if let Some(err) = state.read_failures.get(&ReadKind::from(&call)) {
            return Err(err.clone());
        }
        Ok(match call {
            ReadCall::BalanceOf(account) => {
                state.balances.get(&account).copied().unwrap_or_default()
            }
            ReadCall::LockPeriod => state.lock_period,
            ReadCall::LastDepositTime(account) => {
                U256::from(state.last_deposit.get(&account).copied().unwrap_or_default())
            }
        })
    }

    async fn scan_logs(
        &self,
        contract: Address,
        event: VaultEvent,
        filter: LogFilter,
    ) -> Result<Vec<RawLog>, GatewayError> {
        self.check_contract(contract)?;
        let mut state = self.state.lock();
        state.scans += 1;
        if let Some(err) = state.scan_failures.get(&event) {
            return Err(err.clone());
        }
        let to_block = filter.to_block.unwrap_or(u64::MAX);
        Ok(state
            .logs
            .iter()
            .filter(|log| log.event == event && log.user == filter.user)
            .filter(|log| match log.block_number {
                Some(block) => block >= filter.from_block && block <= to_block,
                None => true,
            })
            .map(|log| RawLog {
                amount: log.amount,
                transaction_id: log.transaction_id.clone(),
                block_number: log.block_number,
            })
            .collect())
    }

    async fn send_transaction(
        &self,
        contract: Address,
        request: TransactionRequest,
    ) -> Result<TransactionId, GatewayError> {
        self.check_contract(contract)?;
        let mut state = self.state.lock();
        state.sent.push(request);
        if let Some(err) = &state.send_failure {
            return Err(err.clone());
        }

        let from = request.from;
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        let (event, amount) = match request.call {
            WriteCall::Deposit { value } => {
                if value.is_zero() {
                    return Err(revert("Deposit must be > 0"));
                }
                let timestamp = state.timestamp;
                state.balances.insert(from, balance.saturating_add(value));
                state.last_deposit.insert(from, timestamp);
                (VaultEvent::Deposited, value)
            }
            WriteCall::Withdraw { amount } => {
                if amount > balance {
                    return Err(revert("Insufficient balance"));
                }
                let last = state.last_deposit.get(&from).copied().unwrap_or_default();
                let lock = u64::try_from(state.lock_period).unwrap_or(u64::MAX);
                if state.timestamp < last.saturating_add(lock) {
                    return Err(revert("Funds are locked"));
                }
                state.balances.insert(from, balance - amount);
                (VaultEvent::Withdrawn, amount)
            }
        };

        let transaction_id = state.next_transaction_id();
        let block_number = state.block_number;
        state.logs.push(StoredLog {
            event,
            user: from,
            amount,
            transaction_id: transaction_id.clone(),
            block_number: Some(block_number),
        });
        state.block_number += 1;
        Ok(transaction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAULT: Address = Address::new([0xaa; 20]);
    const ALICE: Address = Address::new([0x01; 20]);

    #[tokio::test]
    async fn deposit_credits_and_logs() {
        let ledger = InMemoryLedger::new(VAULT, 60, 1_000);
        let value = U256::from(500u64);
        ledger
            .send_transaction(
                VAULT,
                TransactionRequest {
                    from: ALICE,
                    call: WriteCall::Deposit { value },
                },
            )
            .await
            .unwrap();

        assert_eq!(
            ledger.read_state(VAULT, ReadCall::BalanceOf(ALICE)).await.unwrap(),
            value
        );
        assert_eq!(
            ledger.read_state(VAULT, ReadCall::LastDepositTime(ALICE)).await.unwrap(),
            U256::from(1_000u64)
        );
        let logs = ledger
            .scan_logs(VAULT, VaultEvent::Deposited, LogFilter::for_user(ALICE, 0))
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, Some(1));
        assert_eq!(ledger.block_number(), 2);
    }

    #[tokio::test]
    async fn withdraw_reverts_while_locked() {
        let ledger = InMemoryLedger::new(VAULT, 60, 1_000);
        ledger.set_balance(ALICE, U256::from(10u8));
        ledger.set_last_deposit(ALICE, 990);

        let request = TransactionRequest {
            from: ALICE,
            call: WriteCall::Withdraw {
                amount: U256::from(5u8),
            },
        };
        let err = ledger.send_transaction(VAULT, request).await.unwrap_err();
        assert_eq!(err.human_message("fb"), "Execution reverted: Funds are locked");

        ledger.advance_time(100);
        assert!(ledger.send_transaction(VAULT, request).await.is_ok());
        assert_eq!(ledger.sent_transactions().len(), 2);
    }

    #[tokio::test]
    async fn unknown_contract_is_an_error() {
        let ledger = InMemoryLedger::new(VAULT, 60, 0);
        assert!(ledger
            .read_state(Address::ZERO, ReadCall::LockPeriod)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn injected_failures_apply_per_kind() {
        let ledger = InMemoryLedger::new(VAULT, 60, 0);
        ledger.fail_reads(ReadKind::LockPeriod, GatewayError::new("boom"));
        assert!(ledger.read_state(VAULT, ReadCall::LockPeriod).await.is_err());
        assert!(ledger
            .read_state(VAULT, ReadCall::BalanceOf(ALICE))
            .await
            .is_ok());

        ledger.clear_failures();
        assert!(ledger.read_state(VAULT, ReadCall::LockPeriod).await.is_ok());
        assert_eq!(ledger.read_count(), 3);
    }
}
