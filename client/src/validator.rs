//! # Withdrawal Validator
//!
//! Decides, without touching the network, whether a withdrawal is worth
//! sending. The contract remains the final authority; this check only
//! spares the user a transaction that is certain to revert.
//!
//! Rules are evaluated in a fixed order and the first failure wins:
//!
//! 1. zero amount → [`RejectReason::NonPositiveAmount`]
//! 2. unknown balance → [`RejectReason::BalanceUnavailable`]
//! 3. amount above balance → [`RejectReason::InsufficientBalance`]
//! 4. deposit still inside the lock window → [`RejectReason::StillLocked`]
//!
//! Rule 4 only applies when a deposit exists and both the lock period and
//! the deposit time are known. Unknown lock inputs let the withdrawal
//! through, unlike an unknown balance.

use alloy_primitives::U256;
use thiserror::Error;

use crate::reader::VaultSnapshot;

/// Why a withdrawal was refused locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Withdraw amount must be greater than 0.")]
    NonPositiveAmount,

    #[error("Unable to read vault balance.")]
    BalanceUnavailable,

    #[error("Insufficient vault balance.")]
    InsufficientBalance {
        /// Balance in the snapshot, wei.
        available: U256,
        /// Requested amount, wei.
        requested: U256,
    },

    #[error("Funds are still locked. Try again in ~{remaining_seconds} seconds.")]
    StillLocked {
        /// Seconds until the lock expires (inclusive boundary).
        remaining_seconds: u64,
    },
}

/// Outcome of [`validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationVerdict {
    Accept,
    Reject(RejectReason),
}

impl ValidationVerdict {
    /// `true` for [`ValidationVerdict::Accept`].
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Converts into a `Result`, rejecting with the reason.
    pub fn into_result(self) -> Result<(), RejectReason> {
        match self {
            Self::Accept => Ok(()),
            Self::Reject(reason) => Err(reason),
        }
    }
}

/// Checks a withdrawal of `requested` wei against `snapshot` at unix time
/// `now`. Pure: the same inputs always give the same verdict.
pub fn validate(requested: U256, snapshot: &VaultSnapshot, now: u64) -> ValidationVerdict {
    if requested.is_zero() {
        return ValidationVerdict::Reject(RejectReason::NonPositiveAmount);
    }

    let Some(available) = snapshot.balance else {
        return ValidationVerdict::Reject(RejectReason::BalanceUnavailable);
    };

    if requested > available {
        return ValidationVerdict::Reject(RejectReason::InsufficientBalance {
            available,
            requested,
        });
    }

    // `now == unlock` is still locked.
    if let Some(unlock) = snapshot.unlock_time() {
        if now <= unlock {
            return ValidationVerdict::Reject(RejectReason::StillLocked {
                remaining_seconds: unlock - now,
            });
        }
    }

    ValidationVerdict::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: u64 = 1_700_000_000;

    fn snapshot(balance: u64, lock: Option<u64>, last: Option<u64>) -> VaultSnapshot {
        VaultSnapshot {
            balance: Some(U256::from(balance)),
            lock_period_seconds: lock,
            last_deposit_timestamp: last,
        }
    }

    fn wei(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn zero_amount_rejected_first() {
        let snap = snapshot(100, Some(0), Some(0));
        assert_eq!(
            validate(U256::ZERO, &snap, T),
            ValidationVerdict::Reject(RejectReason::NonPositiveAmount)
        );
        // Even with nothing known.
        assert_eq!(
            validate(U256::ZERO, &VaultSnapshot::empty(), T),
            ValidationVerdict::Reject(RejectReason::NonPositiveAmount)
        );
    }

    #[test]
    fn unknown_balance_rejected() {
        let snap = VaultSnapshot {
            balance: None,
            lock_period_seconds: Some(600),
            last_deposit_timestamp: Some(0),
        };
        assert_eq!(
            validate(wei(1), &snap, T),
            ValidationVerdict::Reject(RejectReason::BalanceUnavailable)
        );
    }

    #[test]
    fn insufficient_balance_wins_over_lock() {
        // Locked and overdrawn: the balance rule comes first.
        let snap = snapshot(100, Some(600), Some(T));
        assert_eq!(
            validate(wei(150), &snap, T + 1),
            ValidationVerdict::Reject(RejectReason::InsufficientBalance {
                available: wei(100),
                requested: wei(150),
            })
        );
    }

    #[test]
    fn lock_boundary_is_inclusive() {
        let snap = snapshot(100, Some(600), Some(T));
        assert_eq!(
            validate(wei(50), &snap, T + 599),
            ValidationVerdict::Reject(RejectReason::StillLocked {
                remaining_seconds: 1
            })
        );
        assert_eq!(
            validate(wei(50), &snap, T + 600),
            ValidationVerdict::Reject(RejectReason::StillLocked {
                remaining_seconds: 0
            })
        );
        assert_eq!(validate(wei(50), &snap, T + 601), ValidationVerdict::Accept);
    }

    #[test]
    fn full_balance_withdrawal_accepted() {
        let snap = snapshot(100, Some(600), Some(T));
        assert!(validate(wei(100), &snap, T + 10_000).is_accept());
    }

    #[test]
    fn no_deposit_history_skips_lock() {
        let snap = snapshot(100, Some(600), Some(0));
        assert!(validate(wei(10), &snap, 0).is_accept());
    }

    #[test]
    fn unknown_lock_inputs_are_permissive() {
        assert!(validate(wei(10), &snapshot(100, None, Some(T)), T).is_accept());
        assert!(validate(wei(10), &snapshot(100, Some(600), None), T).is_accept());
    }

    #[test]
    fn saturating_unlock_does_not_overflow() {
        let snap = snapshot(100, Some(u64::MAX), Some(u64::MAX));
        assert_eq!(
            validate(wei(1), &snap, u64::MAX),
            ValidationVerdict::Reject(RejectReason::StillLocked {
                remaining_seconds: 0
            })
        );
    }

    #[test]
    fn verdict_is_deterministic() {
        let snap = snapshot(100, Some(600), Some(T));
        let first = validate(wei(30), &snap, T + 300);
        for _ in 0..10 {
            assert_eq!(validate(wei(30), &snap, T + 300), first);
        }
    }

    #[test]
    fn reject_messages() {
        assert_eq!(
            RejectReason::StillLocked {
                remaining_seconds: 42
            }
            .to_string(),
            "Funds are still locked. Try again in ~42 seconds."
        );
        assert_eq!(
            RejectReason::BalanceUnavailable.to_string(),
            "Unable to read vault balance."
        );
        assert_eq!(
            ValidationVerdict::Reject(RejectReason::NonPositiveAmount).into_result(),
            Err(RejectReason::NonPositiveAmount)
        );
    }
}
