//! Error type shared by the submitter, the history reconstructor and the
//! session.
//!
//! Each variant's `Display` output is the single message a user sees, so
//! the wording matters more than usual.

use thiserror::Error;

use crate::amount::AmountError;
use crate::gateway::GatewayError;
use crate::validator::RejectReason;

/// Everything that can go wrong while operating the vault client.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The display amount could not be parsed. Nothing was sent.
    #[error(transparent)]
    MalformedAmount(#[from] AmountError),

    /// The withdrawal failed a local precondition. Nothing was sent.
    #[error(transparent)]
    Rejected(#[from] RejectReason),

    /// A read, scan or submission failed at the transport or contract level.
    #[error("{message}")]
    GatewayFailure {
        /// Human-readable message (short form, generic form or fallback).
        message: String,
        /// The underlying gateway error.
        source: GatewayError,
    },

    /// One of the two log scans failed; no partial history is returned.
    #[error("{message}")]
    PartialHistoryFailure {
        /// Human-readable message (generic form, short form or fallback).
        message: String,
        /// The underlying gateway error.
        source: GatewayError,
    },

    /// The operation needs a connected account and there is none.
    #[error("No account connected.")]
    NotConnected,
}

impl VaultError {
    /// Wraps a gateway failure, resolving its message against `fallback`.
    pub fn gateway(source: GatewayError, fallback: &str) -> Self {
        Self::GatewayFailure {
            message: source.human_message(fallback),
            source,
        }
    }

    /// Wraps a failed log scan. The generic message wins over the short one.
    pub fn partial_history(source: GatewayError, fallback: &str) -> Self {
        Self::PartialHistoryFailure {
            message: source.generic_message(fallback),
            source,
        }
    }

    /// `true` when the failure was decided locally, before any network call.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::MalformedAmount(_) | Self::Rejected(_) | Self::NotConnected
        )
    }
}
