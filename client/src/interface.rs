//! # Vault Contract Interface
//!
//! The statically typed shape of the SimpleVault contract: which selector
//! each [`ReadCall`]/[`WriteCall`] maps to, which topic each [`VaultEvent`]
//! carries, and how arguments are ABI-encoded.
//!
//! Front ends usually load the contract ABI as an untyped JSON blob and
//! trust it at every call site. Here the ABI is checked once, at startup,
//! by [`VaultInterface::from_artifact`]; after that the client only deals in
//! typed calls and precomputed selectors.

use alloy_primitives::{keccak256, Selector, B256};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{
    BALANCE_OF_SIGNATURE, DEPOSITED_EVENT_SIGNATURE, DEPOSIT_SIGNATURE,
    LAST_DEPOSIT_TIME_SIGNATURE, LOCK_PERIOD_SIGNATURE, WITHDRAWN_EVENT_SIGNATURE,
    WITHDRAW_SIGNATURE,
};
use crate::gateway::{ReadCall, VaultEvent, WriteCall};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Problems found while validating an ABI artifact.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AbiError {
    /// The artifact is not valid JSON or not an ABI.
    #[error("unreadable ABI artifact: {0}")]
    Parse(String),

    /// A function the client calls is absent.
    #[error("ABI is missing function `{0}`")]
    MissingFunction(&'static str),

    /// An event the client scans for is absent.
    #[error("ABI is missing event `{0}`")]
    MissingEvent(&'static str),

    /// The entry exists but its shape differs from what the client encodes.
    #[error("ABI entry `{signature}` does not match: {reason}")]
    Mismatch {
        /// Canonical signature of the offending entry.
        signature: &'static str,
        /// What differs.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// VaultInterface
// ---------------------------------------------------------------------------

/// Precomputed selectors and topics for the vault contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultInterface {
    balance_of: Selector,
    lock_period: Selector,
    last_deposit_time: Selector,
    deposit: Selector,
    withdraw: Selector,
    deposited_topic: B256,
    withdrawn_topic: B256,
}

impl VaultInterface {
    /// The interface derived from SimpleVault's canonical signatures.
    pub fn simple_vault() -> Self {
        Self {
            balance_of: selector(BALANCE_OF_SIGNATURE),
            lock_period: selector(LOCK_PERIOD_SIGNATURE),
            last_deposit_time: selector(LAST_DEPOSIT_TIME_SIGNATURE),
            deposit: selector(DEPOSIT_SIGNATURE),
            withdraw: selector(WITHDRAW_SIGNATURE),
            deposited_topic: keccak256(DEPOSITED_EVENT_SIGNATURE),
            withdrawn_topic: keccak256(WITHDRAWN_EVENT_SIGNATURE),
        }
    }

    /// Validates a Hardhat artifact (`{"abi": [...]}`) or a bare ABI array
    /// and returns the interface if every entry the client relies on is
    /// present with the expected shape.
    pub fn from_artifact(json: &str) -> Result<Self, AbiError> {
        let artifact: Artifact =
            serde_json::from_str(json).map_err(|e| AbiError::Parse(e.to_string()))?;
        let items = match artifact {
            Artifact::Hardhat { abi } => abi,
            Artifact::Bare(items) => items,
        };

        for requirement in REQUIRED_FUNCTIONS {
            requirement.check(&items)?;
        }
        for requirement in REQUIRED_EVENTS {
            requirement.check(&items)?;
        }

        Ok(Self::simple_vault())
    }

    /// Selector of a read call.
    pub fn read_selector(&self, call: &ReadCall) -> Selector {
        match call {
            ReadCall::BalanceOf(_) => self.balance_of,
            ReadCall::LockPeriod => self.lock_period,
            ReadCall::LastDepositTime(_) => self.last_deposit_time,
        }
    }

    /// Selector of a write call.
    pub fn write_selector(&self, call: &WriteCall) -> Selector {
        match call {
            WriteCall::Deposit { .. } => self.deposit,
            WriteCall::Withdraw { .. } => self.withdraw,
        }
    }

    /// Topic 0 of an event.
    pub fn event_topic(&self, event: VaultEvent) -> B256 {
        match event {
            VaultEvent::Deposited => self.deposited_topic,
            VaultEvent::Withdrawn => self.withdrawn_topic,
        }
    }

    /// ABI-encoded calldata for a read call.
    pub fn encode_read(&self, call: &ReadCall) -> Vec<u8> {
        let mut data = self.read_selector(call).to_vec();
        match call {
            ReadCall::BalanceOf(account) | ReadCall::LastDepositTime(account) => {
                data.extend_from_slice(account.into_word().as_slice());
            }
            ReadCall::LockPeriod => {}
        }
        data
    }

    /// ABI-encoded calldata for a write call. The deposit value travels as
    /// the transaction value, not as calldata.
    pub fn encode_write(&self, call: &WriteCall) -> Vec<u8> {
        let mut data = self.write_selector(call).to_vec();
        if let WriteCall::Withdraw { amount } = call {
            data.extend_from_slice(&amount.to_be_bytes::<32>());
        }
        data
    }
}

impl Default for VaultInterface {
    fn default() -> Self {
        Self::simple_vault()
    }
}

fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature)[..4])
}

// ---------------------------------------------------------------------------
// Artifact Validation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum Artifact {
    Hardhat { abi: Vec<AbiItem> },
    Bare(Vec<AbiItem>),
}

#[derive(Deserialize)]
struct AbiItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
    #[serde(rename = "stateMutability", default)]
    state_mutability: Option<String>,
    // Pre-0.5 compilers emit `payable: true` instead of a mutability.
    #[serde(default)]
    payable: Option<bool>,
    #[serde(default)]
    anonymous: bool,
}

#[derive(Deserialize)]
struct AbiParam {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    indexed: bool,
}

struct RequiredFunction {
    signature: &'static str,
    name: &'static str,
    inputs: &'static [&'static str],
    output: Option<&'static str>,
    payable: bool,
}

struct RequiredEvent {
    signature: &'static str,
    name: &'static str,
}

const REQUIRED_FUNCTIONS: &[RequiredFunction] = &[
    RequiredFunction {
        signature: BALANCE_OF_SIGNATURE,
        name: "balanceOf",
        inputs: &["address"],
        output: Some("uint256"),
        payable: false,
    },
    RequiredFunction {
        signature: LOCK_PERIOD_SIGNATURE,
        name: "lockPeriod",
        inputs: &[],
        output: Some("uint256"),
        payable: false,
    },
    RequiredFunction {
        signature: LAST_DEPOSIT_TIME_SIGNATURE,
        name: "lastDepositTime",
        inputs: &["address"],
        output: Some("uint256"),
        payable: false,
    },
    RequiredFunction {
        signature: DEPOSIT_SIGNATURE,
        name: "deposit",
        inputs: &[],
        output: None,
        payable: true,
    },
    RequiredFunction {
        signature: WITHDRAW_SIGNATURE,
        name: "withdraw",
        inputs: &["uint256"],
        output: None,
        payable: false,
    },
];

const REQUIRED_EVENTS: &[RequiredEvent] = &[
    RequiredEvent {
        signature: DEPOSITED_EVENT_SIGNATURE,
        name: "Deposited",
    },
    RequiredEvent {
        signature: WITHDRAWN_EVENT_SIGNATURE,
        name: "Withdrawn",
    },
];

impl RequiredFunction {
    fn check(&self, items: &[AbiItem]) -> Result<(), AbiError> {
        let candidates: Vec<&AbiItem> = items
            .iter()
            .filter(|i| i.kind == "function" && i.name.as_deref() == Some(self.name))
            .collect();
        if candidates.is_empty() {
            return Err(AbiError::MissingFunction(self.signature));
        }

        // Overloads are legal; only the one with our input types matters.
        let item = candidates
            .into_iter()
            .find(|i| i.inputs.iter().map(|p| p.ty.as_str()).eq(self.inputs.iter().copied()))
            .ok_or_else(|| self.mismatch("no overload with the expected inputs"))?;

        if let Some(output) = self.output {
            let outputs: Vec<&str> = item.outputs.iter().map(|p| p.ty.as_str()).collect();
            if outputs != [output] {
                return Err(self.mismatch(format!("expected returns ({output}), found {outputs:?}")));
            }
        }

        let is_payable = item.state_mutability.as_deref() == Some("payable")
            || item.payable == Some(true);
        if self.payable && !is_payable {
            return Err(self.mismatch("function must be payable"));
        }
        Ok(())
    }

    fn mismatch(&self, reason: impl Into<String>) -> AbiError {
        AbiError::Mismatch {
            signature: self.signature,
            reason: reason.into(),
        }
    }
}

impl RequiredEvent {
    fn check(&self, items: &[AbiItem]) -> Result<(), AbiError> {
        let item = items
            .iter()
            .find(|i| i.kind == "event" && i.name.as_deref() == Some(self.name))
            .ok_or(AbiError::MissingEvent(self.signature))?;

        let mismatch = |reason: &str| AbiError::Mismatch {
            signature: self.signature,
            reason: reason.to_string(),
        };
        if item.anonymous {
            return Err(mismatch("event must not be anonymous"));
        }
        match item.inputs.as_slice() {
            [user, amount] if user.ty == "address" && amount.ty == "uint256" => {
                if !user.indexed {
                    return Err(mismatch("`user` must be indexed"));
                }
                if amount.indexed {
                    return Err(mismatch("`amount` must not be indexed"));
                }
                Ok(())
            }
            _ => Err(mismatch("expected (address indexed user, uint256 amount)")),
        }
    }
}
