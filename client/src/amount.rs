//! # Amount Codec
//!
//! Converts between what a human types (`"0.01"`) and what the ledger
//! stores (`10_000_000_000_000_000` wei). Both directions are exact: the
//! parser works digit by digit on [`U256`] and the formatter works on the
//! decimal string of the integer, so no binary floating point is ever
//! involved.
//!
//! Parsing is strict. Anything that cannot be represented exactly within the
//! unit's fractional digits is rejected rather than rounded, because a
//! silently rounded withdrawal amount is worse than an error message.

use alloy_primitives::U256;
use thiserror::Error;

use crate::config::NATIVE_DECIMALS;

/// Errors produced while parsing a display-form amount.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input is not a non-negative decimal representable in the unit.
    #[error("Invalid amount \"{input}\": {reason}.")]
    Malformed {
        /// The offending input, untrimmed.
        input: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

impl AmountError {
    fn malformed(input: &str, reason: &'static str) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason,
        }
    }
}

/// Fixed-point codec for a unit with `decimals` fractional digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitCodec {
    decimals: u8,
}

impl UnitCodec {
    /// Ether: 18 fractional digits.
    pub const ETHER: Self = Self::new(NATIVE_DECIMALS);

    /// Codec for a unit with the given number of fractional digits.
    pub const fn new(decimals: u8) -> Self {
        Self { decimals }
    }

    /// Number of fractional digits.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Parses a display-form decimal into its ledger-form integer.
    ///
    /// Accepts `"1"`, `"1.5"`, `"1."`, `".5"` and surrounding whitespace.
    /// Rejects signs, exponents, thousands separators, empty input, more
    /// significant fractional digits than the unit carries, and values that
    /// do not fit in 256 bits. Excess fractional digits are tolerated only
    /// when they are all zero (`"0.1000000000000000000"` is still exact).
    pub fn to_ledger_form(&self, display: &str) -> Result<U256, AmountError> {
        let trimmed = display.trim();
        if trimmed.is_empty() {
            return Err(AmountError::malformed(display, "empty input"));
        }

        let (integer, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if integer.is_empty() && fraction.is_empty() {
            return Err(AmountError::malformed(display, "no digits"));
        }
        if !integer.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(AmountError::malformed(display, "not a non-negative decimal number"));
        }

        let decimals = usize::from(self.decimals);
        let fraction = if fraction.len() > decimals {
            let (kept, excess) = fraction.split_at(decimals);
            if excess.bytes().any(|b| b != b'0') {
                return Err(AmountError::malformed(
                    display,
                    "more fractional digits than the unit supports",
                ));
            }
            kept
        } else {
            fraction
        };

        let padding = decimals - fraction.len();
        let digits = integer
            .bytes()
            .chain(fraction.bytes())
            .chain(std::iter::repeat(b'0').take(padding));

        let ten = U256::from(10u8);
        let mut value = U256::ZERO;
        for digit in digits {
            value = value
                .checked_mul(ten)
                .and_then(|v| v.checked_add(U256::from(digit - b'0')))
                .ok_or_else(|| AmountError::malformed(display, "value exceeds 256 bits"))?;
        }
        Ok(value)
    }

    /// Formats a ledger-form integer as a display-form decimal.
    ///
    /// Never fails. Trailing fractional zeros are trimmed and the point is
    /// dropped for whole values, so `10^18` formats as `"1"`.
    pub fn to_display_form(&self, ledger: U256) -> String {
        let digits = ledger.to_string();
        let decimals = usize::from(self.decimals);
        if decimals == 0 {
            return digits;
        }

        let padded = if digits.len() <= decimals {
            format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (integer, fraction) = padded.split_at(padded.len() - decimals);
        let fraction = fraction.trim_end_matches('0');

        if fraction.is_empty() {
            integer.to_string()
        } else {
            format!("{integer}.{fraction}")
        }
    }
}

impl Default for UnitCodec {
    fn default() -> Self {
        Self::ETHER
    }
}

/// Parses an ether-denominated display amount into wei.
pub fn to_ledger_form(display: &str) -> Result<U256, AmountError> {
    UnitCodec::ETHER.to_ledger_form(display)
}

/// Formats a wei amount as an ether-denominated display string.
pub fn to_display_form(ledger: U256) -> String {
    UnitCodec::ETHER.to_display_form(ledger)
}
