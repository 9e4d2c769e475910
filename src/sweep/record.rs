//! Unspent output records
//!
//! The normalized form of one spendable output discovered at a provider,
//! plus the fixed-point parsing used for decimal coin amounts. Monetary
//! values are exact integers in the smallest unit from the moment they are
//! parsed; they are never handled as floating point.

use serde::{Deserialize, Serialize};

use crate::core::script::is_spendable;

/// Smallest-unit multiplier: 1 coin = 10^8 units
pub const COIN: u64 = 100_000_000;

/// Decimal places carried by provider amounts
pub const COIN_DECIMALS: usize = 8;

/// One discovered spendable output controlled by the sweep key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutputRecord {
    /// Hex-encoded hash of the output's parent transaction
    pub transaction_hash: String,
    /// Position within the parent transaction
    pub output_index: u32,
    /// Hex-encoded locking script
    pub locking_script: String,
    /// Amount in the smallest currency unit
    pub value: u64,
    /// 0 means unconfirmed
    pub confirmation_count: u32,
}

impl UnspentOutputRecord {
    /// Decoded locking script bytes
    pub fn script_bytes(&self) -> Option<Vec<u8>> {
        hex::decode(&self.locking_script).ok()
    }

    /// Whether the record satisfies the invariants required before it may
    /// take part in transaction assembly: positive value, a 32-byte parent
    /// hash, and a locking script of a recognized shape.
    pub fn is_valid(&self) -> bool {
        if self.value == 0 {
            return false;
        }
        match hex::decode(&self.transaction_hash) {
            Ok(hash) if hash.len() == 32 => {}
            _ => return false,
        }
        match self.script_bytes() {
            Some(script) => is_spendable(&script),
            None => false,
        }
    }
}

/// Parse a decimal coin amount ("5", "5.1", "5.00000000") into smallest
/// units with 8-decimal fixed-point precision
///
/// Returns `None` for malformed text, more than 8 decimals, or overflow.
pub fn parse_coin_amount(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('-') || text.starts_with('+') {
        return None;
    }

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > COIN_DECIMALS {
        return None;
    }

    let whole_units: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };

    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let padded = format!("{:0<width$}", frac, width = COIN_DECIMALS);
        padded.parse().ok()?
    };

    whole_units.checked_mul(COIN)?.checked_add(frac_units)
}
