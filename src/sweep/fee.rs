//! Fee estimation
//!
//! Computes the minimum acceptable network fee from the estimated
//! serialized transaction size. The size is estimated before signing, so
//! the per-input signature contribution is a fixed overhead; the result is
//! a deliberate minimum-fee approximation, not the exact final fee.

use crate::sweep::record::UnspentOutputRecord;

/// Serialized bytes per fee kilobyte
pub const KB: usize = 1000;

/// Fixed slack added per input on top of the public key hash length;
/// covers a DER-encoded signature plus script opcodes
pub const SIGNATURE_SCRIPT_SLACK: usize = 75;

/// Per-input signature overhead for a given signing key
pub fn signature_overhead(pubkey_hash_len: usize) -> usize {
    pubkey_hash_len + SIGNATURE_SCRIPT_SLACK
}

/// Estimates the minimum network fee for a sweep transaction
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimator {
    fee_per_kb: u64,
}

impl FeeEstimator {
    pub fn new(fee_per_kb: u64) -> Self {
        Self { fee_per_kb }
    }

    /// Minimum fee for a transaction spending `inputs`
    ///
    /// Total size = Σ over inputs of (locking-script length + signature
    /// overhead) + the serialized size of the transaction with empty input
    /// scripts, rounded up to whole kilobytes, times the reference fee.
    pub fn estimate_fee(
        &self,
        inputs: &[UnspentOutputRecord],
        unsigned_size: usize,
        sig_overhead: usize,
    ) -> u64 {
        let script_bytes: usize = inputs
            .iter()
            .map(|record| record.locking_script.len() / 2 + sig_overhead)
            .sum();
        let total_size = script_bytes + unsigned_size;

        // Integer division by 1000, rounding up
        let kilobytes = total_size.div_ceil(KB) as u64;
        kilobytes * self.fee_per_kb
    }
}
