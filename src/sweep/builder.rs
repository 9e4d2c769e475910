//! Sweep transaction assembly
//!
//! Builds the unsigned transaction that drains every discovered output
//! into a single destination output, net of the estimated fee. No change
//! output is ever created.

use thiserror::Error;

use crate::core::script::pay_to_address_script;
use crate::core::transaction::{OutPoint, Transaction, TransactionError};
use crate::crypto::{address_to_pubkey_hash, KeyError, KeyPair};
use crate::sweep::fee::{signature_overhead, FeeEstimator};
use crate::sweep::record::UnspentOutputRecord;

/// Errors from transaction assembly
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No outputs to sweep")]
    NoOutputs,
    #[error("Insufficient funds: balance {balance} does not cover fee {fee}")]
    InsufficientFunds { balance: u64, fee: u64 },
    #[error("Output has no decodable locking script")]
    BadLockingScript,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// An assembled, not yet signed sweep transaction
#[derive(Debug)]
pub struct BuiltTransaction {
    pub transaction: Transaction,
    /// Locking script of each spent output, in input order; the signer
    /// needs these as its per-input signing context
    pub input_scripts: Vec<Vec<u8>>,
    pub fee: u64,
}

/// Assembles sweep transactions
pub struct TransactionBuilder {
    estimator: FeeEstimator,
    address_version: u8,
}

impl TransactionBuilder {
    pub fn new(fee_per_kb: u64, address_version: u8) -> Self {
        Self {
            estimator: FeeEstimator::new(fee_per_kb),
            address_version,
        }
    }

    /// Build the unsigned sweep transaction
    ///
    /// One input per discovered output with an empty unlocking script, one
    /// output paying the full confirmed balance to `destination`, then the
    /// sole output's value is reduced in place by the estimated fee.
    pub fn build(
        &self,
        outputs: &[UnspentOutputRecord],
        destination: &str,
        confirmed_balance: u64,
        key: &KeyPair,
    ) -> Result<BuiltTransaction, BuildError> {
        if outputs.is_empty() {
            return Err(BuildError::NoOutputs);
        }

        let destination_hash = address_to_pubkey_hash(destination, self.address_version)?;

        let mut tx = Transaction::new();
        let mut input_scripts = Vec::with_capacity(outputs.len());
        for record in outputs {
            tx.add_input(OutPoint::from_hex(
                &record.transaction_hash,
                record.output_index,
            )?);
            input_scripts.push(record.script_bytes().ok_or(BuildError::BadLockingScript)?);
        }

        // Initially carries the full balance; fee-adjusted below
        tx.add_output(
            confirmed_balance,
            pay_to_address_script(&destination_hash),
        );

        let fee = self.estimator.estimate_fee(
            outputs,
            tx.serialized_size(),
            signature_overhead(key.public_key_hash().len()),
        );
        if confirmed_balance <= fee {
            return Err(BuildError::InsufficientFunds {
                balance: confirmed_balance,
                fee,
            });
        }
        tx.outputs[0].value = confirmed_balance - fee;

        Ok(BuiltTransaction {
            transaction: tx,
            input_scripts,
            fee,
        })
    }
}
