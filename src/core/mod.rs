//! Core transaction components
//!
//! This module contains the building blocks the sweep pipeline assembles:
//! - Wire transactions (serialization, txid, per-input signature hashes)
//! - Script classification and construction (pay-to-address, pay-to-pubkey)

pub mod script;
pub mod transaction;

pub use script::{
    classify, input_script, input_script_with_key, is_spendable, pay_to_address_script,
    pay_to_pubkey_script, ScriptError, ScriptKind, SigHashType,
};
pub use transaction::{
    OutPoint, Transaction, TransactionError, TxInput, TxOutput, SEQUENCE_FINAL, TX_VERSION,
};
