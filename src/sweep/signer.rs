//! Input signing
//!
//! Produces a signature for every input of the sweep transaction and
//! attaches the unlocking script matching each spent output's shape.
//!
//! The transaction is signed with all input scripts empty except the input
//! being signed, which momentarily carries the locking script of the
//! output it spends. Each input is signed independently this way; the
//! per-input signature hash algorithm mandates it.

use thiserror::Error;

use crate::core::script::{
    classify, input_script, input_script_with_key, ScriptError, ScriptKind, SigHashType,
};
use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::{KeyError, KeyPair};

/// Errors from input signing
#[derive(Error, Debug)]
pub enum SignError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(&'static str),
    #[error("Unsupported signing mode: {0:?}")]
    UnsupportedSigningMode(SigHashType),
    #[error("Unsupported script type on input {0}")]
    UnsupportedScriptType(usize),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Sign every input of `tx` with `key`, attaching unlocking scripts
///
/// `input_scripts` holds the locking script of each spent output, one per
/// input in the same order. Only the "sign everything" mode is supported.
/// Outputs of unsupported script shapes must have been excluded at fetch
/// time; meeting one here is fatal.
pub fn sign_transaction_inputs(
    tx: &mut Transaction,
    hash_type: SigHashType,
    key: &KeyPair,
    input_scripts: &[Vec<u8>],
) -> Result<(), SignError> {
    if tx.inputs.is_empty() {
        return Err(SignError::InvalidTransaction("no inputs"));
    }
    if tx.outputs.is_empty() {
        return Err(SignError::InvalidTransaction("no outputs"));
    }
    if input_scripts.len() != tx.inputs.len() {
        return Err(SignError::InvalidTransaction(
            "input script count does not match input count",
        ));
    }
    if hash_type != SigHashType::All {
        return Err(SignError::UnsupportedSigningMode(hash_type));
    }

    // First pass: compute every signature while all unlocking scripts are
    // still in their pre-signing state.
    let mut signatures = Vec::with_capacity(tx.inputs.len());
    for (i, script_pubkey) in input_scripts.iter().enumerate() {
        if !tx.inputs[i].script_sig.is_empty() {
            log::warn!(
                "re-signing input {} of an already signed transaction; be sure this is what you want",
                i
            );
        }

        let sighash = tx.signature_hash(i, script_pubkey, hash_type)?;
        let mut signature = key.sign_hash(&sighash)?;
        signature.push(hash_type.as_byte());
        signatures.push(signature);
    }

    // Second pass: build each unlocking script from the signature and key
    // material the spent output's shape requires.
    for (i, script_pubkey) in input_scripts.iter().enumerate() {
        let script_sig = match classify(script_pubkey) {
            Ok(ScriptKind::PayToAddress { .. }) => {
                input_script_with_key(&signatures[i], &key.public_key_bytes())?
            }
            Ok(ScriptKind::PayToPubKey { .. }) => input_script(&signatures[i])?,
            Err(_) => return Err(SignError::UnsupportedScriptType(i)),
        };
        tx.inputs[i].script_sig = script_sig;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::{pay_to_address_script, pay_to_pubkey_script};
    use crate::core::transaction::OutPoint;

    fn unsigned_tx(input_count: usize) -> Transaction {
        let mut tx = Transaction::new();
        for i in 0..input_count {
            tx.add_input(OutPoint::from_hex(&"ab".repeat(32), i as u32).unwrap());
        }
        tx.add_output(499_900_000, pay_to_address_script(&[1u8; 20]));
        tx
    }

    #[test]
    fn test_sign_pay_to_address_inputs() {
        let key = KeyPair::generate();
        let mut tx = unsigned_tx(3);
        let scripts = vec![pay_to_address_script(&key.public_key_hash()); 3];

        sign_transaction_inputs(&mut tx, SigHashType::All, &key, &scripts).unwrap();

        let pubkey = key.public_key_bytes();
        for (i, input) in tx.inputs.iter().enumerate() {
            assert!(!input.script_sig.is_empty());
            // {signature, full public key}: script ends with the pubkey push
            let tail = &input.script_sig[input.script_sig.len() - pubkey.len()..];
            assert_eq!(tail, &pubkey[..]);

            // Signature verifies against the sighash it was computed over
            let sig_len = input.script_sig[0] as usize;
            let der = &input.script_sig[1..sig_len]; // strip trailing hash-type byte
            let sighash = tx.signature_hash(i, &scripts[i], SigHashType::All).unwrap();
            assert!(key.verify_hash(&sighash, der).unwrap());
        }
    }

    #[test]
    fn test_sign_pay_to_pubkey_input() {
        let key = KeyPair::generate();
        let mut tx = unsigned_tx(1);
        let scripts = vec![pay_to_pubkey_script(&key.public_key_bytes()).unwrap()];

        sign_transaction_inputs(&mut tx, SigHashType::All, &key, &scripts).unwrap();

        // {signature} only: a single push
        let script_sig = &tx.inputs[0].script_sig;
        let sig_len = script_sig[0] as usize;
        assert_eq!(script_sig.len(), 1 + sig_len);
    }

    #[test]
    fn test_mixed_script_shapes() {
        let key = KeyPair::generate();
        let mut tx = unsigned_tx(2);
        let scripts = vec![
            pay_to_address_script(&key.public_key_hash()),
            pay_to_pubkey_script(&key.public_key_bytes()).unwrap(),
        ];

        sign_transaction_inputs(&mut tx, SigHashType::All, &key, &scripts).unwrap();
        assert!(tx.inputs[0].script_sig.len() > tx.inputs[1].script_sig.len());
    }

    #[test]
    fn test_rejects_empty_transaction() {
        let key = KeyPair::generate();
        let mut no_inputs = Transaction::new();
        no_inputs.add_output(1, pay_to_address_script(&[1u8; 20]));
        assert!(matches!(
            sign_transaction_inputs(&mut no_inputs, SigHashType::All, &key, &[]),
            Err(SignError::InvalidTransaction(_))
        ));

        let mut no_outputs = Transaction::new();
        no_outputs.add_input(OutPoint::from_hex(&"ab".repeat(32), 0).unwrap());
        assert!(matches!(
            sign_transaction_inputs(&mut no_outputs, SigHashType::All, &key, &[vec![]]),
            Err(SignError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_rejects_non_all_hash_type() {
        let key = KeyPair::generate();
        let mut tx = unsigned_tx(1);
        let scripts = vec![pay_to_address_script(&key.public_key_hash())];
        assert!(matches!(
            sign_transaction_inputs(&mut tx, SigHashType::None, &key, &scripts),
            Err(SignError::UnsupportedSigningMode(SigHashType::None))
        ));
        assert!(matches!(
            sign_transaction_inputs(&mut tx, SigHashType::Single, &key, &scripts),
            Err(SignError::UnsupportedSigningMode(SigHashType::Single))
        ));
    }

    #[test]
    fn test_rejects_unsupported_script_shape() {
        let key = KeyPair::generate();
        let mut tx = unsigned_tx(1);
        let scripts = vec![vec![0x6a, 0x01, 0xff]]; // OP_RETURN
        assert!(matches!(
            sign_transaction_inputs(&mut tx, SigHashType::All, &key, &scripts),
            Err(SignError::UnsupportedScriptType(0))
        ));
    }

    #[test]
    fn test_rejects_script_count_mismatch() {
        let key = KeyPair::generate();
        let mut tx = unsigned_tx(2);
        let scripts = vec![pay_to_address_script(&key.public_key_hash())];
        assert!(matches!(
            sign_transaction_inputs(&mut tx, SigHashType::All, &key, &scripts),
            Err(SignError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_resigning_allowed() {
        let key = KeyPair::generate();
        let mut tx = unsigned_tx(1);
        let scripts = vec![pay_to_address_script(&key.public_key_hash())];
        sign_transaction_inputs(&mut tx, SigHashType::All, &key, &scripts).unwrap();
        // Signing again is flagged in the log but succeeds
        sign_transaction_inputs(&mut tx, SigHashType::All, &key, &scripts).unwrap();
        assert!(!tx.inputs[0].script_sig.is_empty());
    }
}
