//! Script system for output locking conditions
//!
//! A sweep only ever spends two script shapes: pay-to-address (P2PKH) and
//! pay-to-raw-public-key. Anything else must be excluded before transaction
//! assembly. This module classifies locking scripts, builds the matching
//! unlocking scripts, and carries the signature hash mode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Opcodes
// =============================================================================

pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_PUSHDATA1: u8 = 0x4c;

// =============================================================================
// Script Errors
// =============================================================================

/// Script-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Unsupported script type")]
    UnsupportedScriptType,
    #[error("Malformed script: {0}")]
    Malformed(String),
    #[error("Push data too large: {0} bytes")]
    PushTooLarge(usize),
}

// =============================================================================
// Signature Hash Types
// =============================================================================

/// Signature hash type determines what parts of the transaction are signed.
/// Sweeps only ever use `All`; the other modes exist so the signer can
/// reject them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SigHashType {
    /// Sign all inputs and all outputs (the only supported mode)
    All = 0x01,
    /// Sign all inputs but no outputs
    None = 0x02,
    /// Sign all inputs and only the output with the same index
    Single = 0x03,
}

impl Default for SigHashType {
    fn default() -> Self {
        SigHashType::All
    }
}

impl SigHashType {
    /// The byte appended to each input signature
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

// =============================================================================
// Script Classification
// =============================================================================

/// The recognized shape of a locking script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    /// OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG
    PayToAddress { pubkey_hash: [u8; 20] },
    /// <pubkey> OP_CHECKSIG
    PayToPubKey { pubkey: Vec<u8> },
}

/// Classify a locking script into one of the supported shapes
pub fn classify(script: &[u8]) -> Result<ScriptKind, ScriptError> {
    // Pay-to-address: 25 bytes, fixed template
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&script[3..23]);
        return Ok(ScriptKind::PayToAddress { pubkey_hash });
    }

    // Pay-to-raw-pubkey: one push of a 33- or 65-byte key, then OP_CHECKSIG
    if script.len() >= 2 {
        let push_len = script[0] as usize;
        if (push_len == 33 || push_len == 65)
            && script.len() == push_len + 2
            && script[push_len + 1] == OP_CHECKSIG
        {
            return Ok(ScriptKind::PayToPubKey {
                pubkey: script[1..1 + push_len].to_vec(),
            });
        }
    }

    Err(ScriptError::UnsupportedScriptType)
}

/// Check whether a locking script is one of the shapes a sweep can spend
pub fn is_spendable(script: &[u8]) -> bool {
    classify(script).is_ok()
}

// =============================================================================
// Script Construction
// =============================================================================

/// Build a pay-to-address locking script for a 20-byte public key hash
pub fn pay_to_address_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(20);
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Build a pay-to-raw-pubkey locking script
pub fn pay_to_pubkey_script(pubkey: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    push_data(&mut script, pubkey)?;
    script.push(OP_CHECKSIG);
    Ok(script)
}

/// Unlocking script for a pay-to-address output: {signature, full pubkey}
pub fn input_script_with_key(signature: &[u8], pubkey: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let mut script = Vec::with_capacity(signature.len() + pubkey.len() + 4);
    push_data(&mut script, signature)?;
    push_data(&mut script, pubkey)?;
    Ok(script)
}

/// Unlocking script for a pay-to-raw-pubkey output: {signature} only
pub fn input_script(signature: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let mut script = Vec::with_capacity(signature.len() + 2);
    push_data(&mut script, signature)?;
    Ok(script)
}

/// Append a minimal push of `data` to `script`
fn push_data(script: &mut Vec<u8>, data: &[u8]) -> Result<(), ScriptError> {
    match data.len() {
        0..=75 => script.push(data.len() as u8),
        76..=255 => {
            script.push(OP_PUSHDATA1);
            script.push(data.len() as u8);
        }
        n => return Err(ScriptError::PushTooLarge(n)),
    }
    script.extend_from_slice(data);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_pay_to_address() {
        let hash = [0x11u8; 20];
        let script = pay_to_address_script(&hash);
        assert_eq!(script.len(), 25);
        assert_eq!(
            classify(&script).unwrap(),
            ScriptKind::PayToAddress { pubkey_hash: hash }
        );
        assert!(is_spendable(&script));
    }

    #[test]
    fn test_classify_pay_to_pubkey() {
        let pubkey = vec![0x02u8; 33];
        let script = pay_to_pubkey_script(&pubkey).unwrap();
        assert_eq!(
            classify(&script).unwrap(),
            ScriptKind::PayToPubKey { pubkey }
        );
    }

    #[test]
    fn test_classify_rejects_unknown_shapes() {
        // OP_RETURN-style data carrier
        assert_eq!(
            classify(&[0x6a, 0x04, 1, 2, 3, 4]),
            Err(ScriptError::UnsupportedScriptType)
        );
        // Empty script
        assert_eq!(classify(&[]), Err(ScriptError::UnsupportedScriptType));
        // Truncated pay-to-address template
        let mut script = pay_to_address_script(&[0u8; 20]);
        script.pop();
        assert!(classify(&script).is_err());
    }

    #[test]
    fn test_input_scripts() {
        let sig = vec![0x30u8; 71];
        let pubkey = vec![0x02u8; 33];

        let with_key = input_script_with_key(&sig, &pubkey).unwrap();
        assert_eq!(with_key[0] as usize, sig.len());
        assert_eq!(with_key[1 + sig.len()] as usize, pubkey.len());
        assert_eq!(with_key.len(), 2 + sig.len() + pubkey.len());

        let sig_only = input_script(&sig).unwrap();
        assert_eq!(sig_only.len(), 1 + sig.len());
    }

    #[test]
    fn test_pushdata1_boundary() {
        let mut script = Vec::new();
        push_data(&mut script, &vec![0u8; 100]).unwrap();
        assert_eq!(script[0], OP_PUSHDATA1);
        assert_eq!(script[1], 100);
        assert!(push_data(&mut script, &vec![0u8; 300]).is_err());
    }
}
