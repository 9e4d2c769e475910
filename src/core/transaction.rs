//! Wire transaction model
//!
//! A Bitcoin-style serialized transaction: version, inputs referencing
//! previous outputs, outputs carrying a value and locking script, and a
//! locktime. The serialized form matters here for two reasons: the fee is
//! estimated from the unsigned serialized size, and the per-input signature
//! hash is computed over a modified serialization.

use bytes::BufMut;
use thiserror::Error;

use crate::core::script::SigHashType;
use crate::crypto::double_sha256;

// =============================================================================
// Constants
// =============================================================================

/// Current transaction version
pub const TX_VERSION: u32 = 1;

/// Sequence number marking an input as final
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid transaction hash: {0}")]
    InvalidHash(String),
    #[error("Input index {0} out of range")]
    InputIndexOutOfRange(usize),
}

// =============================================================================
// Outpoint / Input / Output
// =============================================================================

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPoint {
    /// Hash of the previous transaction (internal byte order)
    pub hash: [u8; 32],
    /// Index of the output within that transaction
    pub index: u32,
}

impl OutPoint {
    /// Parse an outpoint from the hex transaction hash a provider reports
    pub fn from_hex(hash_hex: &str, index: u32) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hash_hex)
            .map_err(|_| TransactionError::InvalidHash(hash_hex.to_string()))?;
        if bytes.len() != 32 {
            return Err(TransactionError::InvalidHash(hash_hex.to_string()));
        }
        // Display order is byte-reversed relative to the wire
        let mut hash = [0u8; 32];
        for (i, byte) in bytes.iter().enumerate() {
            hash[31 - i] = *byte;
        }
        Ok(Self { hash, index })
    }

    /// Hex transaction hash in display order
    pub fn hash_hex(&self) -> String {
        let mut reversed = self.hash;
        reversed.reverse();
        hex::encode(reversed)
    }
}

/// Transaction input (reference to a previous output plus unlocking script)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub previous_output: OutPoint,
    /// Unlocking script; empty until the input is signed
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    /// Unsigned input referencing a previous output
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// Transaction output (value plus locking script)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Amount in the smallest currency unit
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

// =============================================================================
// Transaction
// =============================================================================

/// A wire transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

impl Transaction {
    /// Create an empty transaction
    pub fn new() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locktime: 0,
        }
    }

    /// Add an unsigned input referencing a previous output
    pub fn add_input(&mut self, previous_output: OutPoint) {
        self.inputs.push(TxInput::unsigned(previous_output));
    }

    /// Add an output paying `value` under `script_pubkey`
    pub fn add_output(&mut self, value: u64, script_pubkey: Vec<u8>) {
        self.outputs.push(TxOutput {
            value,
            script_pubkey,
        });
    }

    /// Serialize to the wire format
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        buf.put_u32_le(self.version);
        put_varint(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.put_slice(&input.previous_output.hash);
            buf.put_u32_le(input.previous_output.index);
            put_varint(&mut buf, input.script_sig.len() as u64);
            buf.put_slice(&input.script_sig);
            buf.put_u32_le(input.sequence);
        }
        put_varint(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.put_u64_le(output.value);
            put_varint(&mut buf, output.script_pubkey.len() as u64);
            buf.put_slice(&output.script_pubkey);
        }
        buf.put_u32_le(self.locktime);
        buf
    }

    /// Size of the serialized transaction in bytes
    pub fn serialized_size(&self) -> usize {
        let mut size = 4 + varint_size(self.inputs.len() as u64);
        for input in &self.inputs {
            size += 32 + 4 + varint_size(input.script_sig.len() as u64) + input.script_sig.len() + 4;
        }
        size += varint_size(self.outputs.len() as u64);
        for output in &self.outputs {
            size += 8 + varint_size(output.script_pubkey.len() as u64) + output.script_pubkey.len();
        }
        size + 4
    }

    /// Transaction identifier: double SHA-256 of the serialization,
    /// hex-encoded in display order
    pub fn txid(&self) -> String {
        let mut hash = double_sha256(&self.serialize());
        hash.reverse();
        hex::encode(hash)
    }

    /// Signature hash for one input
    ///
    /// The transaction is hashed with every input script empty except the
    /// input being signed, which carries the locking script of the output
    /// it spends. The hash type is appended as a little-endian u32. This
    /// layout is mandated by the signature hash algorithm, not a choice.
    pub fn signature_hash(
        &self,
        input_index: usize,
        script_code: &[u8],
        hash_type: SigHashType,
    ) -> Result<[u8; 32], TransactionError> {
        if input_index >= self.inputs.len() {
            return Err(TransactionError::InputIndexOutOfRange(input_index));
        }

        let mut copy = self.clone();
        for (i, input) in copy.inputs.iter_mut().enumerate() {
            input.script_sig = if i == input_index {
                script_code.to_vec()
            } else {
                Vec::new()
            };
        }

        let mut data = copy.serialize();
        data.put_u32_le(hash_type.as_byte() as u32);

        let digest = double_sha256(&data);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        Ok(hash)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Variable-length integers
// =============================================================================

/// Append a Bitcoin-style variable-length integer
fn put_varint(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => buf.put_u8(value as u8),
        0xFD..=0xFFFF => {
            buf.put_u8(0xFD);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.put_u8(0xFE);
            buf.put_u32_le(value as u32);
        }
        _ => {
            buf.put_u8(0xFF);
            buf.put_u64_le(value);
        }
    }
}

/// Serialized size of a variable-length integer
fn varint_size(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::pay_to_address_script;

    fn sample_outpoint() -> OutPoint {
        OutPoint::from_hex(&"ab".repeat(32), 1).unwrap()
    }

    #[test]
    fn test_outpoint_hex_round_trip() {
        let hex_hash = "aa".repeat(31) + "bb";
        let outpoint = OutPoint::from_hex(&hex_hash, 0).unwrap();
        assert_eq!(outpoint.hash_hex(), hex_hash);
        // Wire order is reversed
        assert_eq!(outpoint.hash[0], 0xbb);
    }

    #[test]
    fn test_outpoint_rejects_bad_hash() {
        assert!(OutPoint::from_hex("zz", 0).is_err());
        assert!(OutPoint::from_hex("abcd", 0).is_err());
    }

    #[test]
    fn test_serialized_size_matches_serialization() {
        let mut tx = Transaction::new();
        tx.add_input(sample_outpoint());
        tx.add_input(sample_outpoint());
        tx.add_output(500, pay_to_address_script(&[7u8; 20]));
        assert_eq!(tx.serialize().len(), tx.serialized_size());

        // Still matches once a script sig is attached
        tx.inputs[0].script_sig = vec![0u8; 107];
        assert_eq!(tx.serialize().len(), tx.serialized_size());
    }

    #[test]
    fn test_empty_tx_size() {
        // version(4) + in count(1) + out count(1) + locktime(4)
        assert_eq!(Transaction::new().serialized_size(), 10);
    }

    #[test]
    fn test_txid_changes_with_content() {
        let mut tx1 = Transaction::new();
        tx1.add_output(100, pay_to_address_script(&[1u8; 20]));
        let mut tx2 = Transaction::new();
        tx2.add_output(200, pay_to_address_script(&[1u8; 20]));
        assert_ne!(tx1.txid(), tx2.txid());
        assert_eq!(tx1.txid().len(), 64);
    }

    #[test]
    fn test_signature_hash_isolates_inputs() {
        let mut tx = Transaction::new();
        tx.add_input(sample_outpoint());
        tx.add_input(sample_outpoint());
        tx.add_output(100, pay_to_address_script(&[1u8; 20]));

        let script = pay_to_address_script(&[2u8; 20]);
        let h0 = tx.signature_hash(0, &script, SigHashType::All).unwrap();
        let h1 = tx.signature_hash(1, &script, SigHashType::All).unwrap();
        assert_ne!(h0, h1);

        // A signed sibling input does not change this input's hash
        let before = tx.signature_hash(0, &script, SigHashType::All).unwrap();
        tx.inputs[1].script_sig = vec![0xAB; 40];
        let after = tx.signature_hash(0, &script, SigHashType::All).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_signature_hash_index_out_of_range() {
        let tx = Transaction::new();
        assert!(tx.signature_hash(0, &[], SigHashType::All).is_err());
    }

    #[test]
    fn test_varint_boundaries() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 0xFC);
        assert_eq!(buf, vec![0xFC]);
        buf.clear();
        put_varint(&mut buf, 0xFD);
        assert_eq!(buf, vec![0xFD, 0xFD, 0x00]);
        assert_eq!(varint_size(0xFC), 1);
        assert_eq!(varint_size(0xFFFF), 3);
        assert_eq!(varint_size(0x1_0000), 5);
    }
}
