//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 / double SHA-256 / hash160 hashing
//! - ECDSA key management (secp256k1), WIF import
//! - Base58check address encoding and decoding

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, hash160, sha256, sha256_hex};
pub use keys::{
    address_to_pubkey_hash, pubkey_hash_to_address, verify_signature, KeyError, KeyPair,
};
