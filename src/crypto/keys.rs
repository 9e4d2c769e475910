//! ECDSA key management
//!
//! Wraps secp256k1 key handling for an imported sweep key: hex and WIF
//! import, public key hashing, base58check addresses and the DER
//! signatures attached to transaction inputs.

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::hash::hash160;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
///
/// The sweep key is supplied already constructed (hex or WIF import from a
/// paper wallet); this type never persists anything.
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    /// Whether the public key serializes in compressed form.
    /// WIF import carries this flag; hex import defaults to compressed.
    pub compressed: bool,
}

impl KeyPair {
    /// Generate a new random key pair (used in tests and examples)
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::rngs::OsRng);
        Self {
            secret_key,
            public_key,
            compressed: true,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey, compressed: bool) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
            compressed,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key, true))
    }

    /// Create a key pair from a WIF-encoded private key (paper wallets)
    ///
    /// Layout: version byte, 32 key bytes, optional 0x01 compression flag,
    /// 4 checksum bytes.
    pub fn from_wif(wif: &str, version: u8) -> Result<Self, KeyError> {
        let payload = base58check_decode(wif).map_err(|_| KeyError::InvalidPrivateKey)?;
        if payload.is_empty() || payload[0] != version {
            return Err(KeyError::InvalidPrivateKey);
        }
        let (key_bytes, compressed) = match payload.len() {
            33 => (&payload[1..33], false),
            34 if payload[33] == 0x01 => (&payload[1..33], true),
            _ => return Err(KeyError::InvalidPrivateKey),
        };
        let secret_key = SecretKey::from_slice(key_bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key, compressed))
    }

    /// Parse a key from either hex or WIF encoding
    pub fn from_text(text: &str, wif_version: u8) -> Result<Self, KeyError> {
        Self::from_private_key_hex(text).or_else(|_| Self::from_wif(text, wif_version))
    }

    /// Serialized public key (33 bytes compressed or 65 bytes uncompressed)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.public_key.serialize().to_vec()
        } else {
            self.public_key.serialize_uncompressed().to_vec()
        }
    }

    /// hash160 of the serialized public key
    pub fn public_key_hash(&self) -> [u8; 20] {
        hash160(&self.public_key_bytes())
    }

    /// Base58check address for the given network version byte
    pub fn address(&self, version: u8) -> String {
        pubkey_hash_to_address(&self.public_key_hash(), version)
    }

    /// Sign a 32-byte hash, returning a DER-encoded ECDSA signature
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(hash)?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_der().to_vec())
    }

    /// Verify a DER-encoded signature over a 32-byte hash
    pub fn verify_hash(&self, hash: &[u8; 32], der_signature: &[u8]) -> Result<bool, KeyError> {
        verify_signature(&self.public_key, hash, der_signature)
    }
}

/// Verify a DER-encoded signature against a public key
pub fn verify_signature(
    public_key: &PublicKey,
    hash: &[u8; 32],
    der_signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(hash)?;
    let sig = secp256k1::ecdsa::Signature::from_der(der_signature)
        .map_err(|_| KeyError::InvalidSignature)?;
    Ok(secp.verify_ecdsa(&message, &sig, public_key).is_ok())
}

/// Encode a 20-byte public key hash as a base58check address
pub fn pubkey_hash_to_address(hash: &[u8; 20], version: u8) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(version);
    payload.extend_from_slice(hash);
    let checksum = base58_checksum(&payload);
    payload.extend_from_slice(&checksum);
    bs58::encode(payload).into_string()
}

/// Decode a base58check address into its 20-byte public key hash,
/// validating the checksum and version byte
pub fn address_to_pubkey_hash(address: &str, version: u8) -> Result<[u8; 20], KeyError> {
    let payload = base58check_decode(address)
        .map_err(|_| KeyError::InvalidAddress(address.to_string()))?;
    if payload.len() != 21 || payload[0] != version {
        return Err(KeyError::InvalidAddress(address.to_string()));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}

/// First 4 bytes of double SHA-256, used as the base58check checksum
fn base58_checksum(payload: &[u8]) -> [u8; 4] {
    let first = {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.finalize()
    };
    let second = {
        let mut hasher = Sha256::new();
        hasher.update(first);
        hasher.finalize()
    };
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&second[..4]);
    checksum
}

/// Decode base58check data, validating the trailing checksum
fn base58check_decode(text: &str) -> Result<Vec<u8>, KeyError> {
    let decoded = bs58::decode(text)
        .into_vec()
        .map_err(|_| KeyError::InvalidAddress(text.to_string()))?;
    if decoded.len() < 5 {
        return Err(KeyError::InvalidAddress(text.to_string()));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    if base58_checksum(payload) != checksum {
        return Err(KeyError::InvalidAddress(text.to_string()));
    }
    Ok(payload.to_vec())
}
