//! Key-Sweeper: sweep funds from a standalone private key
//!
//! This crate implements the sweep pipeline for importing a private key
//! (for example from a paper wallet) and moving everything it controls
//! into the user's own wallet in one consolidating transaction:
//! - Unspent-output discovery from remote providers with fallback
//! - Minimum-fee estimation from the unsigned serialized size
//! - Transaction assembly (one fee-adjusted output, no change)
//! - Per-input signing for pay-to-address and pay-to-pubkey outputs
//! - A sweep state machine driven from user intent through broadcast to
//!   confirmation or failure
//!
//! The UI, the wallet's broadcast/peer infrastructure, and exchange-rate
//! retrieval are external collaborators behind traits.
//!
//! # Example
//!
//! ```rust,no_run
//! use key_sweeper::crypto::KeyPair;
//! use key_sweeper::sweep::{SweepConfig, TransactionBuilder, UnspentOutputRecord};
//!
//! let config = SweepConfig::default();
//! let key = KeyPair::generate();
//! let outputs: Vec<UnspentOutputRecord> = vec![/* discovered via the fetcher */];
//! let builder = TransactionBuilder::new(config.fee_per_kb, config.address_version);
//! let destination = key.address(config.address_version);
//! let built = builder.build(&outputs, &destination, 500_000_000, &key);
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod sweep;

// Re-export commonly used types
pub use crate::core::{ScriptKind, SigHashType, Transaction};
pub use crate::crypto::KeyPair;
pub use crate::sweep::{
    BroadcastService, FeeEstimator, SweepConfig, SweepEngine, SweepSession, SweepState,
    TransactionBuilder, UnspentOutputFetcher, UnspentOutputRecord,
};
