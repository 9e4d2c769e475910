//! The sweep pipeline
//!
//! Everything that turns an imported private key into a broadcast sweep
//! transaction:
//! - Unspent-output discovery with provider fallback
//! - Fee estimation from the unsigned serialized size
//! - Transaction assembly and signing
//! - The sweep state machine, broadcast tracking, and orchestration

pub mod builder;
pub mod config;
pub mod engine;
pub mod fee;
pub mod fetcher;
pub mod record;
pub mod service;
pub mod session;
pub mod signer;
pub mod tracker;

pub use builder::{BuildError, BuiltTransaction, TransactionBuilder};
pub use config::{
    ProviderConfig, ProviderFormat, SweepConfig, CONFIRMATION_THRESHOLD, HTTP_TIMEOUT,
    REFERENCE_FEE_PER_KB,
};
pub use engine::SweepEngine;
pub use fee::{signature_overhead, FeeEstimator, SIGNATURE_SCRIPT_SLACK};
pub use fetcher::{FetchError, HttpTransport, ProviderTransport, UnspentOutputFetcher};
pub use record::{parse_coin_amount, UnspentOutputRecord, COIN, COIN_DECIMALS};
pub use service::{
    fiat_value, BroadcastService, ChangeReason, ConfidenceEvent, ConfidenceKind,
    ConfidenceSubscription, ExchangeRate, RateOracle,
};
pub use session::{FailureCause, SessionError, SweepSession, SweepState};
pub use signer::{sign_transaction_inputs, SignError};
pub use tracker::{BroadcastTracker, PeerSeenCue};
