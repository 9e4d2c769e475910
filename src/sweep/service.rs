//! External collaborator interfaces
//!
//! The broadcast service (the wallet's peer infrastructure) and the rate
//! oracle are external to this crate; they appear here as traits. The
//! confidence stream is an explicit subscription returning a cancellable
//! handle delivering events over a channel, never a callback mutating
//! shared state.

use tokio::sync::mpsc;

use crate::core::transaction::Transaction;
use crate::sweep::record::COIN;

// =============================================================================
// Confidence Events
// =============================================================================

/// Propagation/acceptance status of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceKind {
    /// Relayed but not yet in a block
    Pending,
    /// Included in a block
    Building,
    /// Rejected by the network
    Dead,
}

/// Why a confidence notification fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// The confidence kind changed
    Type,
    /// The transaction was seen by more peers
    SeenPeers,
}

/// One confidence-change notification for the tracked transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceEvent {
    pub reason: ChangeReason,
    pub kind: ConfidenceKind,
    /// How many peers have relayed the transaction back
    pub peer_count: u32,
}

// =============================================================================
// Subscription
// =============================================================================

/// Buffered confidence events per subscription
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Cancellable handle on a confidence-change stream
///
/// Dropping or detaching the handle ends delivery; the sending side
/// observes the closed channel and stops notifying.
pub struct ConfidenceSubscription {
    receiver: mpsc::Receiver<ConfidenceEvent>,
}

impl ConfidenceSubscription {
    /// Create a subscription, returning the sender the broadcast service
    /// delivers events through
    pub fn channel() -> (mpsc::Sender<ConfidenceEvent>, Self) {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        (sender, Self { receiver })
    }

    /// Next confidence event; `None` once the stream ends
    pub async fn recv(&mut self) -> Option<ConfidenceEvent> {
        self.receiver.recv().await
    }

    /// Explicitly detach from the stream
    pub fn detach(mut self) {
        self.receiver.close();
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// The wallet's broadcast infrastructure
pub trait BroadcastService: Send + Sync {
    /// Hand a signed transaction to the network (fire-and-forget)
    fn broadcast(&self, tx: &Transaction);

    /// Subscribe to confidence changes for the transaction with `txid`
    fn subscribe(&self, txid: &str) -> ConfidenceSubscription;
}

/// An exchange rate for fiat display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRate {
    /// Smallest fiat units per whole coin
    pub rate: u64,
    /// Where the rate came from
    pub source: String,
}

/// Exchange-rate collaborator, consumed only to render a fiat-equivalent
/// amount; the sweep never blocks on it
pub trait RateOracle: Send + Sync {
    fn current_rate(&self, currency: &str) -> Option<ExchangeRate>;
}

/// Fiat-equivalent of `value` smallest coin units at `rate`
pub fn fiat_value(value: u64, rate: &ExchangeRate) -> u64 {
    ((value as u128 * rate.rate as u128) / COIN as u128) as u64
}
