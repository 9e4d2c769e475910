//! Broadcast confidence tracking
//!
//! Consumes the confidence-change stream for the one pending transaction
//! of a session and feeds each event into the state machine. Also emits a
//! one-shot cue the first time the transaction is seen by more than zero
//! peers, for the collaborator UI to play its sound effect on.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::sweep::service::{ChangeReason, ConfidenceKind, ConfidenceSubscription};
use crate::sweep::session::SweepSession;

/// Fired once, the first time the pending transaction is seen by peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSeenCue {
    pub peer_count: u32,
}

/// Observes confidence events for one pending transaction
pub struct BroadcastTracker {
    subscription: ConfidenceSubscription,
    cue_tx: Option<mpsc::UnboundedSender<PeerSeenCue>>,
    cue_fired: bool,
}

impl BroadcastTracker {
    pub fn new(subscription: ConfidenceSubscription) -> Self {
        Self {
            subscription,
            cue_tx: None,
            cue_fired: false,
        }
    }

    /// Attach a one-shot peer-seen cue channel
    pub fn with_cue(mut self, cue_tx: mpsc::UnboundedSender<PeerSeenCue>) -> Self {
        self.cue_tx = Some(cue_tx);
        self
    }

    /// Drive events into the session until it reaches a terminal state,
    /// the stream ends, or the session is torn down
    pub async fn run(mut self, session: Arc<RwLock<SweepSession>>) {
        while let Some(event) = self.subscription.recv().await {
            let mut guard = session.write().await;
            if !guard.is_live() {
                log::debug!("discarding confidence event for disposed session");
                break;
            }

            guard.apply_confidence(&event);

            if !self.cue_fired
                && event.reason == ChangeReason::SeenPeers
                && event.kind == ConfidenceKind::Pending
                && event.peer_count > 0
            {
                self.cue_fired = true;
                if let Some(cue_tx) = &self.cue_tx {
                    let _ = cue_tx.send(PeerSeenCue {
                        peer_count: event.peer_count,
                    });
                }
            }

            if guard.state().is_terminal() {
                break;
            }
        }
        self.subscription.detach();
    }
}
