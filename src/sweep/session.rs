//! Sweep session and state machine
//!
//! A `SweepSession` owns the mutable state of one sweep attempt and
//! enforces the state machine:
//!
//! `Input → Preparation → Sending → {Sent, Failed}`, plus the absorbing
//! states `NothingToDo` (from `Input` only) and `Failed` (from `Input`,
//! `Preparation` or `Sending`). No state re-enters `Input`; a new sweep
//! requires a new session.
//!
//! Field ownership follows the machine's gating: the fetch step owns the
//! discovered outputs and balances, the sign step owns the pending
//! transaction, and the tracker owns the state while `Sending`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::transaction::Transaction;
use crate::crypto::KeyPair;
use crate::sweep::builder::BuildError;
use crate::sweep::fetcher::FetchError;
use crate::sweep::record::UnspentOutputRecord;
use crate::sweep::service::{ConfidenceEvent, ConfidenceKind};
use crate::sweep::signer::SignError;

// =============================================================================
// States and Failure Causes
// =============================================================================

/// Machine state of one sweep attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Awaiting fetch results and user confirmation
    Input,
    /// Build and sign in progress
    Preparation,
    /// Broadcast handed off; waiting for confidence events
    Sending,
    /// Terminal success
    Sent,
    /// Terminal failure; the cause is retained
    Failed,
    /// Fetch succeeded but there is nothing to sweep
    NothingToDo,
}

impl SweepState {
    /// Terminal states end the session; a restart needs a new session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SweepState::Sent | SweepState::Failed | SweepState::NothingToDo
        )
    }
}

/// Why a session failed; retained for user-facing messaging
#[derive(Error, Debug)]
pub enum FailureCause {
    #[error("Unconfirmed funds present: {amount}")]
    UnconfirmedFunds { amount: u64 },
    #[error("Could not retrieve balance: {0}")]
    Fetch(#[from] FetchError),
    #[error("Insufficient funds: balance {balance} does not cover fee {fee}")]
    InsufficientFunds { balance: u64, fee: u64 },
    #[error("Could not assemble transaction: {0}")]
    Build(BuildError),
    #[error("Signing failed: {0}")]
    Sign(#[from] SignError),
    #[error("Broadcast rejected by the network")]
    BroadcastRejected,
}

/// Errors from driving the state machine
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Illegal transition from {0:?}")]
    IllegalTransition(SweepState),
    #[error("Session is no longer live")]
    NotLive,
}

// =============================================================================
// Session
// =============================================================================

/// Mutable state of one sweep attempt
pub struct SweepSession {
    /// The imported key being swept; read-only for the session
    pub key: KeyPair,
    pub discovered_outputs: Vec<UnspentOutputRecord>,
    pub confirmed_balance: u64,
    pub unconfirmed_balance: u64,
    /// At most one in-flight transaction per session
    pub pending_transaction: Option<Transaction>,
    state: SweepState,
    failure: Option<FailureCause>,
    confirmation_threshold: u32,
    /// Cleared on teardown; results of in-flight work are then discarded
    live: bool,
    pub started_at: DateTime<Utc>,
}

impl SweepSession {
    pub fn new(key: KeyPair, confirmation_threshold: u32) -> Self {
        Self {
            key,
            discovered_outputs: Vec::new(),
            confirmed_balance: 0,
            unconfirmed_balance: 0,
            pending_transaction: None,
            state: SweepState::Input,
            failure: None,
            confirmation_threshold,
            live: true,
            started_at: Utc::now(),
        }
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn failure(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Address of the sweep key on the configured network
    pub fn source_address(&self, version: u8) -> String {
        self.key.address(version)
    }

    /// Tear the session down; in-flight work may finish but its results
    /// are discarded
    pub fn teardown(&mut self) {
        if self.live {
            log::debug!(
                "sweep session torn down in state {:?} after {}s",
                self.state,
                self.elapsed_seconds()
            );
            self.live = false;
        }
    }

    /// Age of the session, for terminal-state logging
    fn elapsed_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Feed the outcome of the fetch step into the machine
    ///
    /// Zero outputs end the session in `NothingToDo`; a fetch error or any
    /// unconfirmed balance ends it in `Failed`. Otherwise the session
    /// stays in `Input` with the balances populated.
    pub fn apply_fetch_result(
        &mut self,
        result: Result<Vec<UnspentOutputRecord>, FetchError>,
    ) -> Result<(), SessionError> {
        if !self.live {
            log::debug!("discarding fetch result for disposed session");
            return Err(SessionError::NotLive);
        }
        if self.state != SweepState::Input {
            return Err(SessionError::IllegalTransition(self.state));
        }

        match result {
            Err(error) => self.fail(FailureCause::Fetch(error)),
            Ok(records) if records.is_empty() => {
                log::info!("fetch returned no unspent outputs, nothing to sweep");
                self.state = SweepState::NothingToDo;
            }
            Ok(records) => {
                self.discovered_outputs = records;
                if let Err(error) = self.recompute_balances() {
                    self.discovered_outputs.clear();
                    self.fail(FailureCause::Fetch(error));
                    return Ok(());
                }
                log::info!(
                    "discovered {} outputs, confirmed {} unconfirmed {}",
                    self.discovered_outputs.len(),
                    self.confirmed_balance,
                    self.unconfirmed_balance
                );
                // Spending unconfirmed inputs is disallowed
                if self.unconfirmed_balance > 0 {
                    self.fail(FailureCause::UnconfirmedFunds {
                        amount: self.unconfirmed_balance,
                    });
                }
            }
        }
        Ok(())
    }

    /// Enter `Preparation`; only possible from `Input` with a positive
    /// confirmed balance and no unconfirmed balance
    pub fn begin_preparation(&mut self) -> Result<(), SessionError> {
        if !self.live {
            return Err(SessionError::NotLive);
        }
        if self.state != SweepState::Input
            || self.confirmed_balance == 0
            || self.unconfirmed_balance > 0
        {
            return Err(SessionError::IllegalTransition(self.state));
        }
        self.state = SweepState::Preparation;
        Ok(())
    }

    /// Record the signed transaction as handed to the broadcast service
    pub fn mark_sending(&mut self, tx: Transaction) -> Result<(), SessionError> {
        if !self.live {
            return Err(SessionError::NotLive);
        }
        if self.state != SweepState::Preparation {
            return Err(SessionError::IllegalTransition(self.state));
        }
        self.pending_transaction = Some(tx);
        self.state = SweepState::Sending;
        Ok(())
    }

    /// Move to `Failed`, retaining the cause for user-facing messaging
    pub fn fail(&mut self, cause: FailureCause) {
        if self.state.is_terminal() {
            log::debug!("ignoring failure in terminal state {:?}: {}", self.state, cause);
            return;
        }
        log::warn!("sweep failed after {}s: {}", self.elapsed_seconds(), cause);
        self.state = SweepState::Failed;
        self.failure = Some(cause);
    }

    /// Apply a confidence event to the machine
    ///
    /// Only meaningful while `Sending`: a dead transaction fails the
    /// session; relay by more than one peer or block inclusion completes
    /// it. Events in any other state are ignored.
    pub fn apply_confidence(&mut self, event: &ConfidenceEvent) {
        if !self.live || self.state != SweepState::Sending {
            return;
        }
        if event.kind == ConfidenceKind::Dead {
            self.fail(FailureCause::BroadcastRejected);
        } else if event.peer_count > 1 || event.kind == ConfidenceKind::Building {
            log::info!(
                "sweep transaction accepted by the network after {}s",
                self.elapsed_seconds()
            );
            self.state = SweepState::Sent;
        }
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Recompute both balances from the discovered outputs
    ///
    /// Provider values are untrusted; a sum exceeding u64 is a provider
    /// failure, not a wrap.
    fn recompute_balances(&mut self) -> Result<(), FetchError> {
        let mut confirmed: u64 = 0;
        let mut unconfirmed: u64 = 0;
        for output in &self.discovered_outputs {
            let bucket = if output.confirmation_count >= self.confirmation_threshold {
                &mut confirmed
            } else {
                &mut unconfirmed
            };
            *bucket = bucket.checked_add(output.value).ok_or_else(|| {
                FetchError::MalformedResponse("output values overflow".to_string())
            })?;
        }
        self.confirmed_balance = confirmed;
        self.unconfirmed_balance = unconfirmed;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
