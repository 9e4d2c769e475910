//! Sweep orchestration
//!
//! Drives one session through fetch → build → sign → broadcast → track.
//! Each step is a single-shot operation gated by the state machine: the
//! fetch must fully complete before build/sign begins, signing completes
//! before broadcast, and broadcast begins before confidence tracking.
//! Signing is offloaded to a blocking task so it never stalls the
//! interactive thread.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::core::script::SigHashType;
use crate::core::transaction::Transaction;
use crate::sweep::builder::{BuildError, TransactionBuilder};
use crate::sweep::config::SweepConfig;
use crate::sweep::fetcher::{FetchError, HttpTransport, ProviderTransport, UnspentOutputFetcher};
use crate::sweep::service::BroadcastService;
use crate::sweep::session::{FailureCause, SessionError, SweepSession, SweepState};
use crate::sweep::signer::sign_transaction_inputs;
use crate::sweep::tracker::{BroadcastTracker, PeerSeenCue};

/// Orchestrates one sweep attempt end to end
pub struct SweepEngine<B, T = HttpTransport> {
    config: SweepConfig,
    fetcher: UnspentOutputFetcher<T>,
    broadcast: Arc<B>,
    cue_tx: Option<mpsc::UnboundedSender<PeerSeenCue>>,
}

impl<B: BroadcastService + 'static> SweepEngine<B, HttpTransport> {
    pub fn new(config: SweepConfig, broadcast: Arc<B>) -> Result<Self, FetchError> {
        let fetcher = UnspentOutputFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, fetcher, broadcast))
    }
}

impl<B, T> SweepEngine<B, T>
where
    B: BroadcastService + 'static,
    T: ProviderTransport,
{
    /// Construct with a prepared fetcher (tests, custom transports)
    pub fn with_fetcher(
        config: SweepConfig,
        fetcher: UnspentOutputFetcher<T>,
        broadcast: Arc<B>,
    ) -> Self {
        Self {
            config,
            fetcher,
            broadcast,
            cue_tx: None,
        }
    }

    /// Attach the one-shot peer-seen cue channel handed to the tracker
    pub fn with_cue(mut self, cue_tx: mpsc::UnboundedSender<PeerSeenCue>) -> Self {
        self.cue_tx = Some(cue_tx);
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Create a session for an imported key
    pub fn new_session(&self, key: crate::crypto::KeyPair) -> Arc<RwLock<SweepSession>> {
        Arc::new(RwLock::new(SweepSession::new(
            key,
            self.config.confirmation_threshold,
        )))
    }

    /// Fetch step: discover outputs and feed the result into the machine
    ///
    /// Legal only while the session is in `Input`, which also guarantees
    /// no second fetch can run concurrently for the same session.
    pub async fn fetch_step(
        &self,
        session: &Arc<RwLock<SweepSession>>,
    ) -> Result<(), SessionError> {
        let address = {
            let guard = session.read().await;
            if !guard.is_live() {
                return Err(SessionError::NotLive);
            }
            if guard.state() != SweepState::Input {
                return Err(SessionError::IllegalTransition(guard.state()));
            }
            guard.source_address(self.config.address_version)
        };

        let result = self.fetcher.fetch(&address).await;
        session.write().await.apply_fetch_result(result)
    }

    /// Preparation step: build, sign, broadcast, and start tracking
    ///
    /// Returns the tracker task handle once the transaction is sending.
    /// If the session was torn down while signing ran, the signed
    /// transaction is discarded and no broadcast happens.
    pub async fn prepare_and_send(
        &self,
        session: &Arc<RwLock<SweepSession>>,
        destination: &str,
    ) -> Result<Option<JoinHandle<()>>, SessionError> {
        let (outputs, balance, key) = {
            let mut guard = session.write().await;
            guard.begin_preparation()?;
            (
                guard.discovered_outputs.clone(),
                guard.confirmed_balance,
                guard.key.clone(),
            )
        };

        // Build and sign off the interactive thread; both are CPU-bound
        let builder =
            TransactionBuilder::new(self.config.fee_per_kb, self.config.address_version);
        let destination = destination.to_string();
        let signing = tokio::task::spawn_blocking(move || -> Result<Transaction, FailureCause> {
            let built = builder
                .build(&outputs, &destination, balance, &key)
                .map_err(build_failure)?;
            let mut tx = built.transaction;
            sign_transaction_inputs(&mut tx, SigHashType::All, &key, &built.input_scripts)
                .map_err(FailureCause::Sign)?;
            log::debug!("signed sweep transaction {} (fee {})", tx.txid(), built.fee);
            Ok(tx)
        });

        let signed = match signing.await {
            Ok(result) => result,
            Err(join_error) => {
                log::error!("signing task panicked: {}", join_error);
                Err(FailureCause::Sign(
                    crate::sweep::signer::SignError::InvalidTransaction("signing task failed"),
                ))
            }
        };

        let mut guard = session.write().await;
        if !guard.is_live() {
            log::debug!("discarding signed transaction for disposed session");
            return Err(SessionError::NotLive);
        }

        let tx = match signed {
            Ok(tx) => tx,
            Err(cause) => {
                guard.fail(cause);
                return Ok(None);
            }
        };

        // Broadcast first, then track: confidence events must have a
        // pending transaction to apply to
        self.broadcast.broadcast(&tx);
        let txid = tx.txid();
        guard.mark_sending(tx)?;
        drop(guard);

        let subscription = self.broadcast.subscribe(&txid);
        let mut tracker = BroadcastTracker::new(subscription);
        if let Some(cue_tx) = &self.cue_tx {
            tracker = tracker.with_cue(cue_tx.clone());
        }
        Ok(Some(tokio::spawn(tracker.run(session.clone()))))
    }

    /// Run a whole sweep attempt and return the terminal state
    pub async fn run(
        &self,
        session: &Arc<RwLock<SweepSession>>,
        destination: &str,
    ) -> Result<SweepState, SessionError> {
        self.fetch_step(session).await?;
        if session.read().await.state() != SweepState::Input {
            return Ok(session.read().await.state());
        }

        if let Some(tracker) = self.prepare_and_send(session, destination).await? {
            let _ = tracker.await;
        }
        Ok(session.read().await.state())
    }

    /// Tear the session down and discard any in-flight work's results
    pub async fn teardown(&self, session: &Arc<RwLock<SweepSession>>) {
        session.write().await.teardown();
    }
}

/// Insufficient funds keeps its own cause; everything else stays a build
/// failure
fn build_failure(error: BuildError) -> FailureCause {
    match error {
        BuildError::InsufficientFunds { balance, fee } => {
            FailureCause::InsufficientFunds { balance, fee }
        }
        other => FailureCause::Build(other),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::pay_to_address_script;
    use crate::crypto::KeyPair;
    use crate::sweep::config::{ProviderConfig, ProviderFormat};
    use crate::sweep::service::{
        ChangeReason, ConfidenceEvent, ConfidenceKind, ConfidenceSubscription,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Broadcast service that records broadcasts and replays scripted
    /// confidence events
    struct FakeBroadcast {
        broadcasts: Mutex<Vec<String>>,
        events: Mutex<Vec<ConfidenceEvent>>,
    }

    impl FakeBroadcast {
        fn new(events: Vec<ConfidenceEvent>) -> Self {
            Self {
                broadcasts: Mutex::new(Vec::new()),
                events: Mutex::new(events),
            }
        }
    }

    impl BroadcastService for FakeBroadcast {
        fn broadcast(&self, tx: &Transaction) {
            self.broadcasts.lock().unwrap().push(tx.txid());
        }

        fn subscribe(&self, _txid: &str) -> ConfidenceSubscription {
            let (sender, subscription) = ConfidenceSubscription::channel();
            let events = std::mem::take(&mut *self.events.lock().unwrap());
            tokio::spawn(async move {
                for event in events {
                    if sender.send(event).await.is_err() {
                        break;
                    }
                }
            });
            subscription
        }
    }

    struct QueueTransport {
        responses: Mutex<VecDeque<Result<String, FetchError>>>,
    }

    impl QueueTransport {
        fn new(responses: Vec<Result<String, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl ProviderTransport for Arc<QueueTransport> {
        async fn get(&self, _url: &str) -> Result<String, FetchError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Transport("exhausted".to_string())))
        }
    }

    fn abe_body(key: &KeyPair, value: u64, confirmations: u32) -> String {
        let script = pay_to_address_script(&key.public_key_hash());
        format!(
            r#"{{"success":1,"unspent_outputs":[
                {{"tx_hash":"{}","tx_output_n":0,"script":"{}","value":"{}","confirmations":{}}}
            ]}}"#,
            "ab".repeat(32),
            hex::encode(script),
            value,
            confirmations
        )
    }

    fn engine_with(
        responses: Vec<Result<String, FetchError>>,
        events: Vec<ConfidenceEvent>,
    ) -> SweepEngine<FakeBroadcast, Arc<QueueTransport>> {
        let config = SweepConfig::default();
        let providers = vec![ProviderConfig::new(
            "https://p.test/{address}",
            ProviderFormat::Abe,
        )];
        let fetcher = UnspentOutputFetcher::with_transport(
            providers,
            Arc::new(QueueTransport::new(responses)),
        );
        SweepEngine::with_fetcher(config, fetcher, Arc::new(FakeBroadcast::new(events)))
    }

    fn accepted() -> Vec<ConfidenceEvent> {
        vec![
            ConfidenceEvent {
                reason: ChangeReason::SeenPeers,
                kind: ConfidenceKind::Pending,
                peer_count: 1,
            },
            ConfidenceEvent {
                reason: ChangeReason::SeenPeers,
                kind: ConfidenceKind::Pending,
                peer_count: 2,
            },
        ]
    }

    #[tokio::test]
    async fn test_full_sweep_reaches_sent() {
        let key = KeyPair::generate();
        let destination = KeyPair::generate().address(0x00);
        let engine = engine_with(
            vec![Ok(abe_body(&key, 500_000_000, 10))],
            accepted(),
        );
        let session = engine.new_session(key);

        let state = engine.run(&session, &destination).await.unwrap();
        assert_eq!(state, SweepState::Sent);

        let guard = session.read().await;
        let tx = guard.pending_transaction.as_ref().unwrap();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 499_900_000);
        assert_eq!(
            engine.broadcast.broadcasts.lock().unwrap().as_slice(),
            &[tx.txid()]
        );
    }

    #[tokio::test]
    async fn test_both_providers_failing_reaches_failed() {
        let key = KeyPair::generate();
        let destination = KeyPair::generate().address(0x00);
        let engine = engine_with(
            vec![
                Err(FetchError::ProviderReportedFailure),
                Err(FetchError::ProviderReportedFailure),
            ],
            vec![],
        );
        let session = engine.new_session(key);

        let state = engine.run(&session, &destination).await.unwrap();
        assert_eq!(state, SweepState::Failed);
        assert!(matches!(
            session.read().await.failure(),
            Some(FailureCause::Fetch(_))
        ));
        assert!(engine.broadcast.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_outputs_reaches_nothing_to_do() {
        let key = KeyPair::generate();
        let destination = KeyPair::generate().address(0x00);
        let engine = engine_with(
            vec![Ok(r#"{"success":1,"unspent_outputs":[]}"#.to_string())],
            vec![],
        );
        let session = engine.new_session(key);

        let state = engine.run(&session, &destination).await.unwrap();
        assert_eq!(state, SweepState::NothingToDo);
    }

    #[tokio::test]
    async fn test_unconfirmed_outputs_never_prepare() {
        let key = KeyPair::generate();
        let destination = KeyPair::generate().address(0x00);
        let engine = engine_with(vec![Ok(abe_body(&key, 500_000_000, 1))], vec![]);
        let session = engine.new_session(key);

        let state = engine.run(&session, &destination).await.unwrap();
        assert_eq!(state, SweepState::Failed);
        assert!(matches!(
            session.read().await.failure(),
            Some(FailureCause::UnconfirmedFunds { .. })
        ));
        assert!(engine.broadcast.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balance_below_fee_fails_without_broadcast() {
        let key = KeyPair::generate();
        let destination = KeyPair::generate().address(0x00);
        let engine = engine_with(vec![Ok(abe_body(&key, 50_000, 10))], vec![]);
        let session = engine.new_session(key);

        let state = engine.run(&session, &destination).await.unwrap();
        assert_eq!(state, SweepState::Failed);
        assert!(matches!(
            session.read().await.failure(),
            Some(FailureCause::InsufficientFunds { .. })
        ));
        assert!(engine.broadcast.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_fetch_rejected_after_terminal_state() {
        let key = KeyPair::generate();
        let engine = engine_with(
            vec![Ok(r#"{"success":1,"unspent_outputs":[]}"#.to_string())],
            vec![],
        );
        let session = engine.new_session(key);

        engine.fetch_step(&session).await.unwrap();
        assert_eq!(session.read().await.state(), SweepState::NothingToDo);
        assert!(engine.fetch_step(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_teardown_blocks_further_steps() {
        let key = KeyPair::generate();
        let engine = engine_with(vec![Ok(abe_body(&key, 500_000_000, 10))], vec![]);
        let session = engine.new_session(key);

        engine.teardown(&session).await;
        assert!(matches!(
            engine.fetch_step(&session).await,
            Err(SessionError::NotLive)
        ));
    }
}
