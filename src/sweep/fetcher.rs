//! Unspent output discovery
//!
//! Queries remote providers for the outputs controlled by an address and
//! normalizes their differing JSON schemas into `UnspentOutputRecord`s.
//! The provider order is shuffled per call; on failure the fetch retries
//! exactly once against the next provider in the shuffled order, then
//! stops. Providers are untrusted: their status fields are validated and
//! malformed records are excluded before anything downstream sees them.

use std::future::Future;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;

use crate::sweep::config::{ProviderConfig, ProviderFormat, SweepConfig};
use crate::sweep::record::{parse_coin_amount, UnspentOutputRecord};

// =============================================================================
// Error Types
// =============================================================================

/// Errors from unspent-output discovery
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Provider timed out")]
    Timeout,
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Provider reported failure")]
    ProviderReportedFailure,
}

// =============================================================================
// Transport
// =============================================================================

/// Performs the HTTP GET for one provider query
///
/// Abstracted so tests can inject canned bodies without a network.
pub trait ProviderTransport: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Production transport backed by reqwest, with explicit connect and
/// read timeouts
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl ProviderTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("http status {}", status)));
        }
        response.text().await.map_err(map_reqwest_error)
    }
}

/// An exceeded timeout is treated identically to any other provider failure
fn map_reqwest_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(error.to_string())
    }
}

// =============================================================================
// Response Parsers
// =============================================================================

/// A response parser for one provider schema, selected by configuration
trait ResponseParser {
    fn parse(&self, body: &str) -> Result<Vec<UnspentOutputRecord>, FetchError>;
}

impl ProviderFormat {
    fn parser(&self) -> &'static dyn ResponseParser {
        match self {
            ProviderFormat::Blockr => &BlockrParser,
            ProviderFormat::Abe => &AbeParser,
        }
    }
}

/// blockr-shaped schema: `status`/`data.unspent`, decimal-string amounts
struct BlockrParser;

#[derive(Deserialize)]
struct BlockrReply {
    status: String,
    data: BlockrData,
}

#[derive(Deserialize)]
struct BlockrData {
    unspent: Vec<BlockrOutput>,
}

#[derive(Deserialize)]
struct BlockrOutput {
    tx: String,
    n: u32,
    script: String,
    /// Decimal coin amount; arrives as a string or bare JSON number.
    /// Bare numbers keep their exact source text (arbitrary precision),
    /// and both forms are parsed with 8-decimal fixed point, never
    /// through a float.
    amount: serde_json::Value,
    confirmations: u32,
}

impl ResponseParser for BlockrParser {
    fn parse(&self, body: &str) -> Result<Vec<UnspentOutputRecord>, FetchError> {
        let reply: BlockrReply =
            serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        if reply.status != "success" {
            return Err(FetchError::ProviderReportedFailure);
        }

        reply
            .data
            .unspent
            .into_iter()
            .map(|out| {
                let amount_text = match &out.amount {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    other => {
                        return Err(FetchError::MalformedResponse(format!(
                            "unexpected amount: {}",
                            other
                        )))
                    }
                };
                let value = parse_coin_amount(&amount_text).ok_or_else(|| {
                    FetchError::MalformedResponse(format!("bad amount: {}", amount_text))
                })?;
                Ok(UnspentOutputRecord {
                    transaction_hash: out.tx,
                    output_index: out.n,
                    locking_script: out.script,
                    value,
                    confirmation_count: out.confirmations,
                })
            })
            .collect()
    }
}

/// abe-shaped schema: `success: 1`, `unspent_outputs`, smallest-unit
/// integer-string values
struct AbeParser;

#[derive(Deserialize)]
struct AbeReply {
    success: i64,
    unspent_outputs: Vec<AbeOutput>,
}

#[derive(Deserialize)]
struct AbeOutput {
    tx_hash: String,
    tx_output_n: u32,
    script: String,
    /// Smallest-unit amount as a decimal integer string
    value: String,
    confirmations: u32,
}

impl ResponseParser for AbeParser {
    fn parse(&self, body: &str) -> Result<Vec<UnspentOutputRecord>, FetchError> {
        let reply: AbeReply =
            serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        if reply.success != 1 {
            return Err(FetchError::ProviderReportedFailure);
        }

        reply
            .unspent_outputs
            .into_iter()
            .map(|out| {
                let value = out.value.trim().parse::<u64>().map_err(|_| {
                    FetchError::MalformedResponse(format!("bad value: {}", out.value))
                })?;
                Ok(UnspentOutputRecord {
                    transaction_hash: out.tx_hash,
                    output_index: out.tx_output_n,
                    locking_script: out.script,
                    value,
                    confirmation_count: out.confirmations,
                })
            })
            .collect()
    }
}

// =============================================================================
// Fetcher
// =============================================================================

/// Discovers the unspent outputs controlled by an address, with one-step
/// provider fallback
pub struct UnspentOutputFetcher<T = HttpTransport> {
    providers: Vec<ProviderConfig>,
    transport: T,
}

impl UnspentOutputFetcher<HttpTransport> {
    pub fn new(config: &SweepConfig) -> Result<Self, FetchError> {
        Ok(Self {
            providers: config.providers.clone(),
            transport: HttpTransport::new(config.http_timeout)?,
        })
    }
}

impl<T: ProviderTransport> UnspentOutputFetcher<T> {
    /// Construct with a custom transport (tests, alternative clients)
    pub fn with_transport(providers: Vec<ProviderConfig>, transport: T) -> Self {
        Self {
            providers,
            transport,
        }
    }

    /// Fetch all spendable outputs for `address`
    ///
    /// `Ok(vec![])` means the provider reported success with nothing to
    /// sweep. An error means every attempted provider failed; the last
    /// error is returned.
    pub async fn fetch(&self, address: &str) -> Result<Vec<UnspentOutputRecord>, FetchError> {
        if self.providers.is_empty() {
            return Err(FetchError::Transport("no providers configured".to_string()));
        }

        // Shuffle per call to distribute load across providers
        let mut order: Vec<usize> = (0..self.providers.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        let first = &self.providers[order[0]];
        match self.fetch_from(first, address).await {
            Ok(records) => Ok(records),
            Err(error) => {
                // Retry exactly once against the next provider, then stop
                let second = match order.get(1) {
                    Some(&index) => &self.providers[index],
                    None => return Err(error),
                };
                log::debug!(
                    "failed fetching unspent outputs from {} ({}), retrying",
                    first.url_template,
                    error
                );
                self.fetch_from(second, address).await
            }
        }
    }

    async fn fetch_from(
        &self,
        provider: &ProviderConfig,
        address: &str,
    ) -> Result<Vec<UnspentOutputRecord>, FetchError> {
        let url = provider.url_for(address);
        let body = self.transport.get(&url).await?;
        let records = provider.format.parser().parse(&body)?;

        // Exclude records that cannot take part in transaction assembly
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if record.is_valid() {
                kept.push(record);
            } else {
                log::warn!(
                    "excluding unspendable output {}:{}",
                    record.transaction_hash,
                    record.output_index
                );
            }
        }
        Ok(kept)
    }
}

// =============================================================================
// Tests
// =============================================================================
