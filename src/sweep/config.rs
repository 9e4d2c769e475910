//! Sweep configuration
//!
//! Provider endpoints and network parameters are explicit configuration
//! handed to the fetcher and engine at construction; nothing here lives in
//! globals or statics.

use std::time::Duration;

/// Network-wide reference fee per serialized kilobyte, in smallest units
pub const REFERENCE_FEE_PER_KB: u64 = 100_000;

/// Outputs with at least this many confirmations count as confirmed
pub const CONFIRMATION_THRESHOLD: u32 = 3;

/// Connect and read timeout for provider queries
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// The JSON schema a provider speaks; selects the response parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFormat {
    /// `{"status": "success", "data": {"unspent": [{"tx", "n", "script",
    /// "amount", "confirmations"}]}}` with decimal-string amounts
    Blockr,
    /// `{"success": 1, "unspent_outputs": [{"tx_hash", "tx_output_n",
    /// "script", "value", "confirmations"}]}` with smallest-unit values
    Abe,
}

/// One unspent-output provider endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// URL template with an `{address}` placeholder
    pub url_template: String,
    pub format: ProviderFormat,
}

impl ProviderConfig {
    pub fn new(url_template: impl Into<String>, format: ProviderFormat) -> Self {
        Self {
            url_template: url_template.into(),
            format,
        }
    }

    /// Substitute the address into the URL template
    pub fn url_for(&self, address: &str) -> String {
        self.url_template.replace("{address}", address)
    }
}

/// Configuration for one sweep pipeline
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Ordered provider list; the order is re-shuffled per fetch call
    pub providers: Vec<ProviderConfig>,
    /// Reference fee per kilobyte used by the fee estimator
    pub fee_per_kb: u64,
    /// Confirmation count at which an output counts as confirmed
    pub confirmation_threshold: u32,
    /// Version byte for base58check addresses on this network
    pub address_version: u8,
    /// Version byte for WIF private keys on this network
    pub wif_version: u8,
    /// Connect and read timeout for provider queries
    pub http_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig::new(
                    "https://blockr.example.net/api/v1/address/unspent/{address}",
                    ProviderFormat::Blockr,
                ),
                ProviderConfig::new(
                    "https://abe.example.net/unspent/{address}",
                    ProviderFormat::Abe,
                ),
            ],
            fee_per_kb: REFERENCE_FEE_PER_KB,
            confirmation_threshold: CONFIRMATION_THRESHOLD,
            address_version: 0x00,
            wif_version: 0x80,
            http_timeout: HTTP_TIMEOUT,
        }
    }
}
