//! Sweeper CLI application
//!
//! Imports a standalone private key and sweeps everything it controls
//! into a destination address.

use clap::{Parser, Subcommand, ValueEnum};
use key_sweeper::cli;
use key_sweeper::sweep::{ProviderConfig, ProviderFormat, SweepConfig};

#[derive(Parser)]
#[command(name = "sweeper")]
#[command(version = "0.1.0")]
#[command(about = "Sweep funds from a standalone private key", long_about = None)]
struct Cli {
    /// Provider URL template with an {address} placeholder (repeatable)
    #[arg(long = "provider")]
    providers: Vec<String>,

    /// JSON schema the configured providers speak
    #[arg(long, value_enum, default_value_t = FormatArg::Blockr)]
    provider_format: FormatArg,

    /// Reference fee per serialized kilobyte, in smallest units
    #[arg(long)]
    fee_per_kb: Option<u64>,

    /// Version byte for addresses on this network
    #[arg(long, default_value = "0")]
    address_version: u8,

    /// Version byte for WIF private keys on this network
    #[arg(long, default_value = "128")]
    wif_version: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Blockr,
    Abe,
}

impl From<FormatArg> for ProviderFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Blockr => ProviderFormat::Blockr,
            FormatArg::Abe => ProviderFormat::Abe,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the confirmed and unconfirmed balance of an address
    Balance {
        /// Address to query
        #[arg(short, long)]
        address: String,
    },

    /// Sweep all funds from a private key into a destination address
    Sweep {
        /// Private key, hex or WIF encoded
        #[arg(short, long)]
        key: String,

        /// Destination address receiving the swept funds
        #[arg(short, long)]
        to: String,
    },
}

impl Cli {
    fn sweep_config(&self) -> SweepConfig {
        let mut config = SweepConfig::default();
        if !self.providers.is_empty() {
            config.providers = self
                .providers
                .iter()
                .map(|url| ProviderConfig::new(url.clone(), self.provider_format.into()))
                .collect();
        }
        if let Some(fee_per_kb) = self.fee_per_kb {
            config.fee_per_kb = fee_per_kb;
        }
        config.address_version = self.address_version;
        config.wif_version = self.wif_version;
        config
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.sweep_config();

    let result = match &cli.command {
        Commands::Balance { address } => cli::balance(&config, address).await,
        Commands::Sweep { key, to } => cli::sweep(&config, key, to).await,
    };

    if let Err(error) = result {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}
