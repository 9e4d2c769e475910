//! CLI commands
//!
//! Command handlers for the sweeper CLI. The CLI drives the pipeline up to
//! a signed transaction; actual broadcast and confidence tracking belong
//! to the wallet's peer infrastructure, so the signed transaction is
//! printed as hex for submission.

use crate::core::script::SigHashType;
use crate::crypto::KeyPair;
use crate::sweep::record::COIN;
use crate::sweep::signer::sign_transaction_inputs;
use crate::sweep::{SweepConfig, SweepSession, SweepState, TransactionBuilder, UnspentOutputFetcher};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Render a smallest-unit amount as a decimal coin amount
fn format_coins(value: u64) -> String {
    format!("{}.{:08}", value / COIN, value % COIN)
}

/// Show the confirmed and unconfirmed balance of an address
pub async fn balance(config: &SweepConfig, address: &str) -> CliResult<()> {
    let fetcher = UnspentOutputFetcher::new(config)?;
    let records = fetcher.fetch(address).await?;

    if records.is_empty() {
        println!("No unspent outputs, nothing to sweep.");
        return Ok(());
    }

    let mut confirmed = 0u64;
    let mut unconfirmed = 0u64;
    for record in &records {
        let bucket = if record.confirmation_count >= config.confirmation_threshold {
            &mut confirmed
        } else {
            &mut unconfirmed
        };
        *bucket = bucket
            .checked_add(record.value)
            .ok_or("provider returned overflowing output values")?;
    }

    println!("Outputs:     {}", records.len());
    println!("Confirmed:   {}", format_coins(confirmed));
    println!("Unconfirmed: {}", format_coins(unconfirmed));
    Ok(())
}

/// Sweep a key: fetch, build and sign, then print the raw transaction
pub async fn sweep(config: &SweepConfig, key_text: &str, destination: &str) -> CliResult<()> {
    let key = KeyPair::from_text(key_text, config.wif_version)?;
    let address = key.address(config.address_version);
    println!("Sweeping from {}", address);

    let fetcher = UnspentOutputFetcher::new(config)?;
    let mut session = SweepSession::new(key, config.confirmation_threshold);
    let result = fetcher.fetch(&address).await;
    session.apply_fetch_result(result)?;

    match session.state() {
        SweepState::NothingToDo => {
            println!("No unspent outputs, nothing to sweep.");
            return Ok(());
        }
        SweepState::Failed => {
            let cause = session.failure().map(|c| c.to_string()).unwrap_or_default();
            return Err(cause.into());
        }
        _ => {}
    }

    session.begin_preparation()?;
    println!("Balance:     {}", format_coins(session.confirmed_balance));

    let builder = TransactionBuilder::new(config.fee_per_kb, config.address_version);
    let built = builder.build(
        &session.discovered_outputs,
        destination,
        session.confirmed_balance,
        &session.key,
    )?;
    let mut tx = built.transaction;
    sign_transaction_inputs(&mut tx, SigHashType::All, &session.key, &built.input_scripts)?;

    println!("Fee:         {}", format_coins(built.fee));
    println!("Sweeping:    {} -> {}", format_coins(tx.outputs[0].value), destination);
    println!("Txid:        {}", tx.txid());
    println!();
    println!("{}", hex::encode(tx.serialize()));
    println!();
    println!("Submit the raw transaction above through your wallet's broadcast service.");
    Ok(())
}
