//! Preview and verify a spreadsheet in one go.
//!
//! Usage: cargo run --example verify_file -- <file> <column>...
//!
//! Set `ADRESSE_CHECK_GEOCODER_URL` to point at a local BAN instance and
//! `RUST_LOG=adresse_check=debug` to see lookups.

use adresse_check::{AddressVerifier, Error};
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing() {
    let subscriber = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: verify_file <file> <column>...");
        std::process::exit(2);
    };
    let columns: Vec<String> = args.collect();

    let verifier = AddressVerifier::new()?;

    let preview = verifier.preview(&path).await?;
    println!("{} rows, columns: {}", preview.total_rows, preview.columns.join(", "));
    for row in preview.preview.iter().take(5) {
        println!("  {}", serde_json::Value::Object(row.clone()));
    }
    println!();

    if columns.is_empty() {
        println!("No columns selected; pick some of the columns above.");
        return Ok(());
    }

    let summary = verifier.verify(&path, &columns).await?;
    println!(
        "Checked {}: {} valid, {} invalid",
        summary.checked, summary.valid, summary.invalid
    );
    for sample in &summary.invalid_samples {
        println!("  invalid: {}", serde_json::Value::Object(sample.clone()));
    }

    if let Some(stats) = verifier.lookup_stats() {
        println!(
            "\n{} lookups, {} unavailable ({:.1}%), {:?} average latency",
            stats.requests,
            stats.unavailable,
            stats.unavailable_ratio() * 100.0,
            stats.average_latency
        );
    }

    Ok(())
}
