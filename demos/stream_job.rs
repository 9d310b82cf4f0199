//! Run a streaming job, print its wire events, then export the results.
//!
//! Usage: cargo run --example stream_job -- <file> <column>...

use adresse_check::dispatch::{self, Payload};
use adresse_check::{AddressVerifier, Error};
use futures::StreamExt;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let subscriber = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: stream_job <file> <column>...");
        std::process::exit(2);
    };
    let columns: Vec<String> = args.collect();

    let verifier = AddressVerifier::new()?;
    let payload = Payload::from_value(json!({ "file_path": path, "columns": columns }))?;

    let mut events = dispatch::stream(&verifier, &payload).await?;
    let mut job_id = None;
    while let Some(event) = events.next().await {
        println!("{event}");
        if event["type"] == "started" {
            job_id = event["job_id"].as_str().map(str::to_string);
        }
    }

    let Some(job_id) = job_id else {
        return Ok(());
    };

    let download = Payload {
        job_id: Some(job_id),
        ..Payload::default()
    };
    let export = dispatch::download(&verifier, &download, "csv").await?;
    println!("\n{} written to {}", export.filename, export.path.display());

    Ok(())
}
