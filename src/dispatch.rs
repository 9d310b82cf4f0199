//! Invocation payload handling.
//!
//! Maps the three invocation modes onto [`AddressVerifier`]:
//!
//! - `run`: `{action: "preview" | "verify", file_path, columns}` → JSON result
//! - `stream`: `{file_path, columns}` → wire JSON events
//! - `download`: `{job_id}` plus a format → [`Export`]

use std::path::{Path, PathBuf};
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::export::Export;
use crate::AddressVerifier;

/// Payload of an invocation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Payload {
    /// `preview` or `verify`; only used by [`run`]
    #[serde(default)]
    pub action: Option<String>,
    /// Source file to read
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    /// Selected columns, in the order their values are combined
    #[serde(default)]
    pub columns: Vec<String>,
    /// Job to download
    #[serde(default)]
    pub job_id: Option<String>,
}

impl Payload {
    /// Decode a payload from JSON.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::invalid_request(format!("Malformed payload: {e}")))
    }

    fn file_path(&self) -> Result<&Path> {
        self.file_path
            .as_deref()
            .ok_or_else(|| Error::invalid_request("Missing file_path"))
    }

    fn job_id(&self) -> Result<&str> {
        self.job_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::invalid_request("Missing job_id"))
    }
}

/// Run a `preview` or `verify` action.
pub async fn run(verifier: &AddressVerifier, payload: &Payload) -> Result<Value> {
    let action = payload.action.as_deref().unwrap_or_default();
    tracing::debug!(action, "dispatching");

    match action {
        "preview" => {
            let preview = verifier.preview(payload.file_path()?).await?;
            Ok(serde_json::to_value(preview)?)
        }
        "verify" => {
            let summary = verifier
                .verify(payload.file_path()?, &payload.columns)
                .await?;
            Ok(serde_json::to_value(summary)?)
        }
        other => Err(Error::invalid_request(format!("Unknown action: {other}"))),
    }
}

/// Start a streaming job and yield its wire events.
pub async fn stream(
    verifier: &AddressVerifier,
    payload: &Payload,
) -> Result<Pin<Box<dyn Stream<Item = Value> + Send>>> {
    let job = verifier
        .stream(payload.file_path()?, &payload.columns)
        .await?;
    Ok(Box::pin(
        job.into_stream()
            .filter_map(|event| async move { event.to_wire() }),
    ))
}

/// Export the job named in the payload.
pub async fn download(verifier: &AddressVerifier, payload: &Payload, format: &str) -> Result<Export> {
    verifier.export(payload.job_id()?, format).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::config::VerifierConfig;
    use crate::geocoder::testing::ScriptedGeocoder;

    struct Fixture {
        _dir: tempfile::TempDir,
        source: PathBuf,
        verifier: AddressVerifier,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clients.csv");
        std::fs::write(
            &source,
            "Adresse,Code postal,Ville\n12 rue de Paris,75001,Paris\nlieu-dit Le Bourg,,\n",
        )
        .unwrap();
        let config = VerifierConfig::builder()
            .results_dir(dir.path().join("results"))
            .build();
        let geocoder = ScriptedGeocoder::new().matched(
            "12 rue de Paris 75001 Paris",
            0.93,
            true,
            "12 Rue de Paris 75001 Paris",
        );
        Fixture {
            _dir: dir,
            source,
            verifier: AddressVerifier::with_geocoder(config, Arc::new(geocoder)),
        }
    }

    fn payload(fixture: &Fixture, value: Value) -> Payload {
        let mut payload = Payload::from_value(value).unwrap();
        payload.file_path = Some(fixture.source.clone());
        payload
    }

    #[test]
    fn test_payload_decoding() {
        let payload = Payload::from_value(json!({
            "action": "verify",
            "file_path": "/data/clients.csv",
            "columns": ["Ville"]
        }))
        .unwrap();
        assert_eq!(payload.action.as_deref(), Some("verify"));
        assert_eq!(payload.columns, vec!["Ville"]);
        assert_eq!(payload.job_id, None);

        assert_matches!(
            Payload::from_value(json!({"columns": "Ville"})),
            Err(Error::InvalidRequest { .. })
        );
    }

    #[tokio::test]
    async fn test_run_preview() {
        let fixture = fixture();
        let payload = payload(&fixture, json!({"action": "preview"}));

        let result = run(&fixture.verifier, &payload).await.unwrap();

        assert_eq!(result["columns"], json!(["Adresse", "Code postal", "Ville"]));
        assert_eq!(result["total_rows"], json!(2));
        assert_eq!(result["preview"][1]["Ville"], Value::Null);
    }

    #[tokio::test]
    async fn test_run_verify() {
        let fixture = fixture();
        let payload = payload(
            &fixture,
            json!({"action": "verify", "columns": ["Adresse", "Code postal", "Ville"]}),
        );

        let result = run(&fixture.verifier, &payload).await.unwrap();

        assert_eq!(result["checked"], json!(2));
        assert_eq!(result["valid"], json!(1));
        assert_eq!(result["invalid"], json!(1));
        assert_eq!(result["invalid_samples"][0]["normalized_address"], Value::Null);
    }

    #[tokio::test]
    async fn test_run_rejects_unknown_action() {
        let fixture = fixture();

        let err = run(&fixture.verifier, &payload(&fixture, json!({"action": "purge"})))
            .await
            .unwrap_err();
        assert_matches!(err, Error::InvalidRequest { message } if message == "Unknown action: purge");

        let err = run(&fixture.verifier, &Payload::default()).await.unwrap_err();
        assert_matches!(err, Error::InvalidRequest { message } if message == "Unknown action: ");
    }

    #[tokio::test]
    async fn test_run_requires_file_path() {
        let fixture = fixture();
        let payload = Payload {
            action: Some("preview".to_string()),
            ..Payload::default()
        };
        assert_matches!(
            run(&fixture.verifier, &payload).await,
            Err(Error::InvalidRequest { message }) if message == "Missing file_path"
        );
    }

    #[tokio::test]
    async fn test_stream_then_download() {
        let fixture = fixture();
        let payload = payload(&fixture, json!({"columns": ["Adresse", "Code postal", "Ville"]}));

        let events: Vec<Value> = stream(&fixture.verifier, &payload)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[0]["type"], "started");
        assert_eq!(events[2]["current"], json!(2));
        assert_eq!(events[3]["type"], "done");
        let job_id = events[0]["job_id"].as_str().unwrap().to_string();

        let download_payload = Payload {
            job_id: Some(job_id.clone()),
            ..Payload::default()
        };
        let export = download(&fixture.verifier, &download_payload, "csv")
            .await
            .unwrap();
        assert_eq!(export.filename, format!("verified_addresses_{job_id}.csv"));
        std::fs::remove_file(&export.path).unwrap();
    }

    #[tokio::test]
    async fn test_download_requires_job_id() {
        let fixture = fixture();
        assert_matches!(
            download(&fixture.verifier, &Payload::default(), "csv").await,
            Err(Error::InvalidRequest { message }) if message == "Missing job_id"
        );

        let unknown = Payload {
            job_id: Some("deadbeef".to_string()),
            ..Payload::default()
        };
        assert_matches!(
            download(&fixture.verifier, &unknown, "csv").await,
            Err(Error::JobNotFound { .. })
        );
    }
}
