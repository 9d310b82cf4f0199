//! Geocoder client for BAN-style address search services.
//!
//! A lookup has three outcomes: a feature came back, the service answered
//! with zero features, or the service could not be used at all (timeout,
//! transport error, error status, unreadable payload). The distinction is
//! kept here for logging and counters; [`Geocoder::lookup`] collapses the
//! last two into `None` because an unreliable service is treated as absence
//! of evidence, never as a failure of the row.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::stats::LookupStats;
use crate::types::GeocodeMatch;

/// Outcome of one search request.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The service returned a feature
    Matched(GeocodeMatch),
    /// The service answered with zero features
    NoResult,
    /// The service could not be used; carries a short diagnostic
    Unavailable(String),
}

impl LookupOutcome {
    /// Collapse the outcome to the match, if any.
    pub fn into_match(self) -> Option<GeocodeMatch> {
        match self {
            LookupOutcome::Matched(found) => Some(found),
            LookupOutcome::NoResult | LookupOutcome::Unavailable(_) => None,
        }
    }
}

/// An address search service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Search for the top-1 feature matching `address`.
    async fn search(&self, address: &str) -> LookupOutcome;

    /// Search and keep only a returned match.
    async fn lookup(&self, address: &str) -> Option<GeocodeMatch> {
        self.search(address).await.into_match()
    }
}

/// HTTP client for the Base Adresse Nationale search API.
#[derive(Debug, Clone)]
pub struct BanClient {
    http: reqwest::Client,
    endpoint: String,
    accept_threshold: f64,
    stats: Arc<LookupStats>,
}

impl BanClient {
    /// Create a client from the verifier configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &VerifierConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::geocoder_error(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.geocoder_url.clone(),
            accept_threshold: config.accept_threshold,
            stats: Arc::new(LookupStats::new()),
        })
    }

    /// Counters for the lookups made through this client.
    pub fn stats(&self) -> &Arc<LookupStats> {
        &self.stats
    }

    async fn fetch(&self, address: &str) -> std::result::Result<Value, String> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", address), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "timeout".to_string()
                } else {
                    format!("request failed: {e}")
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status}"));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("unreadable payload: {e}"))
    }
}

#[async_trait]
impl Geocoder for BanClient {
    async fn search(&self, address: &str) -> LookupOutcome {
        let started = Instant::now();
        let outcome = match self.fetch(address).await {
            Ok(body) => interpret(&body, self.accept_threshold),
            Err(reason) => LookupOutcome::Unavailable(reason),
        };
        self.stats.record(&outcome, started.elapsed());

        if let LookupOutcome::Unavailable(reason) = &outcome {
            tracing::debug!(candidate = address, %reason, "geocoder unavailable");
        }
        outcome
    }
}

/// Interpret a search response body.
///
/// Only the first feature is considered. A match is valid when its score
/// reaches `accept_threshold` and it carries house number, street, postcode
/// and city. A missing score counts as 0.0.
pub fn interpret(body: &Value, accept_threshold: f64) -> LookupOutcome {
    let Some(features) = body.get("features").and_then(Value::as_array) else {
        return LookupOutcome::Unavailable("payload without features".to_string());
    };

    let Some(feature) = features.first() else {
        return LookupOutcome::NoResult;
    };

    let Some(props) = feature.get("properties").and_then(Value::as_object) else {
        return LookupOutcome::Unavailable("feature without properties".to_string());
    };

    let score = props.get("score").and_then(Value::as_f64).unwrap_or(0.0);
    let complete = ["housenumber", "street", "postcode", "city"]
        .iter()
        .all(|key| has_value(props.get(*key)));

    LookupOutcome::Matched(GeocodeMatch {
        score,
        valid: score >= accept_threshold && complete,
        label: props
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Geocoder answering from a fixed table; unknown addresses get
    /// `NoResult`. Every searched address is logged.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedGeocoder {
        responses: HashMap<String, LookupOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGeocoder {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(mut self, address: &str, outcome: LookupOutcome) -> Self {
            self.responses.insert(address.to_string(), outcome);
            self
        }

        pub(crate) fn matched(self, address: &str, score: f64, valid: bool, label: &str) -> Self {
            self.respond(
                address,
                LookupOutcome::Matched(GeocodeMatch {
                    score,
                    valid,
                    label: Some(label.to_string()),
                }),
            )
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn search(&self, address: &str) -> LookupOutcome {
            self.calls.lock().unwrap().push(address.to_string());
            self.responses
                .get(address)
                .cloned()
                .unwrap_or(LookupOutcome::NoResult)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn paris_feature(score: f64) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {
                    "score": score,
                    "housenumber": "12",
                    "street": "Rue de Paris",
                    "postcode": "75001",
                    "city": "Paris",
                    "type": "housenumber",
                    "label": "12 Rue de Paris 75001 Paris"
                }
            }]
        })
    }

    fn client_for(server: &MockServer, timeout: Duration) -> BanClient {
        let config = VerifierConfig::builder()
            .geocoder_url(format!("{}/search/", server.uri()))
            .request_timeout(timeout)
            .build();
        BanClient::new(&config).unwrap()
    }

    #[test]
    fn test_interpret_complete_feature() {
        let outcome = interpret(&paris_feature(0.95), 0.8);
        assert_eq!(
            outcome,
            LookupOutcome::Matched(GeocodeMatch {
                score: 0.95,
                valid: true,
                label: Some("12 Rue de Paris 75001 Paris".to_string()),
            })
        );
    }

    #[test]
    fn test_interpret_low_score_is_not_valid() {
        let outcome = interpret(&paris_feature(0.79), 0.8);
        assert_matches!(outcome, LookupOutcome::Matched(found) if !found.valid && found.score == 0.79);
    }

    #[test]
    fn test_interpret_incomplete_feature() {
        let body = json!({
            "features": [{
                "properties": {
                    "score": 0.92,
                    "street": "Rue de Paris",
                    "postcode": "75001",
                    "city": "Paris",
                    "type": "street",
                    "label": "Rue de Paris 75001 Paris"
                }
            }]
        });
        assert_matches!(interpret(&body, 0.8), LookupOutcome::Matched(found) if !found.valid);
    }

    #[test]
    fn test_interpret_missing_score_defaults_to_zero() {
        let body = json!({ "features": [{ "properties": { "label": "Paris" } }] });
        assert_matches!(
            interpret(&body, 0.8),
            LookupOutcome::Matched(GeocodeMatch { score, valid: false, .. }) if score == 0.0
        );
    }

    #[test]
    fn test_interpret_empty_and_malformed() {
        assert_eq!(interpret(&json!({ "features": [] }), 0.8), LookupOutcome::NoResult);
        assert_matches!(interpret(&json!({ "oops": 1 }), 0.8), LookupOutcome::Unavailable(_));
        assert_matches!(
            interpret(&json!({ "features": [{ "geometry": {} }] }), 0.8),
            LookupOutcome::Unavailable(_)
        );
    }

    #[tokio::test]
    async fn test_search_sends_query_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .and(query_param("q", "12 rue de Paris 75001 Paris"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_feature(0.95)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(3));
        let found = client.lookup("12 rue de Paris 75001 Paris").await;

        assert_matches!(found, Some(GeocodeMatch { valid: true, .. }));
        assert_eq!(client.stats().snapshot().matched, 1);
    }

    #[tokio::test]
    async fn test_zero_features_is_no_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(3));
        assert_eq!(client.search("nowhere").await, LookupOutcome::NoResult);
        assert_eq!(client.lookup("nowhere").await, None);
        assert_eq!(client.stats().snapshot().no_result, 2);
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(3));
        assert_matches!(client.search("12 rue de Paris").await, LookupOutcome::Unavailable(_));
        assert_eq!(client.lookup("12 rue de Paris").await, None);
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(paris_feature(0.95))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(50));
        assert_eq!(
            client.search("12 rue de Paris").await,
            LookupOutcome::Unavailable("timeout".to_string())
        );
        assert_eq!(client.stats().snapshot().unavailable, 1);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(3));
        assert_matches!(client.search("12 rue de Paris").await, LookupOutcome::Unavailable(_));
    }
}
