//! Row validation against the geocoder.

use std::sync::Arc;

use crate::candidates;
use crate::geocoder::Geocoder;
use crate::table::cell_text;
use crate::types::{AddressParts, ColumnType, GeocodeMatch, Row, ValidationResult};

/// Reason when no candidate returned any match.
pub const NO_MATCH: &str = "No match found";
/// Reason for a best score below [`RECOGNIZED_SCORE`].
pub const NOT_RECOGNIZED: &str = "Address not recognized";
/// Reason for a best score below [`CONFIDENT_SCORE`].
pub const LOW_CONFIDENCE: &str = "Low confidence match";
/// Reason for a confident but structurally incomplete match.
pub const MISSING_DETAILS: &str = "Missing delivery details";

/// Lowest score considered a recognized address.
pub const RECOGNIZED_SCORE: f64 = 0.6;
/// Lowest score considered a confident match.
pub const CONFIDENT_SCORE: f64 = 0.8;

/// Explain a rejected row from the best score seen.
///
/// | best score        | reason                       |
/// |-------------------|------------------------------|
/// | none              | "No match found"             |
/// | `< 0.6`           | "Address not recognized"     |
/// | `< 0.8`           | "Low confidence match"       |
/// | otherwise         | "Missing delivery details"   |
pub fn explain(best_score: Option<f64>) -> &'static str {
    match best_score {
        None => NO_MATCH,
        Some(score) if score < RECOGNIZED_SCORE => NOT_RECOGNIZED,
        Some(score) if score < CONFIDENT_SCORE => LOW_CONFIDENCE,
        Some(_) => MISSING_DETAILS,
    }
}

/// Extract address fragments from a row.
///
/// Columns are visited in the given order; each non-empty trimmed value goes
/// to the slot named by its column type, or to `mixed` on collision.
pub fn extract_parts(row: &Row, column_types: &[(String, ColumnType)]) -> AddressParts {
    let mut parts = AddressParts::new();
    for (column, column_type) in column_types {
        if let Some(value) = row.get(column).and_then(cell_text) {
            parts.insert(*column_type, value);
        }
    }
    parts
}

/// Validates rows by trying their candidates against a geocoder.
#[derive(Clone)]
pub struct RowValidator {
    geocoder: Arc<dyn Geocoder>,
}

impl RowValidator {
    /// Create a validator backed by `geocoder`.
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Validate one row.
    ///
    /// Candidates are tried in order and the first valid match is returned.
    /// Otherwise the highest-scoring match seen (first one on ties) is kept
    /// for diagnostics and the reason is taken from [`explain`].
    pub async fn validate(
        &self,
        row: &Row,
        column_types: &[(String, ColumnType)],
    ) -> ValidationResult {
        let parts = extract_parts(row, column_types);
        self.validate_parts(&parts).await
    }

    /// Validate already extracted address parts.
    pub async fn validate_parts(&self, parts: &AddressParts) -> ValidationResult {
        let mut best: Option<GeocodeMatch> = None;

        for candidate in candidates::build(parts) {
            let Some(found) = self.geocoder.lookup(&candidate).await else {
                continue;
            };

            if found.valid {
                tracing::trace!(%candidate, score = found.score, "candidate accepted");
                return ValidationResult::accepted(&found);
            }

            let best_score = best.as_ref().map_or(0.0, |b| b.score);
            if found.score > best_score {
                best = Some(found);
            }
        }

        let score = best.as_ref().map(|b| b.score);
        ValidationResult {
            valid: false,
            score,
            address: best.and_then(|b| b.label),
            reason: explain(score).to_string(),
        }
    }
}
