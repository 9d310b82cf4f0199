//! Common types and enums for adresse-check.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One source row: column name to cell value, in source column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Semantic role inferred for a spreadsheet column.
///
/// Declaration order matters: it is the tie-break order used by the column
/// classifier, first-declared wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Five-digit French postcode
    Postcode,
    /// House number, optionally with a letter suffix ("12", "12B")
    Number,
    /// Street name carrying a street-type keyword
    Street,
    /// Locality name
    City,
    /// Free text mixing several fragments
    Mixed,
}

impl ColumnType {
    /// All column types in declaration (tie-break) order.
    pub const ALL: [ColumnType; 5] = [
        ColumnType::Postcode,
        ColumnType::Number,
        ColumnType::Street,
        ColumnType::City,
        ColumnType::Mixed,
    ];

    /// Lowercase name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Postcode => "postcode",
            ColumnType::Number => "number",
            ColumnType::Street => "street",
            ColumnType::City => "city",
            ColumnType::Mixed => "mixed",
        }
    }

    /// Position in [`ColumnType::ALL`].
    pub fn index(&self) -> usize {
        match self {
            ColumnType::Postcode => 0,
            ColumnType::Number => 1,
            ColumnType::Street => 2,
            ColumnType::City => 3,
            ColumnType::Mixed => 4,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address fragments extracted from one row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    /// House number
    pub number: Option<String>,
    /// Street name
    pub street: Option<String>,
    /// Postcode
    pub postcode: Option<String>,
    /// City
    pub city: Option<String>,
    /// Values that could not be slotted, in column order
    pub mixed: Vec<String>,
}

impl AddressParts {
    /// Create empty address parts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a value into the slot named by `column_type`.
    ///
    /// Mixed values, and values whose slot is already taken, are appended to
    /// `mixed`. A filled slot is never overwritten.
    pub fn insert(&mut self, column_type: ColumnType, value: impl Into<String>) {
        let value = value.into();
        let slot = match column_type {
            ColumnType::Number => &mut self.number,
            ColumnType::Street => &mut self.street,
            ColumnType::Postcode => &mut self.postcode,
            ColumnType::City => &mut self.city,
            ColumnType::Mixed => {
                self.mixed.push(value);
                return;
            }
        };

        if slot.is_none() {
            *slot = Some(value);
        } else {
            self.mixed.push(value);
        }
    }

    /// Check if no fragment was extracted.
    pub fn is_empty(&self) -> bool {
        self.number.is_none()
            && self.street.is_none()
            && self.postcode.is_none()
            && self.city.is_none()
            && self.mixed.is_empty()
    }
}

/// Outcome of one geocoder lookup that returned a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    /// Service confidence, 0.0 to 1.0
    pub score: f64,
    /// Structurally complete and above the acceptance threshold
    pub valid: bool,
    /// Canonical formatted address from the service
    pub label: Option<String>,
}

/// Per-row verification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the row is a valid postal address
    pub valid: bool,
    /// Best score seen, absent when no candidate matched at all
    pub score: Option<f64>,
    /// Best label seen, possibly from a rejected candidate
    pub address: Option<String>,
    /// Human-readable explanation
    pub reason: String,
}

impl ValidationResult {
    /// Reason attached to accepted rows.
    pub const VALID_REASON: &'static str = "Valid postal address";

    /// Build an accepted result from the match that validated.
    pub fn accepted(found: &GeocodeMatch) -> Self {
        Self {
            valid: true,
            score: Some(found.score),
            address: found.label.clone(),
            reason: Self::VALID_REASON.to_string(),
        }
    }

    /// Merge the result fields after the given row fields.
    ///
    /// Keys already present in `row` keep their position and take the
    /// result's value.
    pub fn merge_into(&self, row: &mut Row) {
        row.insert("valid".to_string(), self.valid.into());
        row.insert("score".to_string(), self.score.into());
        row.insert("address".to_string(), self.address.clone().into());
        row.insert("reason".to_string(), self.reason.clone().into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_type_order() {
        for (index, column_type) in ColumnType::ALL.iter().enumerate() {
            assert_eq!(column_type.index(), index);
        }
        assert_eq!(ColumnType::Postcode.to_string(), "postcode");
        assert_eq!(
            serde_json::to_value(ColumnType::Mixed).unwrap(),
            json!("mixed")
        );
    }

    #[test]
    fn test_parts_overflow_goes_to_mixed() {
        let mut parts = AddressParts::new();
        assert!(parts.is_empty());

        parts.insert(ColumnType::City, "Paris");
        parts.insert(ColumnType::City, "Lyon");
        parts.insert(ColumnType::Mixed, "12 rue de Paris");

        assert_eq!(parts.city.as_deref(), Some("Paris"));
        assert_eq!(parts.mixed, vec!["Lyon", "12 rue de Paris"]);
        assert!(!parts.is_empty());
    }

    #[test]
    fn test_merge_keeps_existing_key_position() {
        let mut row = Row::new();
        row.insert("valid".to_string(), json!("oui"));
        row.insert("Ville".to_string(), json!("Paris"));

        let result = ValidationResult {
            valid: false,
            score: None,
            address: None,
            reason: "No match found".to_string(),
        };
        result.merge_into(&mut row);

        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["valid", "Ville", "score", "address", "reason"]);
        assert_eq!(row["valid"], json!(false));
        assert_eq!(row["score"], json!(null));
    }
}
