//! Candidate address assembly.

use crate::types::AddressParts;

/// Build the ordered list of address strings to submit to the geocoder.
///
/// Most specific forms come first:
///
/// 1. number, street, postcode and city
/// 2. street, postcode and city
/// 3. number and street
/// 4. each mixed value on its own, in column order
/// 5. whatever subset of number, street, postcode and city is present
///
/// Entries are trimmed, blank entries are dropped, and duplicates keep their
/// first position. The order matters: lookups stop at the first accepted
/// match.
///
/// # Example
///
/// ```rust
/// use adresse_check::{candidates::build, AddressParts};
///
/// let parts = AddressParts {
///     number: Some("12".into()),
///     street: Some("rue de Paris".into()),
///     postcode: Some("75001".into()),
///     city: Some("Paris".into()),
///     mixed: vec![],
/// };
/// let candidates = build(&parts);
/// assert_eq!(candidates[0], "12 rue de Paris 75001 Paris");
/// ```
pub fn build(parts: &AddressParts) -> Vec<String> {
    let number = present(&parts.number);
    let street = present(&parts.street);
    let postcode = present(&parts.postcode);
    let city = present(&parts.city);

    let mut candidates = Vec::new();

    if let (Some(n), Some(s), Some(p), Some(c)) = (number, street, postcode, city) {
        candidates.push(format!("{n} {s} {p} {c}"));
    }

    if let (Some(s), Some(p), Some(c)) = (street, postcode, city) {
        candidates.push(format!("{s} {p} {c}"));
    }

    if let (Some(n), Some(s)) = (number, street) {
        candidates.push(format!("{n} {s}"));
    }

    candidates.extend(parts.mixed.iter().cloned());

    let flat = [number, street, postcode, city]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    candidates.push(flat);

    dedup(candidates)
}

fn present(slot: &Option<String>) -> Option<&str> {
    slot.as_deref().filter(|v| !v.trim().is_empty())
}

fn dedup(candidates: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let candidate = candidate.trim();
        if !candidate.is_empty() && !unique.iter().any(|u| u == candidate) {
            unique.push(candidate.to_string());
        }
    }
    unique
}
