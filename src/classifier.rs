//! Heuristic column classification.
//!
//! A column is classified by letting each of its first non-empty values vote
//! for a [`ColumnType`]. Each value is tested against [`RULES`] in order and
//! votes for the first rule it satisfies. The type with the most votes wins;
//! ties go to the type declared first in [`ColumnType::ALL`]. An empty
//! sample therefore classifies as [`ColumnType::Postcode`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalizer::normalize;
use crate::types::ColumnType;

/// Number of leading non-empty values inspected by default.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

/// French street-type keywords, matched against normalized text.
pub const STREET_KEYWORDS: [&str; 12] = [
    "rue", "avenue", "av", "boulevard", "bd", "chemin", "route", "impasse", "allee", "place",
    "quai", "cours",
];

static POSTCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{5}$").unwrap());
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+[a-zA-Z]?$").unwrap());

/// Test applied to a single sampled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Test {
    /// Exactly five ASCII digits
    FiveDigits,
    /// Digits optionally followed by one letter
    DigitsWithSuffix,
    /// Normalized text contains a street keyword
    StreetKeyword,
    /// Any digit anywhere
    AnyDigit,
    /// Always matches
    Always,
}

impl Test {
    fn matches(&self, raw: &str, normalized: &str) -> bool {
        match self {
            Test::FiveDigits => POSTCODE_RE.is_match(raw),
            Test::DigitsWithSuffix => NUMBER_RE.is_match(raw),
            Test::StreetKeyword => STREET_KEYWORDS.iter().any(|k| normalized.contains(k)),
            Test::AnyDigit => raw.chars().any(|c| c.is_ascii_digit()),
            Test::Always => true,
        }
    }
}

/// A classification rule: values passing `test` vote for `vote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Test applied to the value
    pub test: Test,
    /// Column type receiving the vote
    pub vote: ColumnType,
}

/// Rules in strict priority order. The last rule always matches.
pub const RULES: [Rule; 5] = [
    Rule { test: Test::FiveDigits, vote: ColumnType::Postcode },
    Rule { test: Test::DigitsWithSuffix, vote: ColumnType::Number },
    Rule { test: Test::StreetKeyword, vote: ColumnType::Street },
    Rule { test: Test::AnyDigit, vote: ColumnType::Mixed },
    Rule { test: Test::Always, vote: ColumnType::City },
];

/// Determine which column type a single value votes for.
pub fn vote(value: &str) -> ColumnType {
    let raw = value.trim();
    let normalized = normalize(raw);
    RULES
        .iter()
        .find(|rule| rule.test.matches(raw, &normalized))
        .map(|rule| rule.vote)
        .unwrap_or(ColumnType::City)
}

/// Vote counts per column type, indexed like [`ColumnType::ALL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    votes: [usize; 5],
}

impl Tally {
    /// Votes received by a column type.
    pub fn votes(&self, column_type: ColumnType) -> usize {
        self.votes[column_type.index()]
    }

    /// Total number of values that voted.
    pub fn total(&self) -> usize {
        self.votes.iter().sum()
    }

    /// Winning type; ties go to the first-declared type.
    pub fn winner(&self) -> ColumnType {
        let mut best = ColumnType::ALL[0];
        for column_type in ColumnType::ALL {
            if self.votes(column_type) > self.votes(best) {
                best = column_type;
            }
        }
        best
    }

    fn record(&mut self, column_type: ColumnType) {
        self.votes[column_type.index()] += 1;
    }
}

/// Tally the votes of the first `sample_size` non-empty values.
pub fn tally<I, S>(values: I, sample_size: usize) -> Tally
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tally = Tally::default();
    values
        .into_iter()
        .filter(|v| !v.as_ref().trim().is_empty())
        .take(sample_size)
        .for_each(|v| tally.record(vote(v.as_ref())));
    tally
}

/// Classify a column from its values using the default sample size.
///
/// # Example
///
/// ```rust
/// use adresse_check::{classifier::classify, ColumnType};
///
/// assert_eq!(classify(["75001", "69002", "13008"]), ColumnType::Postcode);
/// assert_eq!(classify(["12 rue de Paris", "3 avenue Foch"]), ColumnType::Street);
/// ```
pub fn classify<I, S>(values: I) -> ColumnType
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    classify_with_sample(values, DEFAULT_SAMPLE_SIZE)
}

/// Classify a column inspecting at most `sample_size` non-empty values.
pub fn classify_with_sample<I, S>(values: I, sample_size: usize) -> ColumnType
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tally(values, sample_size).winner()
}
