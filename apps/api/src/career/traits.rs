//! Trait Aggregator — turns a batch of quiz answers into per-trait counts.
//!
//! Answers map question ids to selected option ids. Each option carries a
//! comma-separated tag list; every tag that names one of the five traits
//! adds one to that trait. Anything unresolvable is skipped, never an error.

use std::collections::HashMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The fixed trait vocabulary. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trait {
    Analytical,
    Creative,
    Social,
    Practical,
    Leadership,
}

impl Trait {
    pub const ALL: [Trait; 5] = [
        Trait::Analytical,
        Trait::Creative,
        Trait::Social,
        Trait::Practical,
        Trait::Leadership,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Trait::Analytical => "analytical",
            Trait::Creative => "creative",
            Trait::Social => "social",
            Trait::Practical => "practical",
            Trait::Leadership => "leadership",
        }
    }

    /// Normalises a raw tag (trim + lowercase) and matches it against the vocabulary.
    pub fn from_tag(tag: &str) -> Option<Trait> {
        let tag = tag.trim().to_lowercase();
        Trait::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits an option's `career_traits` field into recognised traits, in order.
/// Repeated tags count every time they appear.
pub fn parse_trait_tags(raw: &str) -> impl Iterator<Item = Trait> + '_ {
    raw.split(',').filter_map(Trait::from_tag)
}

/// Counts for all five traits. Always complete; serializes as a JSON object
/// with exactly the five vocabulary keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraitScores([u32; 5]);

impl TraitScores {
    pub fn get(&self, t: Trait) -> u32 {
        self.0[t.index()]
    }

    pub fn increment(&mut self, t: Trait) {
        self.0[t.index()] = self.0[t.index()].saturating_add(1);
    }

    /// `(trait, count)` pairs in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = (Trait, u32)> + '_ {
        Trait::ALL.into_iter().map(|t| (t, self.get(t)))
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Traits ordered by count, highest first. Ties keep vocabulary order.
    pub fn ranked(&self) -> Vec<(Trait, u32)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl Serialize for TraitScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Trait::ALL.len()))?;
        for (t, count) in self.iter() {
            map.serialize_entry(t.as_str(), &count)?;
        }
        map.end()
    }
}

/// Option ids referenced by the answers that parse as UUIDs. Non-string
/// values and malformed ids are left out.
pub fn referenced_option_ids(answers: &Map<String, Value>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = answers
        .values()
        .filter_map(|v| v.as_str())
        .filter_map(|s| Uuid::parse_str(s.trim()).ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Aggregates trait counts for one submission.
///
/// `option_traits` maps option id → raw `career_traits` text for every option
/// that exists. Answers whose option is absent contribute nothing.
pub fn aggregate_traits(
    answers: &Map<String, Value>,
    option_traits: &HashMap<Uuid, String>,
) -> TraitScores {
    let mut scores = TraitScores::default();

    for value in answers.values() {
        let Some(option_id) = value.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok()) else {
            continue;
        };
        let Some(tags) = option_traits.get(&option_id) else {
            continue;
        };
        for t in parse_trait_tags(tags) {
            scores.increment(t);
        }
    }

    scores
}
