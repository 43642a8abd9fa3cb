//! Trait value representation (spec §6 "Uncertainty", Design Notes §9).
//!
//! A resolved trait is never modelled as a language-native null-or-exception
//! channel: "unknown" is a distinguished sentinel value, and superposed
//! futures are a tagged `Uncertain` carrying an ordered list of
//! `(value, certainty)` alternatives, never collapsed to a single pick
//! behind the caller's back.

use serde::{Deserialize, Serialize};

use crate::ids::{MindId, SubjectId};

/// A value stored directly in a belief's `_traits` map, or produced as one
/// alternative inside an `Uncertain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TraitValue {
    /// Explicitly set to "no value" — shadows inherited values (spec §4.4
    /// "Null semantics").
    Null,
    /// The "trait exists but has not yet been observed" sentinel.
    Unknown,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A Subject-valued trait, resolved from a handle or label at
    /// construction time (spec §4.3).
    Subject(SubjectId),
    /// A nested-mind-valued trait (spec §4.6).
    Mind(MindId),
    /// Ordered-sequence container contents.
    Sequence(Vec<TraitValue>),
    /// Set container contents (de-duplicated by value equality at
    /// construction/merge time).
    Set(Vec<TraitValue>),
}

impl TraitValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TraitValue::Null)
    }

    pub fn as_subject(&self) -> Option<SubjectId> {
        match self {
            TraitValue::Subject(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_mind(&self) -> Option<MindId> {
        match self {
            TraitValue::Mind(m) => Some(*m),
            _ => None,
        }
    }
}

impl From<bool> for TraitValue {
    fn from(v: bool) -> Self {
        TraitValue::Bool(v)
    }
}
impl From<i64> for TraitValue {
    fn from(v: i64) -> Self {
        TraitValue::Int(v)
    }
}
impl From<f64> for TraitValue {
    fn from(v: f64) -> Self {
        TraitValue::Float(v)
    }
}
impl From<String> for TraitValue {
    fn from(v: String) -> Self {
        TraitValue::String(v)
    }
}
impl From<&str> for TraitValue {
    fn from(v: &str) -> Self {
        TraitValue::String(v.to_owned())
    }
}
impl From<SubjectId> for TraitValue {
    fn from(v: SubjectId) -> Self {
        TraitValue::Subject(v)
    }
}

/// One alternative inside an `Uncertain` value: a candidate value together
/// with its certainty weight, if any (temporal promotions without
/// certainty carry `None` and are resolved by tie-break rather than
/// surfaced as an alternative — see `resolve::pick_temporal_promotion`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub value: TraitValue,
    pub certainty: Option<f64>,
}

/// A superposition of possible trait values, with `sum(certainty) <= 1`
/// over the alternatives that carry a certainty weight (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Uncertain {
    pub alternatives: Vec<Alternative>,
}

impl Uncertain {
    pub fn new(alternatives: Vec<Alternative>) -> Self {
        Self { alternatives }
    }

    pub fn total_certainty(&self) -> f64 {
        self.alternatives.iter().filter_map(|a| a.certainty).sum()
    }
}

/// The result of `get_trait`: a concrete value (which may itself be
/// `TraitValue::Null` or `TraitValue::Unknown`) or a superposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolved {
    Value(TraitValue),
    Uncertain(Uncertain),
}

impl Resolved {
    pub fn null() -> Self {
        Resolved::Value(TraitValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Resolved::Value(TraitValue::Null))
    }

    pub fn as_value(&self) -> Option<&TraitValue> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Uncertain(_) => None,
        }
    }

    pub fn as_uncertain(&self) -> Option<&Uncertain> {
        match self {
            Resolved::Uncertain(u) => Some(u),
            Resolved::Value(_) => None,
        }
    }
}
