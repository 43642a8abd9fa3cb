//! Process-wide identity allocation.
//!
//! A single monotonically increasing counter allocates every identifier in
//! the system — subjects, archetypes, traittypes, minds, states and
//! beliefs all draw from the same stream, so that two entities created in
//! any order compare consistently regardless of kind (spec §5, "ordering
//! guarantees").

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// The shared id stream. Never reset while the engine is live; advanced
/// past the maximum loaded id on deserialization (see `serialize::load`).
#[derive(Debug)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Allocate the next id.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Advance the sequence past `id`, so subsequent allocations never
    /// collide with ids loaded from a serialized document.
    pub fn advance_past(&self, id: u64) {
        self.0.fetch_max(id + 1, Ordering::Relaxed);
    }

    /// The next id that would be allocated, without consuming it.
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! dense_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

dense_id!(SubjectId, "Dense identifier for a Subject.");
dense_id!(ArchetypeId, "Dense identifier for an Archetype.");
dense_id!(TraitTypeId, "Dense identifier for a Traittype.");
dense_id!(MindId, "Dense identifier for a Mind.");
dense_id!(StateId, "Dense identifier for a State.");
dense_id!(BeliefId, "Dense identifier for a Belief version.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let seq = IdSequence::new();
        let a = seq.next();
        let b = seq.next();
        assert!(b > a);
    }

    #[test]
    fn advance_past_skips_loaded_ids() {
        let seq = IdSequence::new();
        seq.advance_past(100);
        assert!(seq.next() > 100);
    }
}
