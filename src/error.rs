//! Error taxonomy (spec §7).
//!
//! All errors are raised synchronously at the site of violation and abort
//! the caller's operation. The engine never attempts partial application or
//! rollback of a failed mutation — a caller must branch a fresh state to
//! recover.

use crate::ids::{ArchetypeId, BeliefId, StateId, SubjectId, TraitTypeId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ---- Schema / registration errors --------------------------------
    #[error("unknown archetype base: {0}")]
    UnknownArchetype(String),

    #[error("unknown traittype: {0}")]
    UnknownTraitType(String),

    #[error("label already bound: {0}")]
    LabelCollision(String),

    #[error("traittype {traittype} is not a permitted slot on archetype {archetype}")]
    SlotViolation { archetype: String, traittype: String },

    #[error("cycle in archetype DAG at {0}")]
    ArchetypeCycle(String),

    // ---- Reference errors ----------------------------------------------
    #[error("expected a subject of archetype {expected}, found {found}")]
    WrongArchetype { expected: String, found: String },

    #[error("a Belief object was passed where a Subject handle is required")]
    BeliefNotSubject,

    #[error("subject {0} belongs to another mind and must be referenced via @about")]
    CrossMindMisuse(SubjectId),

    #[error("mater conflict for subject {0}: already anchored to a different mind")]
    MaterConflict(SubjectId),

    // ---- Invariant violations ------------------------------------------
    #[error("state {0} is locked and cannot be mutated")]
    StateLocked(StateId),

    #[error("belief {0} is locked and cannot be mutated")]
    BeliefLocked(BeliefId),

    #[error("belief {0} must be locked before it can be used as a base")]
    BaseNotLocked(BeliefId),

    #[error("promotions are permitted only within the eidos subtree")]
    PromotionOutsideEidos,

    #[error("belief {0} is not promotable")]
    NotPromotable(BeliefId),

    #[error("non-monotonic transaction time: new tt {new} does not exceed base tt {base}")]
    NonMonotonicTt { new: i64, base: i64 },

    #[error("state {0}'s mind is timeless and cannot carry a transaction time")]
    TimelessMind(StateId),

    // ---- Resolution errors ----------------------------------------------
    #[error("ambiguous external-mind belief candidates for subject {0}")]
    AmbiguousReification(SubjectId),

    #[error("resolution belief {resolver} does not descend from a promotion state of {subject}")]
    UnrelatedResolution { resolver: BeliefId, subject: SubjectId },

    #[error("chosen component state {0} is not a member of the convergence's components")]
    NotAComponent(StateId),

    #[error("convergence {0} must be locked before registering a timeline resolution")]
    ConvergenceNotLocked(StateId),

    // ---- Serializer errors -----------------------------------------------
    #[error("serializer: missing referent id {0}")]
    MissingReferent(u64),

    #[error("serializer: version mismatch (expected {expected}, found {found})")]
    VersionMismatch { expected: u32, found: u32 },

    // ---- Catch-all for fatal registry-level failures --------------------
    #[error("unknown traittype id {0:?}")]
    UnknownTraitTypeId(TraitTypeId),

    #[error("unknown archetype id {0:?}")]
    UnknownArchetypeId(ArchetypeId),

    #[error("unknown subject {0}")]
    UnknownSubject(SubjectId),

    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
