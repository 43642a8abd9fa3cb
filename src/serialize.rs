//! The serializer contract (spec §6, §4.1): `save_mind` produces a
//! self-contained `Document`; `load` reconstructs a `Registries` from one.
//!
//! A document always captures the whole reachable universe rather than a
//! scoped subtree under `mind` — Subject/Belief references routinely cross
//! mind boundaries (universal subjects, nested mind-valued traits), and
//! the spec does not define a dependency-closure algorithm for a partial
//! save. `mind` is recorded as the document's designated entry point; a
//! caller that only cares about one mind's view re-derives it with
//! `Mind::states()` after `load`.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::archetype::TypeRegistry;
use crate::belief::{BaseRef, Belief};
use crate::error::{Error, Result};
use crate::ids::{BeliefId, IdSequence, MindId, StateId, SubjectId};
use crate::mind::Mind;
use crate::registry::Registries;
use crate::state::{State, StateKind};
use crate::subject::Subject;

/// Bumped whenever `Document`'s shape or field semantics change
/// incompatibly. `load` rejects any other value outright rather than
/// guessing at a migration.
pub const DOCUMENT_VERSION: u32 = 1;

/// A complete, self-contained snapshot of a `Registries` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    pub root_mind: MindId,
    pub max_id: u64,
    pub types: TypeRegistry,
    pub subjects: Vec<Subject>,
    pub minds: Vec<Mind>,
    pub states: Vec<State>,
    pub beliefs: Vec<Belief>,
    pub sid_by_label: HashMap<String, SubjectId>,
    pub promotion_epoch: u64,
    pub logos: MindId,
    pub eidos: MindId,
}

/// Serialize the whole registry, recording `mind` as the document's entry
/// point (spec §6 `save_mind`).
pub fn save_mind(reg: &Registries, mind: MindId) -> Result<Document> {
    reg.mind(mind)?;
    Ok(Document {
        version: DOCUMENT_VERSION,
        root_mind: mind,
        max_id: reg.ids.peek().saturating_sub(1),
        types: reg.types.clone(),
        subjects: reg.subjects.values().cloned().collect(),
        minds: reg.minds.values().cloned().collect(),
        states: reg.states.values().cloned().collect(),
        beliefs: reg.beliefs.values().cloned().collect(),
        sid_by_label: reg.sid_by_label.clone(),
        promotion_epoch: reg.promotion_epoch,
        logos: reg.logos,
        eidos: reg.eidos,
    })
}

/// Reconstruct a `Registries` from a `Document` (spec §6 `load`). The id
/// sequence is advanced past every loaded id so freshly-created entities
/// never collide with the loaded ones. Every loaded state and belief is
/// marked locked: a document only ever captures committed history, never
/// an in-progress staging area.
pub fn load(doc: Document) -> Result<Registries> {
    if doc.version != DOCUMENT_VERSION {
        return Err(Error::VersionMismatch { expected: DOCUMENT_VERSION, found: doc.version });
    }

    if !doc.minds.iter().any(|m| m.id == doc.logos) || !doc.minds.iter().any(|m| m.id == doc.eidos) {
        return Err(Error::Fatal("document is missing its logos/eidos mind".into()));
    }

    validate_referents(&doc)?;

    let ids = IdSequence::new();
    ids.advance_past(doc.max_id);

    let mut subjects = HashMap::new();
    for s in doc.subjects {
        subjects.insert(s.id, s);
    }

    let mut minds = HashMap::new();
    for m in doc.minds {
        minds.insert(m.id, m);
    }

    let mut states = HashMap::new();
    for mut s in doc.states {
        s.locked = true;
        states.insert(s.id, s);
    }

    let mut beliefs = HashMap::new();
    for mut b in doc.beliefs {
        b.locked = true;
        beliefs.insert(b.id, b);
    }

    Registries::from_parts(
        ids,
        doc.types,
        subjects,
        minds,
        states,
        beliefs,
        doc.sid_by_label,
        doc.promotion_epoch,
        doc.logos,
        doc.eidos,
    )
}

/// spec §7 "serializer errors": reject a document with a dangling
/// reference rather than let `load` succeed and panic later on first use
/// (e.g. a belief base pointing at a belief id the document never shipped).
fn validate_referents(doc: &Document) -> Result<()> {
    let mind_ids: HashSet<MindId> = doc.minds.iter().map(|m| m.id).collect();
    let state_ids: HashSet<StateId> = doc.states.iter().map(|s| s.id).collect();
    let subject_ids: HashSet<SubjectId> = doc.subjects.iter().map(|s| s.id).collect();
    let belief_ids: HashSet<BeliefId> = doc.beliefs.iter().map(|b| b.id).collect();

    let require_mind = |id: MindId| -> Result<()> {
        if mind_ids.contains(&id) { Ok(()) } else { Err(Error::MissingReferent(id.0)) }
    };
    let require_state = |id: StateId| -> Result<()> {
        if state_ids.contains(&id) { Ok(()) } else { Err(Error::MissingReferent(id.0)) }
    };
    let require_subject = |id: SubjectId| -> Result<()> {
        if subject_ids.contains(&id) { Ok(()) } else { Err(Error::MissingReferent(id.0)) }
    };
    let require_belief = |id: BeliefId| -> Result<()> {
        if belief_ids.contains(&id) { Ok(()) } else { Err(Error::MissingReferent(id.0)) }
    };

    require_mind(doc.root_mind)?;

    for m in &doc.minds {
        if let Some(parent) = m.parent {
            require_mind(parent)?;
        }
    }

    for s in &doc.states {
        require_mind(s.in_mind)?;
        match &s.kind {
            StateKind::Plain { base } => {
                if let Some(b) = base {
                    require_state(*b)?;
                }
            }
            StateKind::Convergence { component_states } | StateKind::Union { component_states } => {
                for c in component_states {
                    require_state(*c)?;
                }
            }
        }
        if let Some(ground) = s.ground_state {
            require_state(ground)?;
        }
        for (descendant, chosen) in &s.resolution_map {
            require_state(*descendant)?;
            require_state(*chosen)?;
        }
    }

    for b in &doc.beliefs {
        require_subject(b.subject)?;
        require_state(b.origin_state)?;
        require_mind(b.in_mind)?;
        for base in b.bases() {
            match base {
                BaseRef::Archetype(aid) => {
                    doc.types.archetype(*aid).map_err(|_| Error::MissingReferent(aid.0))?;
                }
                BaseRef::Belief(bid) => require_belief(*bid)?,
            }
        }
        for p in b.promotions() {
            require_belief(p.belief)?;
        }
        if let Some(resolved) = b.resolution_of {
            require_belief(resolved)?;
        }
    }

    for s in &doc.subjects {
        if let Some(mater) = s.mater {
            require_mind(mater)?;
        }
        for v in s.versions() {
            require_belief(*v)?;
        }
        for (state, resolver) in &s.resolutions {
            require_state(*state)?;
            require_belief(*resolver)?;
        }
    }

    for sid in doc.sid_by_label.values() {
        require_subject(*sid)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefTemplate;
    use crate::state::StateOptions;

    #[test]
    fn round_trips_a_locked_belief() {
        let mut reg = Registries::new();
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let rock = reg
            .create_belief(s0, BeliefTemplate { subject: None, bases: vec![], traits: vec![], promotable: false, label: Some("rock".into()) })
            .unwrap();
        reg.lock_state(s0).unwrap();

        let doc = save_mind(&reg, eidos).unwrap();
        let reloaded = load(doc).unwrap();

        assert!(reloaded.belief(rock).unwrap().locked);
        assert_eq!(reloaded.resolve_label_to_subject("rock").unwrap(), reg.belief(rock).unwrap().subject);
    }

    #[test]
    fn rejects_document_without_logos() {
        let reg = Registries::new();
        let eidos = reg.eidos();
        let mut doc = save_mind(&reg, eidos).unwrap();
        doc.minds.retain(|m| m.id != doc.logos);
        assert!(load(doc).is_err());
    }

    #[test]
    fn rejects_version_mismatch() {
        let reg = Registries::new();
        let eidos = reg.eidos();
        let mut doc = save_mind(&reg, eidos).unwrap();
        doc.version = DOCUMENT_VERSION + 1;
        let err = load(doc).unwrap_err();
        assert!(matches!(err, Error::VersionMismatch { .. }));
    }

    #[test]
    fn rejects_dangling_belief_base() {
        let mut reg = Registries::new();
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let rock = reg
            .create_belief(s0, BeliefTemplate { subject: None, bases: vec![], traits: vec![], promotable: false, label: None })
            .unwrap();
        reg.lock_state(s0).unwrap();

        let mut doc = save_mind(&reg, eidos).unwrap();
        let belief = doc.beliefs.iter_mut().find(|b| b.id == rock).unwrap();
        belief.bases.push(BaseRef::Belief(BeliefId(999_999)));

        let err = load(doc).unwrap_err();
        assert!(matches!(err, Error::MissingReferent(999_999)));
    }

    #[test]
    fn rejects_dangling_subject_mater() {
        let mut reg = Registries::new();
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        reg.create_belief(s0, BeliefTemplate { subject: None, bases: vec![], traits: vec![], promotable: false, label: None })
            .unwrap();
        reg.lock_state(s0).unwrap();

        let mut doc = save_mind(&reg, eidos).unwrap();
        doc.subjects[0].mater = Some(MindId(999_998));

        let err = load(doc).unwrap_err();
        assert!(matches!(err, Error::MissingReferent(999_998)));
    }
}
