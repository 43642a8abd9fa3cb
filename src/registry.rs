//! The top-level arena (spec §4.1 "Identity & Registry"). Every entity kind
//! — Subject, Archetype, TraitType, Mind, State, Belief — draws its id from
//! one shared `IdSequence`, and `Registries` owns every entity map. There is
//! no global/lock: callers thread `&mut Registries` through mutating calls
//! (spec §5, §9 "Design Notes" — single-threaded cooperative model).

use hashbrown::HashMap;

use crate::archetype::{Archetype, ArchetypeDef, TraitType, TraitTypeDef, TypeRegistry};
use crate::belief::Belief;
use crate::error::{Error, Result};
use crate::ids::{ArchetypeId, BeliefId, IdSequence, MindId, StateId, SubjectId, TraitTypeId};
use crate::mind::{Mind, MindKind};
use crate::state::State;
use crate::subject::Subject;

/// Owns every arena and the shared id sequence. The sole entry point for
/// mutating operations (`create_*`, `branch_*`, `lock_*`, trait resolution).
/// Not itself `Serialize`/`Deserialize` — `serialize::save_mind`/`load`
/// translate to and from the `Document` DTO explicitly, the way the
/// teacher crate's storage backends never derive serde on their live
/// in-memory state either.
#[derive(Debug)]
pub struct Registries {
    pub(crate) ids: IdSequence,
    pub(crate) types: TypeRegistry,
    pub(crate) subjects: HashMap<SubjectId, Subject>,
    pub(crate) minds: HashMap<MindId, Mind>,
    pub(crate) states: HashMap<StateId, State>,
    pub(crate) beliefs: HashMap<BeliefId, Belief>,
    pub(crate) sid_by_label: HashMap<String, SubjectId>,
    /// Bumped on every promotion attached anywhere (spec §4.9 cache
    /// invalidation). A single process-wide counter trades fine-grained
    /// per-dependency invalidation for O(1) writes and reads — see
    /// the design notes for the tradeoff this makes.
    pub(crate) promotion_epoch: u64,
    pub(crate) logos: MindId,
    pub(crate) eidos: MindId,
}

impl Registries {
    /// A fresh registry: allocates the singleton `logos` root mind and its
    /// `eidos` child (spec §3 "Mind", invariant 7).
    pub fn new() -> Self {
        let ids = IdSequence::new();
        let logos_id = MindId(ids.next());
        let eidos_id = MindId(ids.next());

        let mut minds = HashMap::new();
        minds.insert(
            logos_id,
            Mind { id: logos_id, parent: None, label: Some("logos".into()), kind: MindKind::Logos, temporal: false, states: Vec::new() },
        );
        minds.insert(
            eidos_id,
            Mind { id: eidos_id, parent: Some(logos_id), label: Some("eidos".into()), kind: MindKind::Eidos, temporal: false, states: Vec::new() },
        );

        Self {
            ids,
            types: TypeRegistry::default(),
            subjects: HashMap::new(),
            minds,
            states: HashMap::new(),
            beliefs: HashMap::new(),
            sid_by_label: HashMap::new(),
            promotion_epoch: 0,
            logos: logos_id,
            eidos: eidos_id,
        }
    }

    pub fn logos(&self) -> MindId {
        self.logos
    }

    pub fn eidos(&self) -> MindId {
        self.eidos
    }

    pub fn mind(&self, id: MindId) -> Result<&Mind> {
        self.minds.get(&id).ok_or_else(|| Error::Fatal(format!("unknown mind {id}")))
    }

    pub(crate) fn mind_mut(&mut self, id: MindId) -> Result<&mut Mind> {
        self.minds.get_mut(&id).ok_or_else(|| Error::Fatal(format!("unknown mind {id}")))
    }

    /// Create a new ordinary mind nested under `parent` (`logos` and
    /// `eidos` are the only minds without one, and both already exist
    /// after `new()`). A mind reachable from `eidos` by walking parents is
    /// where Promotions are permitted (invariant 7).
    pub fn create_mind(&mut self, parent: Option<MindId>, label: Option<String>, temporal: bool) -> Result<MindId> {
        let parent = parent.unwrap_or(self.logos);
        self.mind(parent)?;
        let id = MindId(self.ids.next());
        self.minds.insert(id, Mind { id, parent: Some(parent), label, kind: MindKind::Ordinary, temporal, states: Vec::new() });
        tracing::debug!(mind = id.0, temporal, "created mind");
        Ok(id)
    }

    pub fn subject(&self, id: SubjectId) -> Result<&Subject> {
        self.subjects.get(&id).ok_or(Error::UnknownSubject(id))
    }

    /// Allocate a fresh subject, or return an existing one if `existing`
    /// is supplied (used when a caller already knows the id, e.g. while
    /// loading a document).
    pub fn get_or_create_subject(&mut self, mater: Option<MindId>, existing: Option<SubjectId>) -> Result<SubjectId> {
        if let Some(id) = existing {
            if let Some(subj) = self.subjects.get(&id) {
                if subj.mater != mater {
                    return Err(Error::MaterConflict(id));
                }
                return Ok(id);
            }
            self.subjects.insert(id, Subject::new(id, mater));
            return Ok(id);
        }
        let id = SubjectId(self.ids.next());
        self.subjects.insert(id, Subject::new(id, mater));
        Ok(id)
    }

    /// Bind a human-readable label to a subject (used by scenario setup and
    /// `TraitInput::Label` resolution). Labels are a convenience index, not
    /// part of the core identity model — rebinding overwrites silently.
    pub fn bind_label_to_subject(&mut self, subject: SubjectId, label: String) -> Result<()> {
        self.subject(subject)?;
        self.sid_by_label.insert(label, subject);
        Ok(())
    }

    pub fn resolve_label_to_subject(&self, label: &str) -> Result<SubjectId> {
        self.sid_by_label.get(label).copied().ok_or_else(|| Error::Fatal(format!("no subject bound to label {label:?}")))
    }

    /// `TypeRegistry::register_traittype`, allocating the id from the
    /// shared sequence.
    pub fn register_traittype(&mut self, def: TraitTypeDef) -> Result<TraitTypeId> {
        let id = TraitTypeId(self.ids.next());
        self.types.register_traittype(id, def)
    }

    /// `TypeRegistry::register_archetype`, allocating the id from the
    /// shared sequence.
    pub fn register_archetype(&mut self, def: ArchetypeDef) -> Result<ArchetypeId> {
        let id = ArchetypeId(self.ids.next());
        self.types.register_archetype(id, def)
    }

    /// Bulk-register a batch of traittypes followed by a batch of
    /// archetypes (archetypes may reference any traittype in the same
    /// batch by label, since traittypes are registered first).
    pub fn register(
        &mut self,
        traittype_defs: Vec<TraitTypeDef>,
        archetype_defs: Vec<ArchetypeDef>,
    ) -> Result<(Vec<TraitTypeId>, Vec<ArchetypeId>)> {
        let mut tt_ids = Vec::with_capacity(traittype_defs.len());
        for def in traittype_defs {
            tt_ids.push(self.register_traittype(def)?);
        }
        let mut arch_ids = Vec::with_capacity(archetype_defs.len());
        for def in archetype_defs {
            arch_ids.push(self.register_archetype(def)?);
        }
        Ok((tt_ids, arch_ids))
    }

    /// Read-only view of every registered archetype.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.types.archetypes.values()
    }

    /// Read-only view of every registered traittype.
    pub fn traittypes(&self) -> impl Iterator<Item = &TraitType> {
        self.types.traittypes.values()
    }

    /// Every subject whose `mater` is `mind` (private, non-universal
    /// subjects owned by that mind).
    pub fn subjects_in(&self, mind: MindId) -> impl Iterator<Item = &Subject> {
        self.subjects.values().filter(move |s| s.mater == Some(mind))
    }

    /// Whether `candidate` is `of` itself or reachable by walking `of`'s
    /// Plain-state bases / Convergence-or-Union components backward. Used
    /// to decide whether a belief resolution is actually related to the
    /// subject's promotion ancestry (spec §9 open question: treated as a
    /// user error, see `Error::UnrelatedResolution`).
    pub(crate) fn is_ancestor_or_self(&self, candidate: StateId, of: StateId) -> bool {
        let mut stack = vec![of];
        let mut seen = hashbrown::HashSet::new();
        while let Some(cur) = stack.pop() {
            if cur == candidate {
                return true;
            }
            if !seen.insert(cur) {
                continue;
            }
            if let Ok(s) = self.state(cur) {
                if let Some(b) = s.base() {
                    stack.push(b);
                }
                for c in s.component_states() {
                    stack.push(*c);
                }
            }
        }
        false
    }

    /// Drop every entity, keeping the freshly-created `logos`/`eidos`
    /// minds. Used by tests and by `load` before repopulating a registry.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Reassemble a registry from already-deserialized parts (used by
    /// `serialize::load`, which needs to bypass `new()`'s fresh
    /// `logos`/`eidos` allocation and reuse the ids recorded in the
    /// document instead).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        ids: IdSequence,
        types: TypeRegistry,
        subjects: HashMap<SubjectId, Subject>,
        minds: HashMap<MindId, Mind>,
        states: HashMap<StateId, State>,
        beliefs: HashMap<BeliefId, Belief>,
        sid_by_label: HashMap<String, SubjectId>,
        promotion_epoch: u64,
        logos: MindId,
        eidos: MindId,
    ) -> Result<Self> {
        Ok(Self { ids, types, subjects, minds, states, beliefs, sid_by_label, promotion_epoch, logos, eidos })
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
