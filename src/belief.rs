//! Belief: one temporal/branch version of a Subject (spec §3 "Belief", §4.3).

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::archetype::BaseKind;
use crate::error::{Error, Result};
use crate::ids::{ArchetypeId, BeliefId, MindId, StateId, SubjectId, TraitTypeId};
use crate::registry::Registries;
use crate::value::{Resolved, TraitValue};

/// A parent in a belief's inheritance chain: either an Archetype (a typing
/// template) or another Belief (spec §4.3 "`_bases` order matters").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseRef {
    Archetype(ArchetypeId),
    Belief(BeliefId),
}

/// The three accepted input forms for setting a trait (spec §4.3): a
/// resolved value (including an already-looked-up `TraitValue::Subject`),
/// a label to resolve against the archetype a Subject-valued slot
/// requires, or the explicit "unknown" sentinel. There is no fourth form
/// accepting a raw Belief — Rust's type system already rejects that at
/// compile time, since `BeliefId` and `SubjectId` are distinct types.
#[derive(Debug, Clone)]
pub enum TraitInput {
    Value(TraitValue),
    Label(String),
    Unknown,
}

/// An alternative-future version attached to a promotable belief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub belief: BeliefId,
    pub certainty: Option<f64>,
}

/// An immutable-once-locked record (spec §3 "Belief").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belief {
    pub id: BeliefId,
    pub subject: SubjectId,
    pub origin_state: StateId,
    pub in_mind: MindId,
    pub(crate) bases: SmallVec<[BaseRef; 4]>,
    pub(crate) traits: HashMap<TraitTypeId, TraitValue>,
    pub promotable: bool,
    pub(crate) promotions: Vec<Promotion>,
    pub resolution_of: Option<BeliefId>,
    pub locked: bool,

    // ---- cache state (spec §4.9) ----
    pub(crate) cache: HashMap<TraitTypeId, Resolved>,
    pub(crate) cached_all: bool,
    pub(crate) cache_deps: HashSet<BeliefId>,
    pub(crate) dependents: HashSet<BeliefId>,
    pub(crate) cache_epoch: u64,
    pub promotable_epoch: u64,
}

impl Belief {
    pub fn bases(&self) -> &[BaseRef] {
        &self.bases
    }

    pub fn promotions(&self) -> &[Promotion] {
        &self.promotions
    }

    /// Traits set directly on this version (not resolved through bases or
    /// promotions).
    pub fn get_defined_traits(&self) -> &HashMap<TraitTypeId, TraitValue> {
        &self.traits
    }
}

/// Construction parameters for `Registries::create_belief` (spec §6
/// `Belief.from_template`).
#[derive(Debug, Clone, Default)]
pub struct BeliefTemplate {
    pub subject: Option<SubjectId>,
    pub bases: Vec<BaseRef>,
    pub traits: Vec<(TraitTypeId, TraitInput)>,
    pub promotable: bool,
    pub label: Option<String>,
}

/// Options accepted by `branch`/`replace` (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct VersionOptions {
    pub promote: bool,
    pub certainty: Option<f64>,
    pub resolution: Option<BeliefId>,
}

impl Registries {
    pub fn belief(&self, id: BeliefId) -> Result<&Belief> {
        self.beliefs.get(&id).ok_or_else(|| Error::Fatal(format!("unknown belief {id}")))
    }

    /// `Belief.from_template` (spec §4.3, §6).
    pub fn create_belief(&mut self, state_id: StateId, template: BeliefTemplate) -> Result<BeliefId> {
        let (mind_id, in_eidos) = {
            let st = self.state(state_id)?;
            if st.locked {
                return Err(Error::StateLocked(state_id));
            }
            (st.in_mind, self.mind_is_eidos_or_below(st.in_mind)?)
        };

        for b in &template.bases {
            if let BaseRef::Belief(bid) = b {
                if !self.belief(*bid)?.locked {
                    return Err(Error::BaseNotLocked(*bid));
                }
            }
        }

        let subject_id = match template.subject {
            Some(s) => s,
            None => {
                let mater = if in_eidos { None } else { Some(mind_id) };
                self.get_or_create_subject(mater, None)?
            }
        };

        let bases: SmallVec<[BaseRef; 4]> = template.bases.into();
        let permitted = self.permitted_slots_for_bases(&bases)?;

        let id = BeliefId(self.ids.next());
        let belief = Belief {
            id,
            subject: subject_id,
            origin_state: state_id,
            in_mind: mind_id,
            bases,
            traits: HashMap::new(),
            promotable: template.promotable,
            promotions: Vec::new(),
            resolution_of: None,
            locked: false,
            cache: HashMap::new(),
            cached_all: false,
            cache_deps: HashSet::new(),
            dependents: HashSet::new(),
            cache_epoch: 0,
            promotable_epoch: 0,
        };
        self.beliefs.insert(id, belief);

        for (tt, input) in template.traits {
            self.check_slot_permitted(&permitted, tt)?;
            let value = self.resolve_trait_input(mind_id, tt, input)?;
            self.set_trait(id, state_id, tt, value)?;
        }

        self.states.get_mut(&state_id).unwrap().insert.insert(id);
        self.subjects.get_mut(&subject_id).unwrap().versions.push(id);

        if let Some(label) = template.label {
            self.bind_label_to_subject(subject_id, label)?;
        }

        tracing::debug!(belief = id.0, subject = subject_id.0, "created belief");
        Ok(id)
    }

    /// `belief.branch(state', overrides, options)`: a new version sharing
    /// `belief`'s subject, with `belief` as a base; `belief` remains live
    /// in `state'` (spec §4.3, used for superposition).
    pub fn branch_belief(
        &mut self,
        belief_id: BeliefId,
        state_id: StateId,
        overrides: Vec<(TraitTypeId, TraitInput)>,
        options: VersionOptions,
    ) -> Result<BeliefId> {
        let base = self.belief(belief_id)?;
        if !base.locked {
            return Err(Error::BaseNotLocked(belief_id));
        }
        let subject = base.subject;
        let promotable = base.promotable;

        let mind_id = self.state(state_id)?.in_mind;
        let bases: SmallVec<[BaseRef; 4]> = smallvec::smallvec![BaseRef::Belief(belief_id)];
        let permitted = self.permitted_slots_for_bases(&bases)?;

        let id = BeliefId(self.ids.next());
        let new_belief = Belief {
            id,
            subject,
            origin_state: state_id,
            in_mind: mind_id,
            bases,
            traits: HashMap::new(),
            promotable,
            promotions: Vec::new(),
            resolution_of: options.resolution,
            locked: false,
            cache: HashMap::new(),
            cached_all: false,
            cache_deps: HashSet::new(),
            dependents: HashSet::new(),
            cache_epoch: 0,
            promotable_epoch: 0,
        };
        self.beliefs.insert(id, new_belief);

        for (tt, input) in overrides {
            self.check_slot_permitted(&permitted, tt)?;
            let value = self.resolve_trait_input(mind_id, tt, input)?;
            self.set_trait(id, state_id, tt, value)?;
        }

        self.subjects.get_mut(&subject).unwrap().versions.push(id);

        if options.promote {
            self.attach_promotion(belief_id, id, options.certainty, mind_id)?;
        } else {
            self.states.get_mut(&state_id).unwrap().insert.insert(id);
        }

        if let Some(resolved_belief) = options.resolution {
            self.index_resolution(resolved_belief, state_id, id)?;
        }

        tracing::debug!(belief = id.0, base = belief_id.0, promote = options.promote, "branched belief");
        Ok(id)
    }

    /// `belief.replace(state', overrides, options)`: like `branch` but
    /// additionally removes `belief` from `state'`.
    pub fn replace_belief(
        &mut self,
        belief_id: BeliefId,
        state_id: StateId,
        overrides: Vec<(TraitTypeId, TraitInput)>,
        options: VersionOptions,
    ) -> Result<BeliefId> {
        let old_traits = self.belief(belief_id)?.traits.clone();
        let new_id = self.branch_belief(belief_id, state_id, overrides, options)?;

        for (tt, v) in old_traits {
            if let Some(subj) = v.as_subject() {
                self.states
                    .get_mut(&state_id)
                    .unwrap()
                    .rev_del
                    .entry((subj, tt))
                    .or_default()
                    .insert(belief_id);
            }
        }
        self.states.get_mut(&state_id).unwrap().remove.insert(belief_id);
        Ok(new_id)
    }

    /// Record a new trait value on a belief, maintaining the state's
    /// reverse index for Subject-valued slots (spec §4.3 `_set_trait`).
    pub(crate) fn set_trait(
        &mut self,
        belief_id: BeliefId,
        state_id: StateId,
        tt: TraitTypeId,
        value: TraitValue,
    ) -> Result<()> {
        if self.belief(belief_id)?.locked {
            return Err(Error::BeliefLocked(belief_id));
        }
        if self.state(state_id)?.locked {
            return Err(Error::StateLocked(state_id));
        }

        let old = self.belief(belief_id)?.traits.get(&tt).cloned();
        if let Some(old_val) = old {
            if let Some(old_subj) = old_val.as_subject() {
                if let Some(set) = self.states.get_mut(&state_id).unwrap().rev_add.get_mut(&(old_subj, tt)) {
                    set.remove(&belief_id);
                }
            }
        }
        if let Some(new_subj) = value.as_subject() {
            self.states
                .get_mut(&state_id)
                .unwrap()
                .rev_add
                .entry((new_subj, tt))
                .or_default()
                .insert(belief_id);
        }

        self.beliefs.get_mut(&belief_id).unwrap().traits.insert(tt, value);
        Ok(())
    }

    /// `get_archetypes(belief)` (spec §4.2): the de-duplicated transitive
    /// set of archetypes reachable through `belief`'s base chain, in
    /// first-found-first-yielded order.
    pub fn get_archetypes(&self, belief_id: BeliefId) -> Result<Vec<ArchetypeId>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_archetypes(belief_id, &mut out, &mut seen, &mut HashSet::new())?;
        Ok(out)
    }

    fn collect_archetypes(
        &self,
        belief_id: BeliefId,
        out: &mut Vec<ArchetypeId>,
        seen: &mut HashSet<ArchetypeId>,
        seen_beliefs: &mut HashSet<BeliefId>,
    ) -> Result<()> {
        if !seen_beliefs.insert(belief_id) {
            return Ok(());
        }
        let belief = self.belief(belief_id)?;
        let bases: Vec<BaseRef> = belief.bases.iter().copied().collect();
        for b in bases {
            match b {
                BaseRef::Archetype(aid) => self.collect_archetype_bases(aid, out, seen)?,
                BaseRef::Belief(bid) => self.collect_archetypes(bid, out, seen, seen_beliefs)?,
            }
        }
        Ok(())
    }

    fn collect_archetype_bases(
        &self,
        aid: ArchetypeId,
        out: &mut Vec<ArchetypeId>,
        seen: &mut HashSet<ArchetypeId>,
    ) -> Result<()> {
        if seen.insert(aid) {
            out.push(aid);
        } else {
            return Ok(());
        }
        let arch = self.types.archetype(aid)?;
        for b in arch.bases.clone() {
            self.collect_archetype_bases(b, out, seen)?;
        }
        Ok(())
    }

    /// `belief.get_slots()`: the permitted-slot union across every
    /// archetype reachable through `belief`'s base DAG.
    pub fn get_slots(&self, belief_id: BeliefId) -> Result<HashSet<TraitTypeId>> {
        let bases = self.belief(belief_id)?.bases.clone();
        self.permitted_slots_for_bases(&bases)
    }

    pub(crate) fn permitted_slots_for_bases(&self, bases: &[BaseRef]) -> Result<HashSet<TraitTypeId>> {
        let mut out = HashSet::new();
        let mut seen_arch = HashSet::new();
        let mut seen_belief = HashSet::new();
        let mut stack: Vec<BaseRef> = bases.to_vec();
        while let Some(b) = stack.pop() {
            match b {
                BaseRef::Archetype(aid) => {
                    if seen_arch.insert(aid) {
                        out.extend(self.types.archetype(aid)?.permitted_slots.iter().copied());
                    }
                }
                BaseRef::Belief(bid) => {
                    if seen_belief.insert(bid) {
                        for bb in self.belief(bid)?.bases.iter() {
                            stack.push(*bb);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn check_slot_permitted(&self, permitted: &HashSet<TraitTypeId>, tt: TraitTypeId) -> Result<()> {
        if permitted.contains(&tt) {
            Ok(())
        } else {
            let traittype = self.types.traittype(tt)?;
            Err(Error::SlotViolation {
                archetype: "<bases>".into(),
                traittype: traittype.label.clone(),
            })
        }
    }

    /// Resolve one of the three accepted input forms into a concrete
    /// `TraitValue`, validating Subject-valued slots against their
    /// required archetype (spec §4.3).
    pub(crate) fn resolve_trait_input(&mut self, in_mind: MindId, tt: TraitTypeId, input: TraitInput) -> Result<TraitValue> {
        let traittype = self.types.traittype(tt)?.clone();
        match (&traittype.base_kind, input) {
            (_, TraitInput::Unknown) => Ok(TraitValue::Unknown),
            (BaseKind::SubjectOf(required), TraitInput::Label(label)) => {
                let sid = self.resolve_label_to_subject(&label)?;
                self.check_subject_reference(in_mind, sid, *required)?;
                Ok(TraitValue::Subject(sid))
            }
            (BaseKind::SubjectOf(required), TraitInput::Value(TraitValue::Subject(sid))) => {
                self.check_subject_reference(in_mind, sid, *required)?;
                Ok(TraitValue::Subject(sid))
            }
            (BaseKind::SubjectOf(_), TraitInput::Value(TraitValue::Null)) => Ok(TraitValue::Null),
            (BaseKind::SubjectOf(_), TraitInput::Value(_)) => Err(Error::BeliefNotSubject),
            (_, TraitInput::Value(v)) => Ok(v),
            (_, TraitInput::Label(_)) => {
                Err(Error::Fatal("label input is only valid for Subject-valued slots".into()))
            }
        }
    }

    /// Invariant 3 (spec §3): a Belief may only hold a direct Subject
    /// reference whose mater is universal or its own `in_mind`. A
    /// particular subject owned by a different mind must be referenced
    /// through `@about`, never set directly into a slot.
    fn check_subject_reference(&self, in_mind: MindId, sid: SubjectId, required: ArchetypeId) -> Result<()> {
        let subj = self.subject(sid)?;
        if let Some(mater) = subj.mater {
            if mater != in_mind {
                return Err(Error::CrossMindMisuse(sid));
            }
        }
        self.check_subject_archetype(sid, required)
    }

    fn check_subject_archetype(&self, sid: SubjectId, required: ArchetypeId) -> Result<()> {
        let subj = self.subject(sid)?;
        for &bid in &subj.versions {
            if self.get_archetypes(bid)?.contains(&required) {
                return Ok(());
            }
        }
        Err(Error::WrongArchetype {
            expected: self.types.archetype(required)?.label.clone(),
            found: format!("subject {sid}"),
        })
    }

    fn attach_promotion(
        &mut self,
        base_belief: BeliefId,
        promotion_belief: BeliefId,
        certainty: Option<f64>,
        mind_id: MindId,
    ) -> Result<()> {
        if !self.mind_is_eidos_or_below(mind_id)? {
            return Err(Error::PromotionOutsideEidos);
        }
        if !self.belief(base_belief)?.promotable {
            return Err(Error::NotPromotable(base_belief));
        }
        self.promotion_epoch += 1;
        let epoch = self.promotion_epoch;
        let b = self.beliefs.get_mut(&base_belief).unwrap();
        b.promotions.push(Promotion { belief: promotion_belief, certainty });
        b.promotable_epoch = epoch;
        tracing::debug!(base = base_belief.0, promotion = promotion_belief.0, epoch, "attached promotion");
        Ok(())
    }

    fn index_resolution(&mut self, resolved_belief: BeliefId, state_id: StateId, resolver: BeliefId) -> Result<()> {
        let subject = self.belief(resolved_belief)?.subject;
        let other = self.belief(resolved_belief)?.clone();
        let origin_related = self.is_ancestor_or_self(other.origin_state, state_id);
        let promotion_related = other.promotions.iter().any(|p| {
            self.belief(p.belief)
                .map(|pb| self.is_ancestor_or_self(pb.origin_state, state_id))
                .unwrap_or(false)
        });
        if !origin_related && !promotion_related {
            return Err(Error::UnrelatedResolution { resolver, subject });
        }
        self.subjects.get_mut(&subject).unwrap().resolutions.insert(state_id, resolver);
        tracing::debug!(subject = subject.0, state = state_id.0, resolver = resolver.0, "registered belief resolution");
        Ok(())
    }

    pub fn lock_belief(&mut self, belief_id: BeliefId) -> Result<()> {
        self.beliefs
            .get_mut(&belief_id)
            .ok_or_else(|| Error::Fatal(format!("unknown belief {belief_id}")))?
            .locked = true;
        Ok(())
    }

    /// Cascade step of `State::lock` (spec §4.11 items 2-3): lock the
    /// belief, then lock every nested mind-state reachable through a
    /// Mind-valued trait this belief holds *directly*. Inherited
    /// mind-valued traits are not re-cascaded here — their bases are
    /// already locked by invariant 4.
    pub(crate) fn lock_belief_cascade(&mut self, belief_id: BeliefId, _state_id: StateId) -> Result<()> {
        self.lock_belief(belief_id)?;
        let nested_minds: Vec<MindId> = self
            .belief(belief_id)?
            .traits
            .values()
            .filter_map(|v| v.as_mind())
            .collect();
        for nested in nested_minds {
            let states: Vec<StateId> = self.mind(nested)?.states().to_vec();
            for s in states {
                self.lock_state(s)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::{ArchetypeDef, Container, TraitTypeDef};
    use crate::state::StateOptions;

    fn setup_weight(reg: &mut Registries) -> (ArchetypeId, TraitTypeId) {
        let weight = reg
            .register_traittype(TraitTypeDef {
                label: "weight".into(),
                base_kind: BaseKind::Primitive,
                container: Container::Scalar,
                composable: false,
            })
            .unwrap();
        let item = reg
            .register_archetype(ArchetypeDef {
                label: "Item".into(),
                base_labels: vec![],
                own_slots: vec![weight],
                own_defaults: vec![],
            })
            .unwrap();
        (item, weight)
    }

    #[test]
    fn branch_inherits_unset_traits() {
        let mut reg = Registries::new();
        let (item, weight) = setup_weight(&mut reg);
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let sword = reg
            .create_belief(
                s0,
                BeliefTemplate {
                    subject: None,
                    bases: vec![BaseRef::Archetype(item)],
                    traits: vec![(weight, TraitInput::Value(TraitValue::Int(5)))],
                    promotable: false,
                    label: Some("generic_sword".into()),
                },
            )
            .unwrap();
        reg.lock_state(s0).unwrap();

        let s1 = reg.branch_state(s0, StateOptions::default()).unwrap();
        let player_sword = reg.branch_belief(sword, s1, vec![], VersionOptions::default()).unwrap();
        reg.lock_state(s1).unwrap();

        assert_eq!(reg.get_trait(player_sword, s1, weight).unwrap(), Resolved::Value(TraitValue::Int(5)));
    }

    #[test]
    fn rejects_unpermitted_slot() {
        let mut reg = Registries::new();
        let (item, _weight) = setup_weight(&mut reg);
        let other_tt = reg
            .register_traittype(TraitTypeDef {
                label: "color".into(),
                base_kind: BaseKind::Primitive,
                container: Container::Scalar,
                composable: false,
            })
            .unwrap();
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let err = reg
            .create_belief(
                s0,
                BeliefTemplate {
                    subject: None,
                    bases: vec![BaseRef::Archetype(item)],
                    traits: vec![(other_tt, TraitInput::Value(TraitValue::from("red")))],
                    promotable: false,
                    label: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::SlotViolation { .. }));
    }

    #[test]
    fn rejects_direct_reference_to_another_minds_subject() {
        let mut reg = Registries::new();
        let holder = reg
            .register_archetype(ArchetypeDef { label: "Holder".into(), base_labels: vec![], own_slots: vec![], own_defaults: vec![] })
            .unwrap();
        let owner_tt = reg
            .register_traittype(TraitTypeDef {
                label: "owner".into(),
                base_kind: BaseKind::SubjectOf(holder),
                container: Container::Scalar,
                composable: false,
            })
            .unwrap();
        let container = reg
            .register_archetype(ArchetypeDef { label: "Container".into(), base_labels: vec![], own_slots: vec![owner_tt], own_defaults: vec![] })
            .unwrap();

        let other_mind = reg.create_mind(None, None, false).unwrap();
        let foreign_subject = reg.get_or_create_subject(Some(other_mind), None).unwrap();

        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let err = reg
            .create_belief(
                s0,
                BeliefTemplate {
                    subject: None,
                    bases: vec![BaseRef::Archetype(container)],
                    traits: vec![(owner_tt, TraitInput::Value(TraitValue::Subject(foreign_subject)))],
                    promotable: false,
                    label: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::CrossMindMisuse(sid) if sid == foreign_subject));
    }
}
