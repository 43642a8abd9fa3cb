//! Trait resolution (spec §4.4-§4.8, §4.10): the single-point and
//! composable `get_trait` algorithms, reverse lookup, and the handful of
//! read helpers (`get_belief_by_subject`) that need to understand
//! Convergence/Union polymorphism.

use hashbrown::HashMap;
use hashbrown::HashSet;

use crate::archetype::{BaseKind, Container};
use crate::belief::{BaseRef, Promotion};
use crate::error::Result;
use crate::ids::{BeliefId, StateId, SubjectId, TraitTypeId};
use crate::registry::Registries;
use crate::state::{State, StateKind};
use crate::value::{Alternative, Resolved, TraitValue, Uncertain};

impl Registries {
    /// `get_trait(belief, state, traittype)` (spec §4.4 / §4.5). Dispatches
    /// to the composable variant when the traittype is declared composable.
    pub fn get_trait(&mut self, belief_id: BeliefId, state_id: StateId, tt: TraitTypeId) -> Result<Resolved> {
        if self.types.traittype(tt)?.composable {
            return self.get_trait_composable(belief_id, state_id, tt);
        }

        // step 1: resolution short-circuit
        if let Some(v) = self.resolution_override(belief_id, state_id, tt)? {
            return Ok(Resolved::Value(v));
        }

        // step 2: cache probe
        let current_epoch = self.promotion_epoch;
        {
            let belief = self.belief(belief_id)?;
            let state = self.state(state_id)?;
            if belief.locked && state.locked && belief.cache_epoch == current_epoch {
                if let Some(cached) = belief.cache.get(&tt) {
                    return Ok(cached.clone());
                }
            }
        }

        let mut deps: HashSet<BeliefId> = HashSet::new();
        let resolved = self.resolve_trait_uncached(belief_id, state_id, tt, &mut deps)?;

        let belief_locked = self.belief(belief_id)?.locked;
        let state_locked = self.state(state_id)?.locked;
        if belief_locked && state_locked {
            self.write_cache(belief_id, tt, resolved.clone(), deps, current_epoch);
        }
        Ok(resolved)
    }

    /// Every permitted slot on `belief`, resolved at `state` (spec §4.9).
    /// A belief that adds nothing of its own over a single already-`_cached_all`
    /// base can hoist that base's full cache instead of re-walking every slot.
    pub fn get_traits(&mut self, belief_id: BeliefId, state_id: StateId) -> Result<HashMap<TraitTypeId, Resolved>> {
        if let Some(hoisted) = self.cached_all_hoist(belief_id, state_id)? {
            return Ok(hoisted);
        }

        let slots = self.get_slots(belief_id)?;
        let mut out = HashMap::new();
        for tt in slots {
            out.insert(tt, self.get_trait(belief_id, state_id, tt)?);
        }
        let belief_locked = self.belief(belief_id)?.locked;
        let state_locked = self.state(state_id)?.locked;
        if belief_locked && state_locked {
            self.beliefs.get_mut(&belief_id).unwrap().cached_all = true;
        }
        Ok(out)
    }

    /// `_cached_all` hoist (spec §4.9): when `belief` is locked, contributes
    /// no own traits, and inherits wholesale from a single base belief that
    /// itself already reports `cached_all` at the current epoch, adopt that
    /// base's full cache rather than re-iterating `belief`'s own slot set.
    /// Returns `None` when any of those conditions fail, so the caller falls
    /// back to the brute-force per-slot walk.
    fn cached_all_hoist(&mut self, belief_id: BeliefId, state_id: StateId) -> Result<Option<HashMap<TraitTypeId, Resolved>>> {
        if !self.belief(belief_id)?.locked || !self.state(state_id)?.locked {
            return Ok(None);
        }
        let base_id = {
            let belief = self.belief(belief_id)?;
            if belief.promotable || !belief.traits.is_empty() || belief.bases.len() != 1 {
                return Ok(None);
            }
            match belief.bases[0] {
                BaseRef::Belief(bid) => bid,
                BaseRef::Archetype(_) => return Ok(None),
            }
        };
        let current_epoch = self.promotion_epoch;
        let (hoistable, cache, mut deps) = {
            let base = self.belief(base_id)?;
            (
                base.cached_all && base.locked && base.cache_epoch == current_epoch,
                base.cache.clone(),
                base.cache_deps.clone(),
            )
        };
        if !hoistable {
            return Ok(None);
        }
        deps.insert(base_id);
        for d in &deps {
            if let Some(dep_belief) = self.beliefs.get_mut(d) {
                dep_belief.dependents.insert(belief_id);
            }
        }
        let b = self.beliefs.get_mut(&belief_id).unwrap();
        b.cache = cache.clone();
        b.cache_deps = deps;
        b.cache_epoch = current_epoch;
        b.cached_all = true;
        Ok(Some(cache))
    }

    /// Steps 3-6 of §4.4: promotion layer (checked first so a promotable
    /// belief's alternatives take precedence over its frozen own value,
    /// per the "(after promotion wrap, below)" qualifier on step 3), own
    /// value with null-shadowing, base walk returning the first non-null
    /// candidate, and the final archetype-default fallback.
    fn resolve_trait_uncached(
        &mut self,
        belief_id: BeliefId,
        state_id: StateId,
        tt: TraitTypeId,
        deps: &mut HashSet<BeliefId>,
    ) -> Result<Resolved> {
        if self.belief(belief_id)?.promotable {
            if let Some(resolved) = self.promotion_layer(belief_id, state_id, tt, deps)? {
                return Ok(resolved);
            }
        }

        if let Some(v) = self.belief(belief_id)?.traits.get(&tt).cloned() {
            return Ok(Resolved::Value(v));
        }

        let bases = self.belief(belief_id)?.bases.clone();
        if self.types.traittype(tt)?.base_kind == BaseKind::Mind {
            if let Some(resolved) = self.resolve_mind_bases(belief_id, &bases, state_id, tt, deps)? {
                return Ok(resolved);
            }
        } else {
            for b in bases.iter() {
                if let Some(resolved) = self.base_candidate(*b, state_id, tt, deps)? {
                    if !matches!(resolved.as_value(), Some(TraitValue::Null)) {
                        return Ok(resolved);
                    }
                }
            }
        }

        for aid in self.get_archetypes(belief_id)? {
            if let Some(v) = self.types.default_value(aid, tt)?.cloned() {
                return Ok(Resolved::Value(v));
            }
        }
        Ok(Resolved::Value(TraitValue::Null))
    }

    fn base_candidate(
        &mut self,
        base: BaseRef,
        state_id: StateId,
        tt: TraitTypeId,
        deps: &mut HashSet<BeliefId>,
    ) -> Result<Option<Resolved>> {
        match base {
            BaseRef::Archetype(aid) => Ok(self.types.default_value(aid, tt)?.cloned().map(Resolved::Value)),
            BaseRef::Belief(bid) => {
                deps.insert(bid);
                Ok(Some(self.get_trait(bid, state_id, tt)?))
            }
        }
    }

    /// §4.6: a Mind-valued slot's base walk, generalized beyond first-match.
    /// A single base contributing a mind resolves exactly as any other
    /// slot would; when more than one base contributes a (distinct) mind,
    /// the core builds a union mind-state spanning all of them instead of
    /// picking a winner.
    fn resolve_mind_bases(
        &mut self,
        belief_id: BeliefId,
        bases: &[BaseRef],
        state_id: StateId,
        tt: TraitTypeId,
        deps: &mut HashSet<BeliefId>,
    ) -> Result<Option<Resolved>> {
        let mut minds = Vec::new();
        for b in bases {
            if let Some(resolved) = self.base_candidate(*b, state_id, tt, deps)? {
                if let Some(TraitValue::Mind(m)) = resolved.as_value() {
                    if !minds.contains(m) {
                        minds.push(*m);
                    }
                }
            }
        }
        match minds.len() {
            0 => Ok(None),
            1 => Ok(Some(Resolved::Value(TraitValue::Mind(minds[0])))),
            _ => {
                let component_states: Vec<StateId> =
                    minds.iter().filter_map(|m| self.latest_locked_state(*m)).collect();
                if component_states.is_empty() {
                    return Ok(Some(Resolved::Value(TraitValue::Mind(minds[0]))));
                }
                let host = self.belief(belief_id)?.in_mind;
                let union = self.union_mind(host, component_states)?;
                Ok(Some(Resolved::Value(TraitValue::Mind(union))))
            }
        }
    }

    /// Collect promotions visible at `state` (branch-reachable, and within
    /// the tt window for temporal minds), and fold them per the tie-break
    /// rules in spec §4.4.
    fn promotion_layer(
        &mut self,
        belief_id: BeliefId,
        state_id: StateId,
        tt: TraitTypeId,
        deps: &mut HashSet<BeliefId>,
    ) -> Result<Option<Resolved>> {
        let promotions = self.belief(belief_id)?.promotions.clone();
        if promotions.is_empty() {
            return Ok(None);
        }
        let query_tt = self.state(state_id)?.tt;

        let mut visible: Vec<Promotion> = Vec::new();
        for p in promotions {
            let origin = self.belief(p.belief)?.origin_state;
            if !self.is_ancestor_or_self(origin, state_id) {
                continue;
            }
            if let (Some(q), Some(o)) = (query_tt, self.state(origin)?.tt) {
                if o > q {
                    continue;
                }
            }
            visible.push(p);
        }
        if visible.is_empty() {
            return Ok(None);
        }

        let with_certainty: Vec<Promotion> = visible.iter().filter(|p| p.certainty.is_some()).cloned().collect();
        if !with_certainty.is_empty() {
            let mut alts = Vec::with_capacity(with_certainty.len());
            for p in &with_certainty {
                let v = self.promotion_contribution(p.belief, state_id, tt, deps)?;
                alts.push(Alternative { value: v, certainty: p.certainty });
            }
            return Ok(Some(Resolved::Uncertain(Uncertain::new(alts))));
        }

        // Temporal promotions without certainty: greatest origin tt wins;
        // ties (including the timeless case, where both sides are `None`)
        // broken by ascending BeliefId (spec §9 open question 2).
        let mut chosen: Option<Promotion> = None;
        let mut chosen_tt: Option<i64> = None;
        for p in &visible {
            let origin_tt = self.state(self.belief(p.belief)?.origin_state)?.tt;
            let better = match &chosen {
                None => true,
                Some(c) => match origin_tt.cmp(&chosen_tt) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Equal => p.belief < c.belief,
                    std::cmp::Ordering::Less => false,
                },
            };
            if better {
                chosen = Some(p.clone());
                chosen_tt = origin_tt;
            }
        }
        let Some(chosen) = chosen else { return Ok(None) };
        let v = self.promotion_contribution(chosen.belief, state_id, tt, deps)?;
        Ok(Some(Resolved::Value(v)))
    }

    /// A promotion's own direct value for `tt`, or — if it lacks the slot
    /// — the recursive resolution into the promotion belief (spec §4.4:
    /// "a promotion chain is resolved transitively"). An inner Uncertain
    /// result is flattened to its null default: nesting an Uncertain
    /// inside another alternative's value isn't representable by
    /// `TraitValue` and the six canonical scenarios never exercise it.
    fn promotion_contribution(
        &mut self,
        promotion_belief: BeliefId,
        state_id: StateId,
        tt: TraitTypeId,
        deps: &mut HashSet<BeliefId>,
    ) -> Result<TraitValue> {
        deps.insert(promotion_belief);
        if let Some(v) = self.belief(promotion_belief)?.traits.get(&tt).cloned() {
            return Ok(v);
        }
        let resolved = self.get_trait(promotion_belief, state_id, tt)?;
        Ok(resolved.as_value().cloned().unwrap_or(TraitValue::Null))
    }

    fn write_cache(&mut self, belief_id: BeliefId, tt: TraitTypeId, value: Resolved, deps: HashSet<BeliefId>, epoch: u64) {
        for d in &deps {
            if let Some(dep_belief) = self.beliefs.get_mut(d) {
                dep_belief.dependents.insert(belief_id);
            }
        }
        let belief = self.beliefs.get_mut(&belief_id).unwrap();
        belief.cache.insert(tt, value);
        belief.cache_deps.extend(deps);
        belief.cache_epoch = epoch;
    }

    /// Composable resolution (spec §4.5): pre-order base-DAG accumulation
    /// merged by container discipline instead of first-match.
    fn get_trait_composable(&mut self, belief_id: BeliefId, state_id: StateId, tt: TraitTypeId) -> Result<Resolved> {
        let container = self.types.traittype(tt)?.container;
        let mut deps: HashSet<BeliefId> = HashSet::new();
        let mut seq: Vec<TraitValue> = Vec::new();
        let mut set: Vec<TraitValue> = Vec::new();
        let mut certainty_alts: Vec<Alternative> = Vec::new();
        let mut seen = HashSet::new();

        self.collect_composable(belief_id, state_id, tt, &mut deps, &mut seq, &mut set, &mut certainty_alts, &mut seen)?;

        if !certainty_alts.is_empty() {
            return Ok(Resolved::Uncertain(Uncertain::new(certainty_alts)));
        }
        match container {
            Container::Set => {
                let mut out: Vec<TraitValue> = Vec::new();
                for v in set {
                    if !out.contains(&v) {
                        out.push(v);
                    }
                }
                Ok(Resolved::Value(TraitValue::Set(out)))
            }
            Container::Sequence | Container::Scalar => Ok(Resolved::Value(TraitValue::Sequence(seq))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_composable(
        &mut self,
        belief_id: BeliefId,
        state_id: StateId,
        tt: TraitTypeId,
        deps: &mut HashSet<BeliefId>,
        seq: &mut Vec<TraitValue>,
        set: &mut Vec<TraitValue>,
        certainty_alts: &mut Vec<Alternative>,
        seen: &mut HashSet<BeliefId>,
    ) -> Result<()> {
        if !seen.insert(belief_id) {
            return Ok(());
        }

        if let Some(v) = self.belief(belief_id)?.traits.get(&tt).cloned() {
            if v.is_null() {
                return Ok(()); // null contribution prunes this subtree
            }
            push_contribution(v, seq, set);
        }

        if self.belief(belief_id)?.promotable {
            if let Some(resolved) = self.promotion_layer(belief_id, state_id, tt, deps)? {
                match resolved {
                    Resolved::Value(v) => push_contribution(v, seq, set),
                    Resolved::Uncertain(u) => certainty_alts.extend(u.alternatives),
                }
            }
        }

        let bases = self.belief(belief_id)?.bases.clone();
        for b in bases {
            match b {
                BaseRef::Archetype(aid) => {
                    if let Some(v) = self.types.default_value(aid, tt)?.cloned() {
                        if !v.is_null() {
                            push_contribution(v, seq, set);
                        }
                    }
                }
                BaseRef::Belief(bid) => {
                    deps.insert(bid);
                    self.collect_composable(bid, state_id, tt, deps, seq, set, certainty_alts, seen)?;
                }
            }
        }
        Ok(())
    }

    /// Step 1 of §4.4: walk `state` and its ancestors looking for a
    /// belief-level resolution registered against `belief.subject`. The
    /// nearest (smallest-distance) registered resolution wins.
    fn resolution_override(&self, belief_id: BeliefId, state_id: StateId, tt: TraitTypeId) -> Result<Option<TraitValue>> {
        let subject = self.belief(belief_id)?.subject;
        for s in self.ancestor_states_nearest_first(state_id) {
            if let Some(&resolver) = self.subject(subject)?.resolutions.get(&s) {
                return Ok(self.belief(resolver)?.traits.get(&tt).cloned());
            }
        }
        Ok(None)
    }

    /// BFS over `State::base`/`component_states`, nearest first. General
    /// enough to walk Plain chains and fan out through Convergence/Union
    /// states, used by both resolution lookup and promotion visibility.
    pub(crate) fn ancestor_states_nearest_first(&self, state_id: StateId) -> Vec<StateId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![state_id];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for cur in frontier {
                if !seen.insert(cur) {
                    continue;
                }
                out.push(cur);
                if let Ok(s) = self.state(cur) {
                    if let Some(b) = s.base() {
                        next.push(b);
                    }
                    for c in s.component_states() {
                        next.push(*c);
                    }
                }
            }
            frontier = next;
        }
        out
    }

    /// `rev_trait(subject, state, traittype)` (spec §4.10): the set of
    /// beliefs visible at `state` whose *own* traits reference `subject`
    /// via `tt`, walking the reverse-index worklist and lazily
    /// backfilling skip pointers for runs of unchanged Plain states.
    ///
    /// Known limitation (spec §9, policy choice (c)): references that
    /// arise purely through inheritance — where the referencing belief's
    /// own `_traits` never set the slot — are not recorded in `_rev_add`
    /// and so are absent here. Materializing them eagerly would make
    /// `_set_trait` pay for every archetype/base fan-out; this crate
    /// accepts the documented under-report instead.
    pub fn rev_trait(&mut self, subject: SubjectId, state_id: StateId, tt: TraitTypeId) -> Result<HashSet<BeliefId>> {
        let key = (subject, tt);
        let mut result: HashSet<BeliefId> = HashSet::new();
        let mut removed: HashSet<BeliefId> = HashSet::new();
        let mut visited = HashSet::new();
        let mut worklist = vec![state_id];
        let mut pending_skip_sources: Vec<StateId> = Vec::new();

        while let Some(s) = worklist.pop() {
            if !visited.insert(s) {
                continue;
            }
            let has_entry = {
                let state = self.state(s)?;
                state.rev_add.contains_key(&key) || state.rev_del.contains_key(&key)
            };

            if has_entry {
                if let Some(added) = self.state(s)?.rev_add.get(&key).cloned() {
                    result.extend(added);
                }
                if let Some(deleted) = self.state(s)?.rev_del.get(&key).cloned() {
                    removed.extend(deleted);
                }
                for src in pending_skip_sources.drain(..) {
                    self.states.get_mut(&src).unwrap().skip.insert(key, s);
                }
            } else if matches!(self.state(s)?.kind, StateKind::Plain { .. }) {
                pending_skip_sources.push(s);
            }

            for next in self.state(s)?.rev_base(key) {
                worklist.push(next);
            }
        }

        for r in &removed {
            result.remove(r);
        }
        Ok(result)
    }

    /// `get_belief_by_subject` (spec §4.7): the live version of `subject`
    /// visible at `state`, following first-wins discipline through
    /// Convergence/Union polymorphism and any registered timeline
    /// resolution. Linear in the size of each state's insert/remove sets
    /// — acceptable here since the spec does not call for an additional
    /// per-state subject index alongside the reverse trait index.
    pub fn get_belief_by_subject(&self, state_id: StateId, subject: SubjectId) -> Result<Option<BeliefId>> {
        self.belief_by_subject_at(state_id, subject, state_id)
    }

    fn belief_by_subject_at(&self, state_id: StateId, subject: SubjectId, query_root: StateId) -> Result<Option<BeliefId>> {
        let state = self.state(state_id)?;
        match &state.kind {
            StateKind::Convergence { component_states } => {
                if let Some(chosen) = self.convergence_override(state_id, query_root) {
                    return self.belief_by_subject_at(chosen, subject, query_root);
                }
                for c in component_states {
                    if let Some(b) = self.belief_by_subject_at(*c, subject, query_root)? {
                        return Ok(Some(b));
                    }
                }
                Ok(None)
            }
            StateKind::Union { component_states } => {
                for c in component_states {
                    if let Some(b) = self.belief_by_subject_at(*c, subject, query_root)? {
                        return Ok(Some(b));
                    }
                }
                Ok(None)
            }
            StateKind::Plain { .. } => {
                let mut cur = Some(state_id);
                while let Some(s) = cur {
                    let st = self.state(s)?;
                    if let Some(b) = self.belief_for_subject_in(st, subject) {
                        return Ok(Some(b));
                    }
                    if self.removed_subject_in(st, subject) {
                        return Ok(None);
                    }
                    cur = st.base();
                }
                Ok(None)
            }
        }
    }

    fn belief_for_subject_in(&self, state: &State, subject: SubjectId) -> Option<BeliefId> {
        state
            .inserted()
            .find(|b| self.belief(*b).map(|belief| belief.subject == subject).unwrap_or(false))
    }

    fn removed_subject_in(&self, state: &State, subject: SubjectId) -> bool {
        state
            .removed()
            .any(|b| self.belief(b).map(|belief| belief.subject == subject).unwrap_or(false))
    }
}

fn push_contribution(v: TraitValue, seq: &mut Vec<TraitValue>, set: &mut Vec<TraitValue>) {
    match v {
        TraitValue::Sequence(items) => {
            for item in items {
                if !seq.contains(&item) {
                    seq.push(item);
                }
            }
        }
        TraitValue::Set(items) => {
            for item in items {
                if !set.contains(&item) {
                    set.push(item);
                }
            }
        }
        other => {
            seq.push(other.clone());
            set.push(other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::{ArchetypeDef, BaseKind, TraitTypeDef};
    use crate::belief::{BeliefTemplate, TraitInput, VersionOptions};
    use crate::state::StateOptions;

    fn weight_setup(reg: &mut Registries) -> (crate::ids::ArchetypeId, TraitTypeId) {
        let weight = reg
            .register_traittype(TraitTypeDef { label: "weight".into(), base_kind: BaseKind::Primitive, container: Container::Scalar, composable: false })
            .unwrap();
        let item = reg
            .register_archetype(ArchetypeDef { label: "Item".into(), base_labels: vec![], own_slots: vec![weight], own_defaults: vec![(weight, TraitValue::Int(1))] })
            .unwrap();
        (item, weight)
    }

    #[test]
    fn inherits_archetype_default_when_unset() {
        let mut reg = Registries::new();
        let (item, weight) = weight_setup(&mut reg);
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let rock = reg
            .create_belief(s0, BeliefTemplate { subject: None, bases: vec![BaseRef::Archetype(item)], traits: vec![], promotable: false, label: None })
            .unwrap();
        reg.lock_state(s0).unwrap();
        assert_eq!(reg.get_trait(rock, s0, weight).unwrap(), Resolved::Value(TraitValue::Int(1)));
    }

    #[test]
    fn explicit_null_shadows_base() {
        let mut reg = Registries::new();
        let (item, weight) = weight_setup(&mut reg);
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let feather = reg
            .create_belief(
                s0,
                BeliefTemplate {
                    subject: None,
                    bases: vec![BaseRef::Archetype(item)],
                    traits: vec![(weight, TraitInput::Value(TraitValue::Null))],
                    promotable: false,
                    label: None,
                },
            )
            .unwrap();
        reg.lock_state(s0).unwrap();
        assert_eq!(reg.get_trait(feather, s0, weight).unwrap(), Resolved::Value(TraitValue::Null));
    }

    #[test]
    fn probability_promotion_yields_uncertain() {
        let mut reg = Registries::new();
        let location = reg
            .register_traittype(TraitTypeDef { label: "location".into(), base_kind: BaseKind::Primitive, container: Container::Scalar, composable: false })
            .unwrap();
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
        let merchant = reg
            .create_belief(s0, BeliefTemplate { subject: None, bases: vec![], traits: vec![], promotable: true, label: None })
            .unwrap();
        reg.lock_state(s0).unwrap();

        let s1 = reg.branch_state(s0, StateOptions::default()).unwrap();
        reg.branch_belief(
            merchant,
            s1,
            vec![(location, TraitInput::Value(TraitValue::from("shop")))],
            VersionOptions { promote: true, certainty: Some(0.6), resolution: None },
        )
        .unwrap();
        reg.branch_belief(
            merchant,
            s1,
            vec![(location, TraitInput::Value(TraitValue::from("inn")))],
            VersionOptions { promote: true, certainty: Some(0.4), resolution: None },
        )
        .unwrap();
        reg.lock_state(s1).unwrap();

        let resolved = reg.get_trait(merchant, s1, location).unwrap();
        let uncertain = resolved.as_uncertain().unwrap();
        assert_eq!(uncertain.alternatives.len(), 2);
        assert!((uncertain.total_certainty() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn multiple_mind_bases_construct_a_union_state() {
        let mut reg = Registries::new();
        let world = reg
            .register_traittype(TraitTypeDef { label: "world".into(), base_kind: BaseKind::Mind, container: Container::Scalar, composable: false })
            .unwrap();
        let agent = reg
            .register_archetype(ArchetypeDef { label: "Agent".into(), base_labels: vec![], own_slots: vec![world], own_defaults: vec![] })
            .unwrap();
        let eidos = reg.eidos();
        let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();

        let mind_a = reg.create_mind(None, None, false).unwrap();
        let state_a = reg.create_state(mind_a, StateOptions::default()).unwrap();
        reg.lock_state(state_a).unwrap();

        let mind_b = reg.create_mind(None, None, false).unwrap();
        let state_b = reg.create_state(mind_b, StateOptions::default()).unwrap();
        reg.lock_state(state_b).unwrap();

        let a = reg
            .create_belief(
                s0,
                BeliefTemplate {
                    subject: None,
                    bases: vec![BaseRef::Archetype(agent)],
                    traits: vec![(world, TraitInput::Value(TraitValue::Mind(mind_a)))],
                    promotable: false,
                    label: None,
                },
            )
            .unwrap();
        let b = reg
            .create_belief(
                s0,
                BeliefTemplate {
                    subject: None,
                    bases: vec![BaseRef::Archetype(agent)],
                    traits: vec![(world, TraitInput::Value(TraitValue::Mind(mind_b)))],
                    promotable: false,
                    label: None,
                },
            )
            .unwrap();
        reg.lock_state(s0).unwrap();

        let s1 = reg.branch_state(s0, StateOptions::default()).unwrap();
        let merged = reg
            .create_belief(
                s1,
                BeliefTemplate {
                    subject: None,
                    bases: vec![BaseRef::Belief(a), BaseRef::Belief(b)],
                    traits: vec![],
                    promotable: false,
                    label: None,
                },
            )
            .unwrap();

        let resolved = reg.get_trait(merged, s1, world).unwrap();
        let union_mind = resolved.as_value().and_then(|v| v.as_mind()).expect("expected a Mind value");
        assert_ne!(union_mind, mind_a);
        assert_ne!(union_mind, mind_b);

        let union_states = reg.mind(union_mind).unwrap().states().to_vec();
        assert_eq!(union_states.len(), 1);
        let union_state = reg.state(union_states[0]).unwrap();
        assert!(union_state.is_union());
        assert_eq!(union_state.component_states(), &[state_a, state_b]);
    }
}
