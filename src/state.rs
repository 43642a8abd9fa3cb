//! State: a point in a mind's history (spec §3 "State", §4.6, §4.7, §4.10, §4.11).

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{BeliefId, MindId, StateId, SubjectId, TraitTypeId};
use crate::mind::MindKind;
use crate::registry::Registries;

/// What kind of state this is: a plain branch point, a merged view over
/// several parallel branches (Convergence), or the live union of several
/// nested-mind component states (Union mind-state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StateKind {
    Plain { base: Option<StateId> },
    Convergence { component_states: Vec<StateId> },
    Union { component_states: Vec<StateId> },
}

/// A point in a mind's history (spec §3). `insert`/`remove` are the
/// differential belief sets local to this state; `_rev_add`/`_rev_del` are
/// the per-state reverse indices; `skip` is the lazily-built sparse-chain
/// pointer table (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub in_mind: MindId,
    pub kind: StateKind,
    pub ground_state: Option<StateId>,
    pub tt: Option<i64>,
    pub locked: bool,
    pub(crate) insert: HashSet<BeliefId>,
    pub(crate) remove: HashSet<BeliefId>,
    pub(crate) rev_add: HashMap<(SubjectId, TraitTypeId), HashSet<BeliefId>>,
    pub(crate) rev_del: HashMap<(SubjectId, TraitTypeId), HashSet<BeliefId>>,
    pub(crate) skip: HashMap<(SubjectId, TraitTypeId), StateId>,
    /// Timeline resolutions registered on a Convergence: descendant-state
    /// handle -> chosen sibling branch (spec §4.8).
    pub(crate) resolution_map: HashMap<StateId, StateId>,
}

impl State {
    pub fn base(&self) -> Option<StateId> {
        match &self.kind {
            StateKind::Plain { base } => *base,
            _ => None,
        }
    }

    pub fn component_states(&self) -> &[StateId] {
        match &self.kind {
            StateKind::Convergence { component_states } | StateKind::Union { component_states } => {
                component_states
            }
            StateKind::Plain { .. } => &[],
        }
    }

    pub fn is_convergence(&self) -> bool {
        matches!(self.kind, StateKind::Convergence { .. })
    }

    pub fn is_union(&self) -> bool {
        matches!(self.kind, StateKind::Union { .. })
    }

    pub fn inserted(&self) -> impl Iterator<Item = BeliefId> + '_ {
        self.insert.iter().copied()
    }

    pub fn removed(&self) -> impl Iterator<Item = BeliefId> + '_ {
        self.remove.iter().copied()
    }

    /// Polymorphic "next states to visit" for a `rev_trait` walk (spec
    /// §4.10 "Polymorphism"): Plain states return their skip pointer or
    /// base; Union states fan out into every component; a Convergence
    /// follows its first-wins component only, matching its general read
    /// discipline (not separately specified by spec §4.10, which only
    /// defines Plain and Union — this extension keeps `rev_trait` over a
    /// Convergence consistent with `get_belief_by_subject`'s first-wins
    /// rule rather than leaving it undefined).
    pub(crate) fn rev_base(&self, key: (SubjectId, TraitTypeId)) -> Vec<StateId> {
        match &self.kind {
            StateKind::Plain { base } => {
                if let Some(skip) = self.skip.get(&key) {
                    vec![*skip]
                } else if let Some(b) = base {
                    vec![*b]
                } else {
                    vec![]
                }
            }
            StateKind::Union { component_states } => component_states.clone(),
            StateKind::Convergence { component_states } => {
                component_states.first().copied().into_iter().collect()
            }
        }
    }
}

/// Options accepted by `create_state`/`branch`.
#[derive(Debug, Clone, Default)]
pub struct StateOptions {
    pub ground_state: Option<StateId>,
    pub tt: Option<i64>,
}

impl Registries {
    /// Create an origin state (no base) in `mind`.
    pub fn create_state(&mut self, mind: MindId, options: StateOptions) -> Result<StateId> {
        let mind_ref = self.mind(mind)?;
        if !mind_ref.temporal && options.tt.is_some() {
            return Err(Error::Fatal(format!("mind {mind} is timeless but a tt was supplied")));
        }
        let id = StateId(self.ids.next());
        let state = State {
            id,
            in_mind: mind,
            kind: StateKind::Plain { base: None },
            ground_state: options.ground_state,
            tt: options.tt,
            locked: false,
            insert: HashSet::new(),
            remove: HashSet::new(),
            rev_add: HashMap::new(),
            rev_del: HashMap::new(),
            skip: HashMap::new(),
            resolution_map: HashMap::new(),
        };
        self.states.insert(id, state);
        self.mind_mut(mind)?.states.push(id);
        tracing::debug!(state = id.0, mind = mind.0, "created origin state");
        Ok(id)
    }

    /// Branch from `base` into a new, unlocked state in the same mind.
    /// `base` need not be locked (an unlocked state may still be branched
    /// from, e.g. while staging); ground is inherited from `base` unless
    /// overridden.
    pub fn branch_state(&mut self, base: StateId, options: StateOptions) -> Result<StateId> {
        let base_state = self.state(base)?;
        let mind_id = base_state.in_mind;
        let mind_ref = self.mind(mind_id)?;

        let ground_state = options.ground_state.or(base_state.ground_state);

        let tt = if mind_ref.temporal {
            let new_tt = options.tt.ok_or_else(|| {
                Error::Fatal(format!("temporal mind {mind_id} requires a tt on branch"))
            })?;
            if let Some(base_tt) = base_state.tt {
                if new_tt <= base_tt {
                    return Err(Error::NonMonotonicTt { new: new_tt, base: base_tt });
                }
            }
            Some(new_tt)
        } else {
            if options.tt.is_some() {
                return Err(Error::TimelessMind(base));
            }
            None
        };

        let id = StateId(self.ids.next());
        let state = State {
            id,
            in_mind: mind_id,
            kind: StateKind::Plain { base: Some(base) },
            ground_state,
            tt,
            locked: false,
            insert: HashSet::new(),
            remove: HashSet::new(),
            rev_add: HashMap::new(),
            rev_del: HashMap::new(),
            skip: HashMap::new(),
            resolution_map: HashMap::new(),
        };
        self.states.insert(id, state);
        self.mind_mut(mind_id)?.states.push(id);
        tracing::debug!(state = id.0, base = base.0, "branched state");
        Ok(id)
    }

    /// Construct a Convergence state merging several parallel branches.
    /// `component_states` must be non-empty and share a mind.
    pub fn create_convergence(&mut self, mind: MindId, component_states: Vec<StateId>) -> Result<StateId> {
        if component_states.is_empty() {
            return Err(Error::Fatal("convergence requires at least one component state".into()));
        }
        for c in &component_states {
            self.state(*c)?;
        }
        let id = StateId(self.ids.next());
        let state = State {
            id,
            in_mind: mind,
            kind: StateKind::Convergence { component_states },
            ground_state: None,
            tt: None,
            locked: false,
            insert: HashSet::new(),
            remove: HashSet::new(),
            rev_add: HashMap::new(),
            rev_del: HashMap::new(),
            skip: HashMap::new(),
            resolution_map: HashMap::new(),
        };
        self.states.insert(id, state);
        self.mind_mut(mind)?.states.push(id);
        tracing::debug!(state = id.0, "created convergence");
        Ok(id)
    }

    /// Construct a Union mind-state: the live union of several nested-mind
    /// component states (spec §4.6), arising when a belief inherits a
    /// mind-valued slot from multiple bases.
    pub(crate) fn create_union_state(&mut self, mind: MindId, component_states: Vec<StateId>) -> Result<StateId> {
        let id = StateId(self.ids.next());
        let state = State {
            id,
            in_mind: mind,
            kind: StateKind::Union { component_states },
            ground_state: None,
            tt: None,
            locked: false,
            insert: HashSet::new(),
            remove: HashSet::new(),
            rev_add: HashMap::new(),
            rev_del: HashMap::new(),
            skip: HashMap::new(),
            resolution_map: HashMap::new(),
        };
        self.states.insert(id, state);
        self.mind_mut(mind)?.states.push(id);
        Ok(id)
    }

    /// A fresh, nameless Mind whose sole state is the Union of
    /// `component_states` (spec §4.6): when a belief inherits a Mind-valued
    /// slot from more than one base, the belief's own view of "its inner
    /// world" is this synthetic mind rather than any one base's mind.
    pub(crate) fn union_mind(&mut self, host: MindId, component_states: Vec<StateId>) -> Result<MindId> {
        let mind_id = self.create_mind(Some(host), None, false)?;
        self.create_union_state(mind_id, component_states)?;
        Ok(mind_id)
    }

    /// The most recently created locked state in `mind`, standing in for
    /// "that mind's state at `origin_state.tt`" (spec §4.6) when the
    /// component minds aren't mutually temporal-aligned: the last state a
    /// mind locked is its most current settled view.
    pub(crate) fn latest_locked_state(&self, mind: MindId) -> Option<StateId> {
        self.mind(mind)
            .ok()?
            .states()
            .iter()
            .rev()
            .find(|s| self.state(**s).map(|st| st.locked).unwrap_or(false))
            .copied()
    }

    /// Lock a state, idempotently, cascading per spec §4.11:
    /// 1. Mark the state locked.
    /// 2. Lock every belief this state inserted.
    /// 3. Fork+lock every nested mind-state reachable through a
    ///    Mind-valued trait held *directly* (not inherited) by a belief
    ///    locked in step 2.
    pub fn lock_state(&mut self, state_id: StateId) -> Result<()> {
        if self.state(state_id)?.locked {
            return Ok(());
        }
        self.states.get_mut(&state_id).unwrap().locked = true;
        tracing::debug!(state = state_id.0, "locking state");

        let inserted: Vec<BeliefId> = self.state(state_id)?.inserted().collect();
        for belief_id in inserted {
            self.lock_belief_cascade(belief_id, state_id)?;
        }
        Ok(())
    }

    /// Register a timeline resolution on a Convergence: for reads
    /// originating at or below `descendant_state`, "what actually
    /// happened" is `chosen_component_state`. Ancestry-scoped: never
    /// applies retroactively to states outside `descendant_state`'s own
    /// subtree.
    pub fn register_resolution(
        &mut self,
        convergence: StateId,
        descendant_state: StateId,
        chosen_component_state: StateId,
    ) -> Result<()> {
        {
            let conv = self.state(convergence)?;
            if !conv.locked {
                return Err(Error::ConvergenceNotLocked(convergence));
            }
            if !conv.component_states().contains(&chosen_component_state) {
                return Err(Error::NotAComponent(chosen_component_state));
            }
        }
        self.state(descendant_state)?;
        self.states
            .get_mut(&convergence)
            .unwrap()
            .resolution_map
            .insert(descendant_state, chosen_component_state);
        tracing::debug!(
            convergence = convergence.0,
            descendant = descendant_state.0,
            chosen = chosen_component_state.0,
            "registered timeline resolution"
        );
        Ok(())
    }

    /// Walk backward from `from` over Plain-state `base` pointers,
    /// collecting visited states nearest-first, stopping at (and
    /// including) the first Convergence encountered or at an origin.
    pub(crate) fn ancestor_chain_to_convergence(&self, from: StateId) -> Vec<StateId> {
        let mut chain = Vec::new();
        let mut cur = Some(from);
        while let Some(id) = cur {
            chain.push(id);
            let Ok(s) = self.state(id) else { break };
            if s.is_convergence() {
                break;
            }
            cur = s.base();
        }
        chain
    }

    /// For a query originating at `query_state`, determine whether a
    /// Convergence's resolution_map redirects reads to a single chosen
    /// component instead of the default first-wins fan-out (spec §4.8).
    pub(crate) fn convergence_override(
        &self,
        convergence: StateId,
        query_state: StateId,
    ) -> Option<StateId> {
        let conv = self.states.get(&convergence)?;
        let chain = self.ancestor_chain_to_convergence(query_state);
        for visited in &chain {
            if let Some(chosen) = conv.resolution_map.get(visited) {
                return Some(*chosen);
            }
        }
        None
    }

    pub fn state(&self, id: StateId) -> Result<&State> {
        self.states.get(&id).ok_or_else(|| Error::Fatal(format!("unknown state {id}")))
    }

    pub fn mind_is_eidos_or_below(&self, mind: MindId) -> Result<bool> {
        let mut cur = Some(mind);
        while let Some(id) = cur {
            let m = self.mind(id)?;
            if m.kind == MindKind::Eidos {
                return Ok(true);
            }
            cur = m.parent;
        }
        Ok(false)
    }
}
