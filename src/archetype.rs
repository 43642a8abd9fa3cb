//! Archetype & Traittype registration (spec §4.2).
//!
//! Archetypes form a DAG; cycles are forbidden. Registration resolves each
//! base name to an already-registered archetype, computes the transitive
//! permitted-slot set, and records per-slot defaults.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{ArchetypeId, TraitTypeId};
use crate::value::TraitValue;

/// Container discipline for a traittype's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Scalar,
    Sequence,
    Set,
}

/// The base type a traittype's values must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseKind {
    Primitive,
    SubjectOf(ArchetypeId),
    Mind,
}

/// A named slot declaration (spec §3 "Traittype"). Identity is referential
/// (`TraitTypeId`, not the label) at runtime — two traittypes with the same
/// label can never coexist because `register` rejects label collisions,
/// but code must never compare traittypes by label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitType {
    pub id: TraitTypeId,
    pub label: String,
    pub base_kind: BaseKind,
    pub container: Container,
    pub composable: bool,
}

/// A request to register a new traittype, before an id has been assigned.
#[derive(Debug, Clone)]
pub struct TraitTypeDef {
    pub label: String,
    pub base_kind: BaseKind,
    pub container: Container,
    pub composable: bool,
}

/// A typing template (spec §3 "Archetype").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archetype {
    pub id: ArchetypeId,
    pub label: String,
    /// Ordered list of direct base archetypes.
    pub bases: Vec<ArchetypeId>,
    /// Slots permitted directly on this archetype (not transitively).
    pub own_slots: HashSet<TraitTypeId>,
    /// Default values declared directly on this archetype.
    pub own_defaults: HashMap<TraitTypeId, TraitValue>,
    /// Transitive permitted-slot set, computed once at registration time.
    pub(crate) permitted_slots: HashSet<TraitTypeId>,
}

impl Archetype {
    pub fn permits(&self, tt: TraitTypeId) -> bool {
        self.permitted_slots.contains(&tt)
    }
}

/// A request to register a new archetype, before an id has been assigned.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeDef {
    pub label: String,
    pub base_labels: Vec<String>,
    pub own_slots: Vec<TraitTypeId>,
    pub own_defaults: Vec<(TraitTypeId, TraitValue)>,
}

/// The archetype/traittype registry. Owned by `Registries` (spec §4.1).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TypeRegistry {
    pub(crate) archetypes: HashMap<ArchetypeId, Archetype>,
    pub(crate) archetype_by_label: HashMap<String, ArchetypeId>,
    pub(crate) traittypes: HashMap<TraitTypeId, TraitType>,
    pub(crate) traittype_by_label: HashMap<String, TraitTypeId>,
}

impl TypeRegistry {
    pub fn archetype(&self, id: ArchetypeId) -> Result<&Archetype> {
        self.archetypes.get(&id).ok_or(Error::UnknownArchetypeId(id))
    }

    pub fn traittype(&self, id: TraitTypeId) -> Result<&TraitType> {
        self.traittypes.get(&id).ok_or(Error::UnknownTraitTypeId(id))
    }

    pub fn archetype_by_label(&self, label: &str) -> Option<ArchetypeId> {
        self.archetype_by_label.get(label).copied()
    }

    pub fn traittype_by_label(&self, label: &str) -> Option<TraitTypeId> {
        self.traittype_by_label.get(label).copied()
    }

    /// Register a traittype, returning its freshly-allocated id.
    pub(crate) fn register_traittype(
        &mut self,
        id: TraitTypeId,
        def: TraitTypeDef,
    ) -> Result<TraitTypeId> {
        if self.traittype_by_label.contains_key(&def.label) {
            return Err(Error::LabelCollision(def.label));
        }
        let tt = TraitType {
            id,
            label: def.label.clone(),
            base_kind: def.base_kind,
            container: def.container,
            composable: def.composable,
        };
        self.traittype_by_label.insert(def.label, id);
        self.traittypes.insert(id, tt);
        tracing::debug!(traittype = id.0, "registered traittype");
        Ok(id)
    }

    /// Register an archetype, resolving its base labels and computing the
    /// transitive permitted-slot set. Fails on an unknown base or a cycle.
    pub(crate) fn register_archetype(
        &mut self,
        id: ArchetypeId,
        def: ArchetypeDef,
    ) -> Result<ArchetypeId> {
        if self.archetype_by_label.contains_key(&def.label) {
            return Err(Error::LabelCollision(def.label));
        }

        let mut bases = Vec::with_capacity(def.base_labels.len());
        for base_label in &def.base_labels {
            let base_id = self
                .archetype_by_label
                .get(base_label)
                .copied()
                .ok_or_else(|| Error::UnknownArchetype(base_label.clone()))?;
            bases.push(base_id);
        }

        let own_slots: HashSet<TraitTypeId> = def.own_slots.into_iter().collect();
        let own_defaults: HashMap<TraitTypeId, TraitValue> = def.own_defaults.into_iter().collect();

        let mut permitted_slots = own_slots.clone();
        for base_id in &bases {
            self.check_acyclic(*base_id, id)?;
            let base = self.archetype(*base_id)?;
            permitted_slots.extend(base.permitted_slots.iter().copied());
        }

        let archetype = Archetype {
            id,
            label: def.label.clone(),
            bases,
            own_slots,
            own_defaults,
            permitted_slots,
        };
        self.archetype_by_label.insert(def.label, id);
        self.archetypes.insert(id, archetype);
        tracing::debug!(archetype = id.0, "registered archetype");
        Ok(id)
    }

    /// DFS from `from` looking for `forbidden`; used to reject a base chain
    /// that would introduce a cycle back to the archetype being registered.
    fn check_acyclic(&self, from: ArchetypeId, forbidden: ArchetypeId) -> Result<()> {
        if from == forbidden {
            return Err(Error::ArchetypeCycle(
                self.archetypes
                    .get(&from)
                    .map(|a| a.label.clone())
                    .unwrap_or_else(|| from.to_string()),
            ));
        }
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if let Some(arch) = self.archetypes.get(&cur) {
                for b in &arch.bases {
                    if *b == forbidden {
                        return Err(Error::ArchetypeCycle(arch.label.clone()));
                    }
                    stack.push(*b);
                }
            }
        }
        Ok(())
    }

    /// Resolve the default value for `tt` along `archetype`'s transitive
    /// base DAG, pre-order first-found.
    pub(crate) fn default_value(
        &self,
        archetype: ArchetypeId,
        tt: TraitTypeId,
    ) -> Result<Option<&TraitValue>> {
        let mut stack = vec![archetype];
        let mut seen = HashSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            let arch = self.archetype(cur)?;
            if let Some(v) = arch.own_defaults.get(&tt) {
                return Ok(Some(v));
            }
            // push in reverse so the first base is processed first (DFS
            // with a stack needs this to preserve "first-found" order)
            for b in arch.bases.iter().rev() {
                stack.push(*b);
            }
        }
        Ok(None)
    }

    pub fn clear(&mut self) {
        self.archetypes.clear();
        self.archetype_by_label.clear();
        self.traittypes.clear();
        self.traittype_by_label.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdSequence;

    fn def(label: &str, bases: &[&str]) -> ArchetypeDef {
        ArchetypeDef {
            label: label.into(),
            base_labels: bases.iter().map(|s| s.to_string()).collect(),
            own_slots: vec![],
            own_defaults: vec![],
        }
    }

    #[test]
    fn rejects_unknown_base() {
        let seq = IdSequence::new();
        let mut reg = TypeRegistry::default();
        let id = ArchetypeId(seq.next());
        let err = reg.register_archetype(id, def("Tool", &["Missing"])).unwrap_err();
        assert!(matches!(err, Error::UnknownArchetype(_)));
    }

    #[test]
    fn rejects_label_collision() {
        let seq = IdSequence::new();
        let mut reg = TypeRegistry::default();
        reg.register_archetype(ArchetypeId(seq.next()), def("Tool", &[])).unwrap();
        let err = reg.register_archetype(ArchetypeId(seq.next()), def("Tool", &[])).unwrap_err();
        assert!(matches!(err, Error::LabelCollision(_)));
    }

    #[test]
    fn transitive_slots_accumulate() {
        let seq = IdSequence::new();
        let mut reg = TypeRegistry::default();
        let weight = TraitTypeId(seq.next());
        reg.register_traittype(
            weight,
            TraitTypeDef {
                label: "weight".into(),
                base_kind: BaseKind::Primitive,
                container: Container::Scalar,
                composable: false,
            },
        )
        .unwrap();

        let base_id = ArchetypeId(seq.next());
        reg.register_archetype(
            base_id,
            ArchetypeDef {
                label: "Item".into(),
                base_labels: vec![],
                own_slots: vec![weight],
                own_defaults: vec![],
            },
        )
        .unwrap();

        let tool_id = ArchetypeId(seq.next());
        reg.register_archetype(tool_id, def("Tool", &["Item"])).unwrap();

        assert!(reg.archetype(tool_id).unwrap().permits(weight));
    }
}
