//! # doxa — a versioned, inheriting, multi-perspective belief engine
//!
//! A store of facts ("beliefs") organized into time-indexed snapshots
//! ("states") owned by hierarchical containers ("minds"). Beliefs inherit
//! prototype-style from an ordered list of Archetype/Belief bases; states
//! version copy-on-write by branching; minds nest to model one mind's
//! view of another's beliefs; uncertainty is represented explicitly via
//! probabilistic alternatives ("promotions") rather than collapsed behind
//! null or an exception.
//!
//! ## Design principles
//!
//! 1. **Explicit context, no globals**: every mutating operation takes
//!    `&mut Registries` rather than reaching for shared, lock-guarded
//!    state.
//! 2. **Dense integer identity**: every entity kind — Subject, Archetype,
//!    TraitType, Mind, State, Belief — draws from one shared id stream.
//! 3. **Append-only history**: states and beliefs become permanently
//!    immutable on lock; branching, never mutation, is how history grows.
//! 4. **Uncertainty is a value, not an exception**: `Unknown` and
//!    `Uncertain` are first-class members of `TraitValue`/`Resolved`.
//!
//! ## Quick start
//!
//! ```
//! use doxa::archetype::{ArchetypeDef, BaseKind, Container, TraitTypeDef};
//! use doxa::belief::{BaseRef, BeliefTemplate};
//! use doxa::registry::Registries;
//! use doxa::state::StateOptions;
//!
//! let mut reg = Registries::new();
//! let weight = reg
//!     .register_traittype(TraitTypeDef {
//!         label: "weight".into(),
//!         base_kind: BaseKind::Primitive,
//!         container: Container::Scalar,
//!         composable: false,
//!     })
//!     .unwrap();
//! let item = reg
//!     .register_archetype(ArchetypeDef {
//!         label: "Item".into(),
//!         base_labels: vec![],
//!         own_slots: vec![weight],
//!         own_defaults: vec![],
//!     })
//!     .unwrap();
//!
//! let eidos = reg.eidos();
//! let s0 = reg.create_state(eidos, StateOptions::default()).unwrap();
//! let rock = reg
//!     .create_belief(s0, BeliefTemplate { subject: None, bases: vec![BaseRef::Archetype(item)], traits: vec![], promotable: false, label: None })
//!     .unwrap();
//! reg.lock_state(s0).unwrap();
//! ```

pub mod archetype;
pub mod belief;
pub mod error;
pub mod ids;
pub mod mind;
pub mod registry;
mod resolve;
pub mod serialize;
pub mod state;
pub mod subject;
pub mod value;

pub use archetype::{Archetype, ArchetypeDef, BaseKind, Container, TraitType, TraitTypeDef, TypeRegistry};
pub use belief::{BaseRef, Belief, BeliefTemplate, Promotion, TraitInput, VersionOptions};
pub use error::{Error, Result};
pub use ids::{ArchetypeId, BeliefId, IdSequence, MindId, StateId, SubjectId, TraitTypeId};
pub use mind::{Mind, MindKind};
pub use registry::Registries;
pub use serialize::{load, save_mind, Document};
pub use state::{State, StateKind, StateOptions};
pub use subject::Subject;
pub use value::{Alternative, Resolved, TraitValue, Uncertain};
