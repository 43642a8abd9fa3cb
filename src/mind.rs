//! Mind hierarchy (spec §3 "Mind").
//!
//! Minds form a tree rooted at a singleton "logos". A distinguished
//! subtree "eidos" is the only region where Promotions are permitted
//! (invariant 7). Minds may be "timeless" (their states carry no
//! transaction time) or "temporal".

use serde::{Deserialize, Serialize};

use crate::ids::{MindId, StateId};

/// A mind's position in the distinguished-subtree taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MindKind {
    /// The singleton root of the mind tree.
    Logos,
    /// The distinguished universal-belief subtree under logos.
    Eidos,
    /// Any other mind — a particular's private or nested worldview.
    Ordinary,
}

/// A container owning particular subjects and the states of its history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mind {
    pub id: MindId,
    pub parent: Option<MindId>,
    pub label: Option<String>,
    pub kind: MindKind,
    pub temporal: bool,
    /// States created in this mind, in creation order.
    pub(crate) states: Vec<StateId>,
}

impl Mind {
    pub fn states(&self) -> &[StateId] {
        &self.states
    }
}
