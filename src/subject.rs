//! Subject — a stable identity handle (spec §3 "Subject").

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::ids::{BeliefId, MindId, StateId, SubjectId};

/// A stable identity handle. Multiple `Belief` versions can share a
/// `Subject`; the subject denotes *what* something is, not any one of its
/// temporal/branch versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    /// The Mind that owns this subject, or `None` for a universal subject
    /// accessible from anywhere.
    pub mater: Option<MindId>,
    /// All Belief versions of this subject, in creation order.
    pub(crate) versions: Vec<BeliefId>,
    /// Belief-level resolutions (spec §4.8): the state in which a resolving
    /// Belief appears, mapped to that resolving Belief.
    pub(crate) resolutions: HashMap<StateId, BeliefId>,
}

impl Subject {
    pub fn new(id: SubjectId, mater: Option<MindId>) -> Self {
        Self {
            id,
            mater,
            versions: Vec::new(),
            resolutions: HashMap::new(),
        }
    }

    pub fn is_universal(&self) -> bool {
        self.mater.is_none()
    }

    pub fn versions(&self) -> &[BeliefId] {
        &self.versions
    }
}
