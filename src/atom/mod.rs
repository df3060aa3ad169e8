//! Core atom types for the heka engine.
//!
//! Atoms are the shared units of the hypergraph: a [`Node`](AtomBody::Node)
//! carries a name, a [`Link`](AtomBody::Link) an ordered sequence of handles
//! to other atoms. Both share a header of type code, truth value and
//! attention value. Atoms are owned by exactly one [`FactStore`] and referred
//! to through opaque [`Handle`]s.
//!
//! [`FactStore`]: crate::store::FactStore

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

pub mod types;

pub use types::AtomType;

/// Lookahead constant deriving confidence from evidence count:
/// `confidence = count / (count + K)`.
const CONFIDENCE_K: f32 = 800.0;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Process-unique generation counter identifying one fact store.
///
/// Uses `NonZeroU32` so that `Option<StoreId>`-shaped layouts stay compact,
/// mirroring the niche optimization on arena slots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct StoreId(pub(crate) NonZeroU32);

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of an atom: the owning store's generation counter plus the
/// atom's arena slot.
///
/// A handle is a weak lookup, not an owning reference — resolving it through a
/// store whose ancestry does not include the owner simply fails. Handles from
/// dropped temporary stores dangle harmlessly for the same reason.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Handle {
    pub(crate) store: StoreId,
    pub(crate) slot: u32,
}

impl Handle {
    /// The generation counter of the owning store.
    pub fn store_id(self) -> StoreId {
        self.store
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h:{}.{}", self.store, self.slot)
    }
}

// ---------------------------------------------------------------------------
// Truth and attention values
// ---------------------------------------------------------------------------

/// Per-atom `(mean, count, confidence)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    /// Strength of the assertion in `[0, 1]`.
    pub mean: f32,
    /// Amount of evidence backing the assertion.
    pub count: f32,
    /// Confidence in `[0, 1)`, normally derived from `count`.
    pub confidence: f32,
}

impl TruthValue {
    /// Create a truth value with confidence derived from the evidence count.
    pub fn new(mean: f32, count: f32) -> Self {
        Self {
            mean,
            count,
            confidence: count / (count + CONFIDENCE_K),
        }
    }

    /// Create a truth value with an explicit confidence.
    pub fn with_confidence(mean: f32, count: f32, confidence: f32) -> Self {
        Self {
            mean,
            count,
            confidence,
        }
    }

    /// Scalar fitness favoring high mean and high count, used by
    /// fitness-based source selection.
    pub fn fitness(&self) -> f32 {
        self.mean * self.confidence
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self {
            mean: 1.0,
            count: 0.0,
            confidence: 0.0,
        }
    }
}

/// Per-atom attention bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttentionValue {
    /// Short-term importance, used by STI-based source selection.
    pub sti: i32,
    /// Long-term importance.
    pub lti: i32,
}

impl AttentionValue {
    pub fn new(sti: i32, lti: i32) -> Self {
        Self { sti, lti }
    }
}

// ---------------------------------------------------------------------------
// Atoms
// ---------------------------------------------------------------------------

/// The body union of an atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AtomBody {
    /// Atomic: carries a name.
    Node { name: String },
    /// Composite: carries an ordered sequence of handles.
    Link { outgoing: Vec<Handle> },
}

/// A unit of the hypergraph: shared header plus a node or link body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub atom_type: AtomType,
    pub body: AtomBody,
    pub tv: TruthValue,
    pub av: AttentionValue,
}

impl Atom {
    /// Build a named atom.
    pub fn node(atom_type: AtomType, name: impl Into<String>) -> Self {
        Self {
            atom_type,
            body: AtomBody::Node { name: name.into() },
            tv: TruthValue::default(),
            av: AttentionValue::default(),
        }
    }

    /// Build a composite atom over the given outgoing set.
    pub fn link(atom_type: AtomType, outgoing: Vec<Handle>) -> Self {
        Self {
            atom_type,
            body: AtomBody::Link { outgoing },
            tv: TruthValue::default(),
            av: AttentionValue::default(),
        }
    }

    /// Attach a truth value.
    pub fn with_tv(mut self, tv: TruthValue) -> Self {
        self.tv = tv;
        self
    }

    /// Attach an attention value.
    pub fn with_av(mut self, av: AttentionValue) -> Self {
        self.av = av;
        self
    }

    /// The name, for node bodies.
    pub fn name(&self) -> Option<&str> {
        match &self.body {
            AtomBody::Node { name } => Some(name),
            AtomBody::Link { .. } => None,
        }
    }

    /// The outgoing set; empty for node bodies.
    pub fn outgoing(&self) -> &[Handle] {
        match &self.body {
            AtomBody::Node { .. } => &[],
            AtomBody::Link { outgoing } => outgoing,
        }
    }

    /// Number of atoms in the outgoing set.
    pub fn arity(&self) -> usize {
        self.outgoing().len()
    }

    /// Whether this atom is a pattern variable.
    pub fn is_variable(&self) -> bool {
        self.atom_type == AtomType::VariableNode
    }
}
