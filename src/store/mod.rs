//! Arena-backed fact stores with structural interning and parent overlays.
//!
//! A [`FactStore`] owns its atoms in an append-only arena and hands out
//! [`Handle`]s as weak identities. Stores nest: a child constructed with
//! [`FactStore::with_parent`] resolves reads through its ancestors while all
//! writes stay local. The forward chainer leans on this for focus sets and
//! for the scratch stores that keep intermediate atoms out of sight of the
//! pattern matcher.
//!
//! Interning is structural: adding an atom equal to one already visible
//! returns the existing handle instead of allocating, so handle equality
//! within one store family doubles as structural equality. Atoms adopted from
//! an ancestor this way are recorded as members of the child, which is what
//! focus-set membership tests read.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::{DashMap, DashSet};

use crate::atom::{Atom, AtomBody, AtomType, Handle, StoreId};
use crate::error::{StoreError, StoreResult};

static NEXT_STORE_ID: AtomicU32 = AtomicU32::new(1);

fn next_store_id() -> StoreId {
    let raw = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);
    // Zero only after u32 wrap-around; clamp rather than panic.
    StoreId(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN))
}

/// Structural identity of an atom within one store family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InternKey {
    Node(AtomType, String),
    Link(AtomType, Vec<Handle>),
}

/// A collection of atoms with identity-based lookup and optional parent
/// nesting.
pub struct FactStore {
    id: StoreId,
    parent: Option<Arc<FactStore>>,
    arena: RwLock<Vec<Atom>>,
    intern: DashMap<InternKey, Handle>,
    /// Ancestor-owned handles adopted as members of this store.
    adopted: DashSet<Handle>,
}

impl FactStore {
    /// Create an empty, parentless store.
    pub fn new() -> Self {
        Self {
            id: next_store_id(),
            parent: None,
            arena: RwLock::new(Vec::new()),
            intern: DashMap::new(),
            adopted: DashSet::new(),
        }
    }

    /// Create a child store: reads cascade to `parent`, writes stay local.
    pub fn with_parent(parent: Arc<FactStore>) -> Self {
        Self {
            id: next_store_id(),
            parent: Some(parent),
            arena: RwLock::new(Vec::new()),
            intern: DashMap::new(),
            adopted: DashSet::new(),
        }
    }

    /// This store's generation counter.
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// The parent store, if any.
    pub fn parent(&self) -> Option<&Arc<FactStore>> {
        self.parent.as_ref()
    }

    /// Number of atoms owned locally (adopted members not included).
    pub fn len(&self) -> usize {
        self.arena.read().expect("fact store arena poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intern an atom, returning the handle of the structurally-equal atom if
    /// one is already visible here or through an ancestor.
    ///
    /// An atom found through an ancestor is adopted as a member of this store
    /// rather than copied; a locally-found atom gets its truth value merged by
    /// highest evidence count.
    pub fn add(&self, atom: Atom) -> StoreResult<Handle> {
        let key = self.intern_key(&atom)?;
        if let Some(existing) = self.lookup_visible(&key) {
            if existing.store == self.id {
                self.merge_tv(existing, &atom);
            } else {
                self.adopted.insert(existing);
            }
            return Ok(existing);
        }

        let canonical = self.canonicalize(atom)?;
        let mut arena = self.arena.write().expect("fact store arena poisoned");
        let handle = Handle {
            store: self.id,
            slot: arena.len() as u32,
        };
        arena.push(canonical);
        self.intern.insert(key, handle);
        Ok(handle)
    }

    /// Intern a named atom.
    pub fn add_node(&self, atom_type: AtomType, name: impl Into<String>) -> StoreResult<Handle> {
        self.add(Atom::node(atom_type, name))
    }

    /// Intern a composite atom over the given outgoing set.
    pub fn add_link(&self, atom_type: AtomType, outgoing: Vec<Handle>) -> StoreResult<Handle> {
        self.add(Atom::link(atom_type, outgoing))
    }

    /// Resolve a handle here or through an ancestor.
    pub fn get(&self, handle: Handle) -> Option<Atom> {
        if handle.store == self.id {
            let arena = self.arena.read().expect("fact store arena poisoned");
            return arena.get(handle.slot as usize).cloned();
        }
        self.parent.as_ref()?.get(handle)
    }

    /// Whether the handle resolves here or through an ancestor.
    pub fn visible(&self, handle: Handle) -> bool {
        if handle.store == self.id {
            let arena = self.arena.read().expect("fact store arena poisoned");
            return (handle.slot as usize) < arena.len();
        }
        self.parent
            .as_ref()
            .map(|p| p.visible(handle))
            .unwrap_or(false)
    }

    /// Membership by identity in THIS store: owned locally or adopted.
    ///
    /// No ancestor fall-through — this is the focus-set membership test.
    pub fn contains(&self, handle: Handle) -> bool {
        if handle.store == self.id {
            let arena = self.arena.read().expect("fact store arena poisoned");
            return (handle.slot as usize) < arena.len();
        }
        self.adopted.contains(&handle)
    }

    /// Structural lookup of an atom living in another store family, without
    /// interning anything. Returns the visible handle if an equal atom exists
    /// here or through an ancestor.
    pub fn find(&self, src: &FactStore, handle: Handle) -> Option<Handle> {
        if self.visible(handle) {
            return Some(handle);
        }
        let atom = src.get(handle)?;
        let key = match &atom.body {
            AtomBody::Node { name } => InternKey::Node(atom.atom_type, name.clone()),
            AtomBody::Link { outgoing } => {
                let mut children = Vec::with_capacity(outgoing.len());
                for &child in outgoing {
                    children.push(self.find(src, child)?);
                }
                if atom.atom_type.is_a(AtomType::UnorderedLink) {
                    children.sort();
                }
                InternKey::Link(atom.atom_type, children)
            }
        };
        self.lookup_visible(&key)
    }

    /// Recursively copy an atom from another store family into this one.
    ///
    /// Structural interning applies at every level, so copying an atom that is
    /// already visible adopts it instead of duplicating.
    pub fn copy_from(&self, src: &FactStore, handle: Handle) -> StoreResult<Handle> {
        if self.visible(handle) {
            if handle.store != self.id {
                self.adopted.insert(handle);
            }
            return Ok(handle);
        }
        let atom = src.get(handle).ok_or_else(|| StoreError::StaleHandle {
            handle: handle.to_string(),
        })?;
        match &atom.body {
            AtomBody::Node { .. } => self.add(atom),
            AtomBody::Link { outgoing } => {
                let mut children = Vec::with_capacity(outgoing.len());
                for &child in outgoing {
                    children.push(self.copy_from(src, child)?);
                }
                let copy = Atom::link(atom.atom_type, children)
                    .with_tv(atom.tv)
                    .with_av(atom.av);
                self.add(copy)
            }
        }
    }

    /// Snapshot of every visible handle: ancestors first, then local atoms.
    ///
    /// The matcher enumerates candidates over this snapshot, so atoms interned
    /// while a match is in progress are never seen by that same match.
    pub fn handles(&self) -> Vec<Handle> {
        let mut out = Vec::new();
        self.collect_handles(&mut out);
        out
    }

    fn collect_handles(&self, out: &mut Vec<Handle>) {
        if let Some(parent) = &self.parent {
            parent.collect_handles(out);
        }
        let arena = self.arena.read().expect("fact store arena poisoned");
        for slot in 0..arena.len() {
            out.push(Handle {
                store: self.id,
                slot: slot as u32,
            });
        }
    }

    fn lookup_visible(&self, key: &InternKey) -> Option<Handle> {
        if let Some(handle) = self.intern.get(key) {
            return Some(*handle);
        }
        self.parent.as_ref()?.lookup_visible(key)
    }

    fn intern_key(&self, atom: &Atom) -> StoreResult<InternKey> {
        match &atom.body {
            AtomBody::Node { name } => {
                if !atom.atom_type.is_node() {
                    return Err(StoreError::MalformedAtom {
                        reason: format!("node body with link type {}", atom.atom_type),
                    });
                }
                Ok(InternKey::Node(atom.atom_type, name.clone()))
            }
            AtomBody::Link { outgoing } => {
                if !atom.atom_type.is_link() {
                    return Err(StoreError::MalformedAtom {
                        reason: format!("link body with node type {}", atom.atom_type),
                    });
                }
                for &child in outgoing {
                    if !self.visible(child) {
                        return Err(StoreError::ForeignHandle {
                            handle: child.to_string(),
                        });
                    }
                }
                let mut children = outgoing.clone();
                if atom.atom_type.is_a(AtomType::UnorderedLink) {
                    children.sort();
                }
                Ok(InternKey::Link(atom.atom_type, children))
            }
        }
    }

    /// Canonicalize the stored form: unordered outgoing sets are sorted.
    fn canonicalize(&self, mut atom: Atom) -> StoreResult<Atom> {
        if atom.atom_type.is_a(AtomType::UnorderedLink) {
            if let AtomBody::Link { outgoing } = &mut atom.body {
                outgoing.sort();
            }
        }
        Ok(atom)
    }

    /// Merge the truth value of a re-added local atom, keeping the better
    /// evidenced of the two.
    fn merge_tv(&self, handle: Handle, incoming: &Atom) {
        let mut arena = self.arena.write().expect("fact store arena poisoned");
        if let Some(existing) = arena.get_mut(handle.slot as usize) {
            if incoming.tv.count > existing.tv.count {
                existing.tv = incoming.tv;
            }
        }
    }
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactStore")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("adopted", &self.adopted.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
