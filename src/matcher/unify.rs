//! Structural unification of pattern terms against candidate atoms.
//!
//! A pattern is an ordinary atom tree in which some `VariableNode`s are
//! declared free. Unification walks pattern and candidate together, binding
//! declared variables as it goes. Ordered links match positionally; unordered
//! links match under some pairing of their children, found by backtracking.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::atom::{AtomBody, AtomType, Handle};
use crate::store::FactStore;

/// How strictly groundings are vetted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifyMode {
    /// Variables bind to variable-free atoms only — the regime for matching
    /// rule patterns against facts.
    Strict,
    /// Variables bind to any visible atom, variables included — the regime
    /// for the derivation sweep, where dummy bindings are sanitized later.
    Sweep,
}

/// Variable → grounding map with deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    map: BTreeMap<Handle, Handle>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: Handle) -> Option<Handle> {
        self.map.get(&var).copied()
    }

    pub fn insert(&mut self, var: Handle, value: Handle) {
        self.map.insert(var, value);
    }

    pub fn remove(&mut self, var: Handle) -> Option<Handle> {
        self.map.remove(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, Handle)> + '_ {
        self.map.iter().map(|(&k, &v)| (k, v))
    }

    /// A copy keeping only the entries whose variable is in `vars`.
    pub fn restricted_to(&self, vars: &BTreeSet<Handle>) -> Bindings {
        Bindings {
            map: self
                .map
                .iter()
                .filter(|(k, _)| vars.contains(*k))
                .map(|(&k, &v)| (k, v))
                .collect(),
        }
    }
}

impl FromIterator<(Handle, Handle)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (Handle, Handle)>>(iter: T) -> Self {
        Bindings {
            map: iter.into_iter().collect(),
        }
    }
}

/// One declaration from a variable list: the variable and its optional type
/// restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredVariable {
    pub var: Handle,
    pub restriction: Option<AtomType>,
}

/// Unwrap a variable declaration atom into its declared variables, in order.
///
/// Accepts a bare `VariableNode`, a `TypedVariableLink`, or a `VariableList`
/// of either; anything else declares nothing.
pub fn declared_variables(store: &FactStore, vardecl: Handle) -> Vec<DeclaredVariable> {
    let Some(atom) = store.get(vardecl) else {
        return Vec::new();
    };
    match atom.atom_type {
        AtomType::VariableNode => vec![DeclaredVariable {
            var: vardecl,
            restriction: None,
        }],
        AtomType::TypedVariableLink => typed_declaration(store, &atom.outgoing().to_vec())
            .into_iter()
            .collect(),
        AtomType::VariableList => {
            let mut out = Vec::new();
            for &entry in atom.outgoing() {
                out.extend(declared_variables(store, entry));
            }
            out
        }
        _ => Vec::new(),
    }
}

fn typed_declaration(store: &FactStore, outgoing: &[Handle]) -> Option<DeclaredVariable> {
    let [var, type_node] = outgoing else {
        return None;
    };
    let restriction = store
        .get(*type_node)
        .filter(|a| a.atom_type == AtomType::TypeNode)
        .and_then(|a| a.name().and_then(AtomType::from_name));
    Some(DeclaredVariable {
        var: *var,
        restriction,
    })
}

/// Build the variable → restriction lookup the unifier consumes.
pub fn variable_scope(decls: &[DeclaredVariable]) -> HashMap<Handle, Option<AtomType>> {
    decls.iter().map(|d| (d.var, d.restriction)).collect()
}

/// Whether any `VariableNode` occurs in the atom tree under `handle`.
pub fn contains_variables(store: &FactStore, handle: Handle) -> bool {
    let Some(atom) = store.get(handle) else {
        return false;
    };
    match &atom.body {
        AtomBody::Node { .. } => atom.atom_type == AtomType::VariableNode,
        AtomBody::Link { outgoing } => outgoing
            .iter()
            .any(|&child| contains_variables(store, child)),
    }
}

/// Collect every `VariableNode` occurring in the atom tree under `handle`.
pub fn collect_variables(store: &FactStore, handle: Handle, out: &mut BTreeSet<Handle>) {
    let Some(atom) = store.get(handle) else {
        return;
    };
    match &atom.body {
        AtomBody::Node { .. } => {
            if atom.atom_type == AtomType::VariableNode {
                out.insert(handle);
            }
        }
        AtomBody::Link { outgoing } => {
            for &child in outgoing {
                collect_variables(store, child, out);
            }
        }
    }
}

/// Every subterm of the atom tree under `handle`, pre-order, first occurrence
/// only.
pub fn collect_subterms(store: &FactStore, handle: Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    subterm_walk(store, handle, &mut out, &mut seen);
    out
}

fn subterm_walk(
    store: &FactStore,
    handle: Handle,
    out: &mut Vec<Handle>,
    seen: &mut HashSet<Handle>,
) {
    if !seen.insert(handle) {
        return;
    }
    out.push(handle);
    if let Some(atom) = store.get(handle) {
        for &child in atom.outgoing() {
            subterm_walk(store, child, out, seen);
        }
    }
}

/// Unify `pattern` against `candidate`, extending `bindings`.
///
/// `vars` maps each declared variable to its optional type restriction;
/// variables outside the map are matched literally, like constants. On
/// failure `bindings` may hold partial entries — callers discard it.
pub fn unify(
    store: &FactStore,
    pattern: Handle,
    candidate: Handle,
    vars: &HashMap<Handle, Option<AtomType>>,
    mode: UnifyMode,
    bindings: &mut Bindings,
) -> bool {
    if let Some(restriction) = vars.get(&pattern) {
        if let Some(bound) = bindings.get(pattern) {
            return bound == candidate;
        }
        let Some(cand_atom) = store.get(candidate) else {
            return false;
        };
        if let Some(required) = restriction {
            if !cand_atom.atom_type.is_a(*required) {
                return false;
            }
        }
        if mode == UnifyMode::Strict && contains_variables(store, candidate) {
            return false;
        }
        bindings.insert(pattern, candidate);
        return true;
    }

    if pattern == candidate && !contains_variables(store, pattern) {
        return true;
    }

    let (Some(pat), Some(cand)) = (store.get(pattern), store.get(candidate)) else {
        return false;
    };
    if pat.atom_type != cand.atom_type {
        return false;
    }
    match (&pat.body, &cand.body) {
        (AtomBody::Node { name: pn }, AtomBody::Node { name: cn }) => pn == cn,
        (AtomBody::Link { outgoing: po }, AtomBody::Link { outgoing: co }) => {
            if po.len() != co.len() {
                return false;
            }
            if pat.atom_type.is_a(AtomType::UnorderedLink) {
                let mut used = vec![false; co.len()];
                unify_unordered(store, po, co, &mut used, vars, mode, bindings)
            } else {
                po.iter()
                    .zip(co.iter())
                    .all(|(&pc, &cc)| unify(store, pc, cc, vars, mode, bindings))
            }
        }
        _ => false,
    }
}

/// Match unordered children under some pairing, backtracking over candidate
/// permutations. Settles for the first consistent pairing.
fn unify_unordered(
    store: &FactStore,
    pats: &[Handle],
    cands: &[Handle],
    used: &mut [bool],
    vars: &HashMap<Handle, Option<AtomType>>,
    mode: UnifyMode,
    bindings: &mut Bindings,
) -> bool {
    let Some((&first, rest)) = pats.split_first() else {
        return true;
    };
    for i in 0..cands.len() {
        if used[i] {
            continue;
        }
        let snapshot = bindings.clone();
        if unify(store, first, cands[i], vars, mode, bindings) {
            used[i] = true;
            if unify_unordered(store, rest, cands, used, vars, mode, bindings) {
                return true;
            }
            used[i] = false;
        }
        *bindings = snapshot;
    }
    false
}
