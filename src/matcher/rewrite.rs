//! Structural rewriting: substitution and template instantiation.

use crate::atom::{Atom, AtomBody, Handle};
use crate::error::{StoreError, StoreResult};
use crate::store::FactStore;

use super::unify::Bindings;

/// Pure structural rewrite: replace every bound variable under `handle` with
/// its grounding, rebuilding links bottom-up and interning the result in
/// `store`. Unchanged subtrees keep their handles.
pub fn substitute(store: &FactStore, handle: Handle, bindings: &Bindings) -> StoreResult<Handle> {
    if let Some(value) = bindings.get(handle) {
        return Ok(value);
    }
    let atom = store.get(handle).ok_or_else(|| StoreError::StaleHandle {
        handle: handle.to_string(),
    })?;
    match &atom.body {
        AtomBody::Node { .. } => Ok(handle),
        AtomBody::Link { outgoing } => {
            let mut children = Vec::with_capacity(outgoing.len());
            let mut changed = false;
            for &child in outgoing {
                let rewritten = substitute(store, child, bindings)?;
                changed |= rewritten != child;
                children.push(rewritten);
            }
            if !changed {
                return Ok(handle);
            }
            store.add(
                Atom::link(atom.atom_type, children)
                    .with_tv(atom.tv)
                    .with_av(atom.av),
            )
        }
    }
}

/// Template expansion: a left-to-right walk rebuilding `template` into `dst`,
/// substituting embedded references through `bindings` as it goes.
///
/// Bindings and template live in `src`; the product is interned in `dst`.
pub fn instantiate(
    dst: &FactStore,
    src: &FactStore,
    template: Handle,
    bindings: &Bindings,
) -> StoreResult<Handle> {
    if let Some(value) = bindings.get(template) {
        return dst.copy_from(src, value);
    }
    let atom = src.get(template).ok_or_else(|| StoreError::StaleHandle {
        handle: template.to_string(),
    })?;
    match &atom.body {
        AtomBody::Node { .. } => dst.copy_from(src, template),
        AtomBody::Link { outgoing } => {
            let mut children = Vec::with_capacity(outgoing.len());
            for &child in outgoing {
                children.push(instantiate(dst, src, child, bindings)?);
            }
            dst.add(
                Atom::link(atom.atom_type, children)
                    .with_tv(atom.tv)
                    .with_av(atom.av),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomType;

    #[test]
    fn substitute_replaces_nested_variables() {
        let store = FactStore::new();
        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let b = store.add_node(AtomType::ConceptNode, "B").unwrap();
        let inner = store.add_link(AtomType::ListLink, vec![x, b]).unwrap();
        let outer = store
            .add_link(AtomType::ImplicationLink, vec![inner, x])
            .unwrap();

        let bindings: Bindings = [(x, a)].into_iter().collect();
        let rewritten = substitute(&store, outer, &bindings).unwrap();

        let expected_inner = store.add_link(AtomType::ListLink, vec![a, b]).unwrap();
        let expected = store
            .add_link(AtomType::ImplicationLink, vec![expected_inner, a])
            .unwrap();
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn substitute_without_matches_keeps_the_handle() {
        let store = FactStore::new();
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let b = store.add_node(AtomType::ConceptNode, "B").unwrap();
        let link = store.add_link(AtomType::ListLink, vec![a, b]).unwrap();
        let bindings = Bindings::new();
        assert_eq!(substitute(&store, link, &bindings).unwrap(), link);
    }

    #[test]
    fn instantiate_expands_into_another_store() {
        let src = FactStore::new();
        let y = src.add_node(AtomType::VariableNode, "$y").unwrap();
        let b = src.add_node(AtomType::ConceptNode, "B").unwrap();
        let r = src.add_node(AtomType::PredicateNode, "R").unwrap();
        let args = src.add_link(AtomType::ListLink, vec![y]).unwrap();
        let template = src
            .add_link(AtomType::EvaluationLink, vec![r, args])
            .unwrap();

        let dst = FactStore::new();
        let bindings: Bindings = [(y, b)].into_iter().collect();
        let product = instantiate(&dst, &src, template, &bindings).unwrap();

        let atom = dst.get(product).unwrap();
        assert_eq!(atom.atom_type, AtomType::EvaluationLink);
        let arg_list = dst.get(atom.outgoing()[1]).unwrap();
        assert_eq!(dst.get(arg_list.outgoing()[0]).unwrap().name(), Some("B"));
    }

    #[test]
    fn instantiate_with_stale_template_errors() {
        let dst = FactStore::new();
        let stale = {
            let temp = FactStore::new();
            temp.add_node(AtomType::ConceptNode, "gone").unwrap()
        };
        let src = FactStore::new();
        let err = instantiate(&dst, &src, stale, &Bindings::new()).unwrap_err();
        assert!(matches!(err, StoreError::StaleHandle { .. }));
    }
}
