//! Rule derivation: unification of sources against implicant terms and
//! partial specialization of rules.
//!
//! Each operation works inside a temporary fact store holding only the term
//! under consideration, a restricted variable declaration, and the source.
//! The store is dropped when the call returns, on every exit path, so
//! intermediate atoms never leak into the caller's store. Derived rules are
//! interned in a per-step scratch store supplied by the chainer.

use std::collections::{BTreeSet, HashSet};

use crate::atom::{AtomType, Handle};
use crate::error::{ChainResult, StoreError, StoreResult};
use crate::matcher::rewrite::substitute;
use crate::matcher::unify::{collect_variables, contains_variables, Bindings};
use crate::matcher::{CollectSink, Grounding, GroundingSink, PatternMatcher};
use crate::rules::{bind_parts, Rule};
use crate::store::FactStore;

/// Whether a term may seed a transient pattern: not a `NotLink`, not a
/// virtual link, and containing at least one variable.
pub fn is_valid_implicant(store: &FactStore, term: Handle) -> bool {
    let Some(atom) = store.get(term) else {
        return false;
    };
    atom.atom_type != AtomType::NotLink
        && !atom.atom_type.is_a(AtomType::VirtualLink)
        && contains_variables(store, term)
}

/// Build a variable list keeping exactly the declarations of `vardecl` whose
/// variable occurs in `parent_term`, in declaration order. Kept entries are
/// copied into `dst`.
pub fn gen_sub_varlist(
    dst: &FactStore,
    src: &FactStore,
    parent_term: Handle,
    vardecl: Handle,
) -> StoreResult<Handle> {
    let mut term_vars = BTreeSet::new();
    collect_variables(src, parent_term, &mut term_vars);

    let entries: Vec<Handle> = match src.get(vardecl) {
        Some(atom) if atom.atom_type == AtomType::VariableList => atom.outgoing().to_vec(),
        Some(_) => vec![vardecl],
        None => Vec::new(),
    };

    let mut kept = Vec::new();
    for entry in entries {
        let Some(atom) = src.get(entry) else {
            continue;
        };
        let in_term = match atom.atom_type {
            AtomType::VariableNode => term_vars.contains(&entry),
            AtomType::TypedVariableLink => atom
                .outgoing()
                .first()
                .map(|var| term_vars.contains(var))
                .unwrap_or(false),
            _ => false,
        };
        if in_term {
            kept.push(dst.copy_from(src, entry)?);
        }
    }
    dst.add_link(AtomType::VariableList, kept)
}

/// Sink collecting the grounded image of every pattern subterm.
#[derive(Default)]
struct UnifySink {
    values: Vec<Handle>,
}

impl GroundingSink for UnifySink {
    fn grounding(&mut self, _store: &FactStore, grounding: &Grounding) -> bool {
        for (_, image) in &grounding.terms {
            if !self.values.contains(image) {
                self.values.push(*image);
            }
        }
        true
    }
}

/// Decide whether `source` can ground some variables of `term` under the
/// rule's variable declaration.
///
/// A transient `BindLink(sub-declaration, term, term)` is swept against a
/// temporary store holding the term and the source; the unification succeeds
/// when the source appears in the outgoing set of the assembled result link.
pub fn unify(
    matcher: &dyn PatternMatcher,
    store: &FactStore,
    source: Handle,
    term: Handle,
    vardecl: Handle,
) -> ChainResult<bool> {
    if !is_valid_implicant(store, term) {
        return Ok(false);
    }

    let temp = FactStore::new();
    let term_cpy = temp.copy_from(store, term)?;
    let subvars = gen_sub_varlist(&temp, store, term, vardecl)?;
    let source_cpy = temp.copy_from(store, source)?;
    let bind = temp.add_link(AtomType::BindLink, vec![subvars, term_cpy, term_cpy])?;

    let mut sink = UnifySink::default();
    matcher.unify_sweep(&temp, bind, &mut sink)?;
    let result = temp.add_link(AtomType::SetLink, sink.values)?;

    Ok(temp
        .get(result)
        .map(|atom| atom.outgoing().contains(&source_cpy))
        .unwrap_or(false))
}

/// Derive partially-specialized rules by grounding variables of `rule`
/// against sub-structure of `source`.
///
/// Derived BindLinks are interned in `step_store`; rules identical to the
/// input rule are excluded.
pub fn derive_rules(
    matcher: &dyn PatternMatcher,
    store: &FactStore,
    step_store: &FactStore,
    source: Handle,
    rule: &Rule,
) -> ChainResult<HashSet<Handle>> {
    let mut derived = HashSet::new();
    for term in rule.implicant_terms(store)? {
        derive_for_term(matcher, store, step_store, source, term, rule, &mut derived)?;
    }
    Ok(derived)
}

fn derive_for_term(
    matcher: &dyn PatternMatcher,
    store: &FactStore,
    step_store: &FactStore,
    source: Handle,
    term: Handle,
    rule: &Rule,
    derived: &mut HashSet<Handle>,
) -> ChainResult<()> {
    if !is_valid_implicant(store, term) {
        return Ok(());
    }

    let temp = FactStore::new();
    let term_cpy = temp.copy_from(store, term)?;
    let subvars = gen_sub_varlist(&temp, store, term, rule.vardecl(store)?)?;
    let source_cpy = temp.copy_from(store, source)?;
    let bind = temp.add_link(AtomType::BindLink, vec![subvars, term_cpy, term_cpy])?;

    let mut sink = CollectSink::default();
    matcher.unify_sweep(&temp, bind, &mut sink)?;
    let mut groundings = sink.groundings;

    // Variable lists must not ground free variables. Collect the doomed keys
    // first, then erase — never erase while iterating.
    for grounding in &mut groundings {
        let doomed: Vec<Handle> = grounding
            .terms
            .iter()
            .filter(|(_, image)| *image == subvars)
            .map(|(subterm, _)| *subterm)
            .collect();
        grounding.terms.retain(|(subterm, _)| !doomed.contains(subterm));

        let doomed_vars: Vec<Handle> = grounding
            .vars
            .iter()
            .filter(|(_, value)| *value == subvars)
            .map(|(var, _)| var)
            .collect();
        for var in doomed_vars {
            grounding.vars.remove(var);
        }
    }

    let rule_cpy = step_store.copy_from(store, rule.handle())?;

    // Translate the variable groundings into the step store once; structural
    // interning maps each temp-store variable back onto the copied rule's.
    let mut step_groundings = Vec::with_capacity(groundings.len());
    for grounding in &groundings {
        let mut bindings = Bindings::new();
        for (var, value) in grounding.vars.iter() {
            bindings.insert(
                step_store.copy_from(&temp, var)?,
                step_store.copy_from(&temp, value)?,
            );
        }
        step_groundings.push(bindings);
    }

    for grounding in &groundings {
        for (subterm, image) in &grounding.terms {
            if *image != source_cpy {
                continue;
            }
            let mut sub_vars = BTreeSet::new();
            collect_variables(&temp, *subterm, &mut sub_vars);
            let step_vars: BTreeSet<Handle> = sub_vars
                .iter()
                .map(|&var| step_store.copy_from(&temp, var))
                .collect::<Result<_, StoreError>>()?;

            for candidate in
                substitute_rule_part(step_store, rule_cpy, &step_vars, &step_groundings)?
            {
                if candidate != rule_cpy {
                    derived.insert(candidate);
                }
            }
        }
    }
    Ok(())
}

/// Rewrite `rule_bind` under each grounding map, substituting only the
/// variables in `vars`, and intern the resulting BindLinks in `store`.
///
/// The new variable declaration is rebuilt from the rewritten body, taking
/// typing information from the original declaration.
pub fn substitute_rule_part(
    store: &FactStore,
    rule_bind: Handle,
    vars: &BTreeSet<Handle>,
    groundings: &[Bindings],
) -> ChainResult<Vec<Handle>> {
    let (vardecl, body, implicand) = bind_parts(store, rule_bind)?;

    let mut out = Vec::new();
    for grounding in groundings {
        let filtered = grounding.restricted_to(vars);
        let new_implicand = substitute(store, implicand, &filtered)?;
        let new_body = substitute(store, body, &filtered)?;
        let new_vardecl = gen_sub_varlist(store, store, new_body, vardecl)?;
        let new_bind =
            store.add_link(AtomType::BindLink, vec![new_vardecl, new_body, new_implicand])?;
        out.push(new_bind);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DefaultMatcher;

    /// Facts A, B plus a modus-ponens rule over Implication links.
    fn modus_ponens(store: &FactStore) -> (Rule, Handle, Handle) {
        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let y = store.add_node(AtomType::VariableNode, "$y").unwrap();
        let vardecl = store.add_link(AtomType::VariableList, vec![x, y]).unwrap();
        let implication = store
            .add_link(AtomType::ImplicationLink, vec![x, y])
            .unwrap();
        let body = store
            .add_link(AtomType::AndLink, vec![implication, x])
            .unwrap();
        let bind = store
            .add_link(AtomType::BindLink, vec![vardecl, body, y])
            .unwrap();
        (Rule::new("modus-ponens", bind), x, y)
    }

    #[test]
    fn valid_implicant_filter() {
        let store = FactStore::new();
        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();

        let plain = store.add_link(AtomType::ListLink, vec![x, a]).unwrap();
        assert!(is_valid_implicant(&store, plain));

        let negated = store.add_link(AtomType::NotLink, vec![plain]).unwrap();
        assert!(!is_valid_implicant(&store, negated), "NotLink is rejected");

        let virtual_term = store
            .add_link(AtomType::GreaterThanLink, vec![x, a])
            .unwrap();
        assert!(
            !is_valid_implicant(&store, virtual_term),
            "virtual links are rejected"
        );

        let grounded = store.add_link(AtomType::ListLink, vec![a, a]).unwrap();
        assert!(
            !is_valid_implicant(&store, grounded),
            "variable-free terms are rejected"
        );
    }

    #[test]
    fn sub_varlist_keeps_order_and_typing() {
        let store = FactStore::new();
        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let y = store.add_node(AtomType::VariableNode, "$y").unwrap();
        let z = store.add_node(AtomType::VariableNode, "$z").unwrap();
        let ty = store.add_node(AtomType::TypeNode, "ConceptNode").unwrap();
        let typed_z = store
            .add_link(AtomType::TypedVariableLink, vec![z, ty])
            .unwrap();
        let vardecl = store
            .add_link(AtomType::VariableList, vec![x, typed_z, y])
            .unwrap();

        // Term mentions $z and $y but not $x.
        let term = store.add_link(AtomType::ListLink, vec![z, y]).unwrap();

        let dst = FactStore::new();
        let sub = gen_sub_varlist(&dst, &store, term, vardecl).unwrap();
        let atom = dst.get(sub).unwrap();
        assert_eq!(atom.atom_type, AtomType::VariableList);
        assert_eq!(atom.arity(), 2);

        // Declaration order preserved: typed $z first, then $y.
        let first = dst.get(atom.outgoing()[0]).unwrap();
        assert_eq!(first.atom_type, AtomType::TypedVariableLink);
        let second = dst.get(atom.outgoing()[1]).unwrap();
        assert_eq!(second.name(), Some("$y"));
    }

    #[test]
    fn source_unifies_against_a_subterm() {
        let store = FactStore::new();
        let (rule, ..) = modus_ponens(&store);
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let matcher = DefaultMatcher::new();

        let vardecl = rule.vardecl(&store).unwrap();
        for term in rule.implicant_terms(&store).unwrap() {
            assert!(
                unify(&matcher, &store, a, term, vardecl).unwrap(),
                "A should ground a variable of every modus-ponens term"
            );
        }
    }

    #[test]
    fn type_restriction_blocks_unification() {
        let store = FactStore::new();
        let p = store.add_node(AtomType::VariableNode, "$p").unwrap();
        let ty = store.add_node(AtomType::PredicateNode, "acts").unwrap();
        let type_node = store.add_node(AtomType::TypeNode, "PredicateNode").unwrap();
        let typed = store
            .add_link(AtomType::TypedVariableLink, vec![p, type_node])
            .unwrap();
        let vardecl = store.add_link(AtomType::VariableList, vec![typed]).unwrap();
        let term = store.add_link(AtomType::ListLink, vec![p, ty]).unwrap();

        let concept = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let predicate = store.add_node(AtomType::PredicateNode, "knows").unwrap();

        let matcher = DefaultMatcher::new();
        assert!(!unify(&matcher, &store, concept, term, vardecl).unwrap());
        assert!(unify(&matcher, &store, predicate, term, vardecl).unwrap());
    }

    #[test]
    fn derive_specializes_the_rule() {
        let store = FactStore::new();
        let (rule, ..) = modus_ponens(&store);
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();

        let step = FactStore::new();
        let matcher = DefaultMatcher::new();
        let derived = derive_rules(&matcher, &store, &step, a, &rule).unwrap();
        assert!(!derived.is_empty());

        // The expected specialization: variables of the matched subterm
        // replaced by the source, declaration shrunk to what's still free.
        let sa = step.add_node(AtomType::ConceptNode, "A").unwrap();
        let sy = step.add_node(AtomType::VariableNode, "$y").unwrap();
        let simp = step.add_link(AtomType::ImplicationLink, vec![sa, sy]).unwrap();
        let sbody = step.add_link(AtomType::AndLink, vec![simp, sa]).unwrap();
        let svars = step.add_link(AtomType::VariableList, vec![sy]).unwrap();
        let expected = step
            .add_link(AtomType::BindLink, vec![svars, sbody, sy])
            .unwrap();
        assert!(
            derived.contains(&expected),
            "expected specialization missing from {derived:?}"
        );

        // The unspecialized rule itself must never be derived.
        let original = step.copy_from(&store, rule.handle()).unwrap();
        assert!(!derived.contains(&original));
    }

    #[test]
    fn derivation_respects_the_term_filter() {
        let store = FactStore::new();
        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let inner = store.add_link(AtomType::ListLink, vec![x]).unwrap();
        let body = store.add_link(AtomType::NotLink, vec![inner]).unwrap();
        let vardecl = store.add_link(AtomType::VariableList, vec![x]).unwrap();
        let bind = store
            .add_link(AtomType::BindLink, vec![vardecl, body, x])
            .unwrap();
        let rule = Rule::new("negated", bind);

        let step = FactStore::new();
        let matcher = DefaultMatcher::new();
        let derived = derive_rules(&matcher, &store, &step, a, &rule).unwrap();
        assert!(derived.is_empty(), "NotLink bodies never derive");
    }

    #[test]
    fn substitution_is_structural_and_recursive() {
        let store = FactStore::new();
        let (rule, x, y) = modus_ponens(&store);
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();

        let vars: BTreeSet<Handle> = [x].into_iter().collect();
        let grounding: Bindings = [(x, a)].into_iter().collect();
        let rewritten =
            substitute_rule_part(&store, rule.handle(), &vars, &[grounding]).unwrap();
        assert_eq!(rewritten.len(), 1);

        let (new_vardecl, new_body, new_implicand) =
            bind_parts(&store, rewritten[0]).unwrap();

        // Body: every $x occurrence replaced, $y untouched.
        let expected_impl = store.add_link(AtomType::ImplicationLink, vec![a, y]).unwrap();
        let expected_body = store
            .add_link(AtomType::AndLink, vec![expected_impl, a])
            .unwrap();
        assert_eq!(new_body, expected_body);
        assert_eq!(new_implicand, y);

        // Declaration lists only the still-free variable.
        let decl = store.get(new_vardecl).unwrap();
        assert_eq!(decl.outgoing(), &[y]);
    }
}
