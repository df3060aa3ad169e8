//! Graph pattern matching over fact stores.
//!
//! The forward chainer consumes the [`PatternMatcher`] trait and never
//! assumes more than its contract, so the matching engine is swappable.
//! [`DefaultMatcher`] is the reference implementation: clause-by-clause
//! candidate enumeration over a store snapshot with backtracking
//! unification.
//!
//! Matching comes in two regimes. [`PatternMatcher::match_bind`] and
//! [`PatternMatcher::imply`] ground whole clauses against existing atoms —
//! the regime for applying rules to facts. [`PatternMatcher::unify_sweep`]
//! aligns a single pattern term *and every subterm of it* against the store —
//! the regime rule derivation uses to discover which variables a source can
//! ground, dummy bindings included.

use std::collections::HashSet;

use crate::atom::{AtomType, Handle};
use crate::error::{MatchError, MatchResult, StoreError};
use crate::store::FactStore;

pub mod rewrite;
pub mod unify;

use rewrite::{instantiate, substitute};
use unify::{
    collect_subterms, contains_variables, declared_variables, unify, variable_scope, Bindings,
    UnifyMode,
};

// ---------------------------------------------------------------------------
// Groundings and sinks
// ---------------------------------------------------------------------------

/// One successful match: parallel variable → value and pattern-subterm →
/// value mappings. The two are kept in a single record so they stay aligned.
#[derive(Debug, Clone)]
pub struct Grounding {
    /// Variable → ground value.
    pub vars: Bindings,
    /// Pattern subterm → its image under the match, in pattern order.
    pub terms: Vec<(Handle, Handle)>,
}

/// Callback receiving matches one at a time.
///
/// Return `false` to stop the enumeration early.
pub trait GroundingSink {
    fn grounding(&mut self, store: &FactStore, grounding: &Grounding) -> bool;
}

/// Sink that gathers every grounding.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub groundings: Vec<Grounding>,
}

impl GroundingSink for CollectSink {
    fn grounding(&mut self, _store: &FactStore, grounding: &Grounding) -> bool {
        self.groundings.push(grounding.clone());
        true
    }
}

/// Sink restricting matches to members of a focus store.
///
/// Groundings whose matched clause atoms are not all members of the focus
/// store are skipped; accepted groundings have their implicand instantiated
/// into the scratch store and collected.
pub struct FocusSink<'a> {
    focus: &'a FactStore,
    scratch: &'a FactStore,
    implicand: Handle,
    pub products: Vec<Handle>,
    error: Option<StoreError>,
}

impl<'a> FocusSink<'a> {
    pub fn new(focus: &'a FactStore, scratch: &'a FactStore, implicand: Handle) -> Self {
        Self {
            focus,
            scratch,
            implicand,
            products: Vec::new(),
            error: None,
        }
    }

    /// A store error raised while instantiating, if any.
    pub fn into_result(self) -> MatchResult<Vec<Handle>> {
        match self.error {
            Some(err) => Err(err.into()),
            None => Ok(self.products),
        }
    }
}

impl GroundingSink for FocusSink<'_> {
    fn grounding(&mut self, store: &FactStore, grounding: &Grounding) -> bool {
        if grounding
            .terms
            .iter()
            .any(|(_, ground)| !self.focus.contains(*ground))
        {
            return true;
        }
        match instantiate(self.scratch, store, self.implicand, &grounding.vars) {
            Ok(product) => {
                if !contains_variables(self.scratch, product)
                    && !self.products.contains(&product)
                {
                    self.products.push(product);
                }
                true
            }
            Err(err) => {
                self.error = Some(err);
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// The matcher seam
// ---------------------------------------------------------------------------

/// Enumerates groundings of a BindLink pattern against a fact store.
pub trait PatternMatcher {
    /// Ground the BindLink's body against the store, instantiate the
    /// implicand per grounding, and return the handle of a `SetLink`
    /// enumerating the products (interned in `store` along with them).
    fn match_bind(&self, store: &FactStore, bind: Handle) -> MatchResult<Handle>;

    /// Ground the BindLink's body against the store, handing each grounding
    /// to `sink`.
    fn imply(
        &self,
        store: &FactStore,
        bind: Handle,
        sink: &mut dyn GroundingSink,
    ) -> MatchResult<()>;

    /// Align the BindLink's body and each of its subterms against every
    /// visible atom, handing each successful alignment to `sink` with the
    /// full subterm → image map. Unlike the clause regimes, alignments may
    /// bind variables to atoms that are themselves variables or variable
    /// declarations — callers sanitize.
    fn unify_sweep(
        &self,
        store: &FactStore,
        bind: Handle,
        sink: &mut dyn GroundingSink,
    ) -> MatchResult<()>;
}

/// Reference pattern matcher: snapshot candidate enumeration with
/// backtracking unification.
#[derive(Debug, Clone, Default)]
pub struct DefaultMatcher {
    attention_only: bool,
}

impl DefaultMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confine candidate atoms to the attentional focus (positive STI).
    pub fn with_attention_focus(mut self, attention_only: bool) -> Self {
        self.attention_only = attention_only;
        self
    }

    /// Candidate atoms for matching: every visible atom except the pattern
    /// container itself, taken once up front so the enumeration never sees
    /// atoms interned while it runs.
    fn snapshot(&self, store: &FactStore, bind: Handle) -> Vec<Handle> {
        store
            .handles()
            .into_iter()
            .filter(|&h| h != bind)
            .filter(|&h| {
                if !self.attention_only {
                    return true;
                }
                store.get(h).map(|a| a.av.sti > 0).unwrap_or(false)
            })
            .collect()
    }

    /// Groundings of the body's clauses against the snapshot.
    fn enumerate(&self, store: &FactStore, bind: Handle) -> MatchResult<Vec<Grounding>> {
        let (vardecl, body, _) = parse_bind(store, bind)?;
        let vars = variable_scope(&declared_variables(store, vardecl));
        let snapshot = self.snapshot(store, bind);

        let body_atom = store.get(body).ok_or_else(|| MatchError::MalformedPattern {
            reason: format!("body {body} does not resolve"),
        })?;
        let mut out = Vec::new();
        match body_atom.atom_type {
            AtomType::AndLink => {
                let clauses = body_atom.outgoing().to_vec();
                solve(store, &clauses, &vars, &snapshot, &Bindings::new(), &mut Vec::new(), &mut out);
            }
            AtomType::OrLink => {
                // Disjuncts are matched independently.
                for &clause in body_atom.outgoing() {
                    solve(store, &[clause], &vars, &snapshot, &Bindings::new(), &mut Vec::new(), &mut out);
                }
            }
            _ => {
                solve(store, &[body], &vars, &snapshot, &Bindings::new(), &mut Vec::new(), &mut out);
            }
        }
        Ok(out)
    }
}

impl PatternMatcher for DefaultMatcher {
    fn match_bind(&self, store: &FactStore, bind: Handle) -> MatchResult<Handle> {
        let (_, _, implicand) = parse_bind(store, bind)?;
        let groundings = self.enumerate(store, bind)?;

        let mut products = Vec::new();
        let mut seen = HashSet::new();
        for grounding in &groundings {
            let product = instantiate(store, store, implicand, &grounding.vars)?;
            // A grounding that leaves implicand variables free instantiates
            // nothing.
            if contains_variables(store, product) {
                continue;
            }
            if seen.insert(product) {
                products.push(product);
            }
        }
        Ok(store.add_link(AtomType::SetLink, products)?)
    }

    fn imply(
        &self,
        store: &FactStore,
        bind: Handle,
        sink: &mut dyn GroundingSink,
    ) -> MatchResult<()> {
        for grounding in self.enumerate(store, bind)? {
            if !sink.grounding(store, &grounding) {
                break;
            }
        }
        Ok(())
    }

    fn unify_sweep(
        &self,
        store: &FactStore,
        bind: Handle,
        sink: &mut dyn GroundingSink,
    ) -> MatchResult<()> {
        let (vardecl, body, _) = parse_bind(store, bind)?;
        let vars = variable_scope(&declared_variables(store, vardecl));
        let snapshot = self.snapshot(store, bind);
        let subterms = collect_subterms(store, body);

        'sweep: for &sub in &subterms {
            for &candidate in &snapshot {
                let mut bindings = Bindings::new();
                if !unify(store, sub, candidate, &vars, UnifyMode::Sweep, &mut bindings) {
                    continue;
                }
                let mut terms = Vec::with_capacity(subterms.len());
                for &term in &subterms {
                    terms.push((term, substitute(store, term, &bindings)?));
                }
                let grounding = Grounding {
                    vars: bindings,
                    terms,
                };
                if !sink.grounding(store, &grounding) {
                    break 'sweep;
                }
            }
        }
        Ok(())
    }
}

/// Resolve a BindLink into (variable declaration, body, implicand).
fn parse_bind(store: &FactStore, bind: Handle) -> MatchResult<(Handle, Handle, Handle)> {
    let atom = store.get(bind).ok_or_else(|| MatchError::NotABindLink {
        handle: bind.to_string(),
    })?;
    if atom.atom_type != AtomType::BindLink {
        return Err(MatchError::NotABindLink {
            handle: bind.to_string(),
        });
    }
    match atom.outgoing() {
        [vardecl, body, implicand] => Ok((*vardecl, *body, *implicand)),
        other => Err(MatchError::MalformedPattern {
            reason: format!("BindLink arity {} instead of 3", other.len()),
        }),
    }
}

/// Recursive conjunctive solve: ground `clauses` left to right against the
/// snapshot, accumulating consistent bindings.
fn solve(
    store: &FactStore,
    clauses: &[Handle],
    vars: &std::collections::HashMap<Handle, Option<AtomType>>,
    snapshot: &[Handle],
    bindings: &Bindings,
    terms: &mut Vec<(Handle, Handle)>,
    out: &mut Vec<Grounding>,
) {
    let Some((&clause, rest)) = clauses.split_first() else {
        out.push(Grounding {
            vars: bindings.clone(),
            terms: terms.clone(),
        });
        return;
    };
    for &candidate in snapshot {
        let mut attempt = bindings.clone();
        if unify(store, clause, candidate, vars, UnifyMode::Strict, &mut attempt) {
            terms.push((clause, candidate));
            solve(store, rest, vars, snapshot, &attempt, terms, out);
            terms.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, AttentionValue};

    /// Store with facts Implication(A, B) and A, plus a modus-ponens pattern
    /// `BindLink(VarList($x, $y), AndLink(Implication($x, $y), $x), $y)`.
    fn modus_ponens_setup() -> (FactStore, Handle) {
        let store = FactStore::new();
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let b = store.add_node(AtomType::ConceptNode, "B").unwrap();
        store
            .add_link(AtomType::ImplicationLink, vec![a, b])
            .unwrap();

        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let y = store.add_node(AtomType::VariableNode, "$y").unwrap();
        let vardecl = store.add_link(AtomType::VariableList, vec![x, y]).unwrap();
        let pattern = store
            .add_link(AtomType::ImplicationLink, vec![x, y])
            .unwrap();
        let body = store.add_link(AtomType::AndLink, vec![pattern, x]).unwrap();
        let bind = store
            .add_link(AtomType::BindLink, vec![vardecl, body, y])
            .unwrap();
        (store, bind)
    }

    #[test]
    fn match_bind_grounds_conjunctions() {
        let (store, bind) = modus_ponens_setup();
        let matcher = DefaultMatcher::new();
        let result = matcher.match_bind(&store, bind).unwrap();

        let set = store.get(result).unwrap();
        assert_eq!(set.atom_type, AtomType::SetLink);
        let names: Vec<_> = set
            .outgoing()
            .iter()
            .map(|&h| store.get(h).unwrap().name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["B"]);
    }

    #[test]
    fn match_bind_rejects_non_bindlinks() {
        let store = FactStore::new();
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let err = DefaultMatcher::new().match_bind(&store, a).unwrap_err();
        assert!(matches!(err, MatchError::NotABindLink { .. }));
    }

    #[test]
    fn imply_hands_each_grounding_to_the_sink() {
        let (store, bind) = modus_ponens_setup();
        let mut sink = CollectSink::default();
        DefaultMatcher::new().imply(&store, bind, &mut sink).unwrap();
        assert_eq!(sink.groundings.len(), 1);
        let grounding = &sink.groundings[0];
        assert_eq!(grounding.vars.len(), 2);
        assert_eq!(grounding.terms.len(), 2, "one entry per clause");
    }

    #[test]
    fn unify_sweep_aligns_subterms() {
        // Temp-store shape used by rule derivation: the term, a restricted
        // declaration, and a source atom.
        let store = FactStore::new();
        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let y = store.add_node(AtomType::VariableNode, "$y").unwrap();
        let term = store.add_link(AtomType::ImplicationLink, vec![x, y]).unwrap();
        let vardecl = store.add_link(AtomType::VariableList, vec![x, y]).unwrap();
        let a = store.add_node(AtomType::ConceptNode, "A").unwrap();
        let bind = store
            .add_link(AtomType::BindLink, vec![vardecl, term, term])
            .unwrap();

        let mut sink = CollectSink::default();
        DefaultMatcher::new()
            .unify_sweep(&store, bind, &mut sink)
            .unwrap();

        // Some alignment must bind $x to the source A and image the pattern
        // as Implication(A, $y).
        let hit = sink
            .groundings
            .iter()
            .find(|g| g.vars.get(x) == Some(a))
            .expect("sweep should align $x against A");
        let image = hit
            .terms
            .iter()
            .find(|(t, _)| *t == term)
            .map(|(_, img)| *img)
            .unwrap();
        let image_atom = store.get(image).unwrap();
        assert_eq!(image_atom.atom_type, AtomType::ImplicationLink);
        assert_eq!(image_atom.outgoing()[0], a);
        assert_eq!(image_atom.outgoing()[1], y);
    }

    #[test]
    fn attention_focus_confines_candidates() {
        let store = FactStore::new();
        let salient = store
            .add(
                Atom::node(AtomType::ConceptNode, "salient").with_av(AttentionValue::new(10, 0)),
            )
            .unwrap();
        store.add_node(AtomType::ConceptNode, "dull").unwrap();

        let x = store.add_node(AtomType::VariableNode, "$x").unwrap();
        let vardecl = store.add_link(AtomType::VariableList, vec![x]).unwrap();
        let bind = store
            .add_link(AtomType::BindLink, vec![vardecl, x, x])
            .unwrap();

        let mut sink = CollectSink::default();
        DefaultMatcher::new()
            .with_attention_focus(true)
            .imply(&store, bind, &mut sink)
            .unwrap();

        let grounded: Vec<_> = sink
            .groundings
            .iter()
            .filter_map(|g| g.vars.get(x))
            .collect();
        assert_eq!(grounded, vec![salient]);
    }

    #[test]
    fn focus_sink_rejects_non_members() {
        use std::sync::Arc;

        let global = Arc::new(FactStore::new());
        let a = global.add_node(AtomType::ConceptNode, "A").unwrap();
        let b = global.add_node(AtomType::ConceptNode, "B").unwrap();
        let d = global.add_node(AtomType::ConceptNode, "D").unwrap();
        let ab = global
            .add_link(AtomType::ImplicationLink, vec![a, b])
            .unwrap();
        global
            .add_link(AtomType::ImplicationLink, vec![a, d])
            .unwrap();

        let focus = Arc::new(FactStore::with_parent(Arc::clone(&global)));
        focus.copy_from(&global, a).unwrap();
        focus.copy_from(&global, ab).unwrap();

        let scratch = FactStore::with_parent(Arc::clone(&focus));
        let y = scratch.add_node(AtomType::VariableNode, "$y").unwrap();
        let vardecl = scratch.add_link(AtomType::VariableList, vec![y]).unwrap();
        let pattern = scratch
            .add_link(AtomType::ImplicationLink, vec![a, y])
            .unwrap();
        let bind = scratch
            .add_link(AtomType::BindLink, vec![vardecl, pattern, y])
            .unwrap();

        let mut sink = FocusSink::new(&focus, &scratch, y);
        DefaultMatcher::new()
            .imply(&scratch, bind, &mut sink)
            .unwrap();
        let products = sink.into_result().unwrap();
        assert_eq!(products, vec![b], "Implication(A, D) is outside the focus");
    }
}
