//! Production rules: named BindLink handles with selection weights.
//!
//! A rule is data, not code — a handle to a `BindLink` atom of the form
//! `(variable declaration, body, implicand)` plus a scalar weight used by
//! stochastic rule selection. Rule bases are fixed at construction.

use crate::atom::{AtomType, Handle};
use crate::error::{ChainError, ChainResult};
use crate::store::FactStore;

/// Resolve a BindLink into its (variable declaration, body, implicand) triple.
pub(crate) fn bind_parts(
    store: &FactStore,
    bind: Handle,
) -> ChainResult<(Handle, Handle, Handle)> {
    let atom = store.get(bind).ok_or_else(|| ChainError::MalformedRule {
        rule: bind.to_string(),
        reason: "handle does not resolve".into(),
    })?;
    if atom.atom_type != AtomType::BindLink {
        return Err(ChainError::MalformedRule {
            rule: bind.to_string(),
            reason: format!("expected BindLink, found {}", atom.atom_type),
        });
    }
    match atom.outgoing() {
        [vardecl, body, implicand] => Ok((*vardecl, *body, *implicand)),
        other => Err(ChainError::MalformedRule {
            rule: bind.to_string(),
            reason: format!("expected 3 outgoing atoms, found {}", other.len()),
        }),
    }
}

/// A named pattern-implication rule with a selection weight.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    weight: f32,
    bind: Handle,
}

impl Rule {
    /// Wrap a BindLink handle as a rule with weight 1.0.
    pub fn new(name: impl Into<String>, bind: Handle) -> Self {
        Self {
            name: name.into(),
            weight: 1.0,
            bind,
        }
    }

    /// Set the selection weight.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// The underlying BindLink handle.
    pub fn handle(&self) -> Handle {
        self.bind
    }

    /// The rule's variable declaration.
    pub fn vardecl(&self, store: &FactStore) -> ChainResult<Handle> {
        Ok(bind_parts(store, self.bind)?.0)
    }

    /// The pattern side of the rule.
    pub fn implicant(&self, store: &FactStore) -> ChainResult<Handle> {
        Ok(bind_parts(store, self.bind)?.1)
    }

    /// The consequent template of the rule.
    pub fn implicand(&self, store: &FactStore) -> ChainResult<Handle> {
        Ok(bind_parts(store, self.bind)?.2)
    }

    /// The implicant terms: the body's outgoing set when the body is an
    /// `AndLink` or `OrLink`, otherwise the body alone.
    pub fn implicant_terms(&self, store: &FactStore) -> ChainResult<Vec<Handle>> {
        let body = self.implicant(store)?;
        let atom = store.get(body).ok_or_else(|| ChainError::MalformedRule {
            rule: self.name.clone(),
            reason: "rule body does not resolve".into(),
        })?;
        match atom.atom_type {
            AtomType::AndLink | AtomType::OrLink => Ok(atom.outgoing().to_vec()),
            _ => Ok(vec![body]),
        }
    }
}

/// A fixed collection of rules, the unit handed to the forward chainer.
#[derive(Debug, Clone, Default)]
pub struct RuleBase {
    name: String,
    rules: Vec<Rule>,
}

impl RuleBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}
