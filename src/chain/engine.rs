//! The forward-chainer control loop.
//!
//! One step: select a source, select a rule whose implicant unifies with it,
//! derive partially-specialized rules, apply each derivation through the
//! pattern matcher, absorb the products back into the potential sources, and
//! record the step. Termination is exclusively iteration-bounded —
//! quiescence is not a stopping condition.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::atom::{AtomType, Handle};
use crate::error::{ChainError, ChainResult};
use crate::matcher::rewrite::instantiate;
use crate::matcher::unify::{contains_variables, Bindings};
use crate::matcher::{DefaultMatcher, FocusSink, PatternMatcher};
use crate::rules::{bind_parts, Rule, RuleBase};
use crate::store::FactStore;

use super::derive;
use super::select::tournament_select;
use super::stat::ChainStats;
use super::{ChainConfig, SourceSelectionMode};

/// Forward-chaining inference over a fact store.
pub struct ForwardChainer {
    store: Arc<FactStore>,
    /// Child of the global store confining matching and storage, when a
    /// focus set was supplied.
    focus_store: Option<Arc<FactStore>>,
    matcher: Box<dyn PatternMatcher>,
    rule_base: String,
    rules: Vec<Rule>,
    config: ChainConfig,
    potential_sources: HashSet<Handle>,
    selected_sources: HashSet<Handle>,
    stats: ChainStats,
    iteration: usize,
    rng: StdRng,
}

impl ForwardChainer {
    /// Create a chainer over `store` with the given rule base and initial
    /// source.
    ///
    /// A `SetLink` source contributes its outgoing set as the initial
    /// sources (the `SetLink` itself is not a source); any other atom is the
    /// single initial source. A non-empty `focus_set` confines matching and
    /// storage to a child store seeded with the focus atoms and the sources.
    pub fn new(
        store: Arc<FactStore>,
        rule_base: RuleBase,
        source: Handle,
        focus_set: &[Handle],
        config: ChainConfig,
    ) -> ChainResult<Self> {
        let source_atom = store.get(source).ok_or(ChainError::InvalidSource)?;
        let initial: Vec<Handle> = if source_atom.atom_type == AtomType::SetLink {
            source_atom.outgoing().to_vec()
        } else {
            vec![source]
        };

        let focus_store = if focus_set.is_empty() {
            None
        } else {
            let focus = FactStore::with_parent(Arc::clone(&store));
            for &handle in focus_set {
                focus.copy_from(&store, handle)?;
            }
            for &handle in &initial {
                focus.copy_from(&store, handle)?;
            }
            Some(Arc::new(focus))
        };

        tracing::info!(
            rule_base = rule_base.name(),
            rules = rule_base.rules().len(),
            sources = initial.len(),
            max_iterations = config.maximum_iterations,
            focus = focus_store.is_some(),
            "initializing forward chainer"
        );

        let matcher: Box<dyn PatternMatcher> = Box::new(
            DefaultMatcher::new().with_attention_focus(config.attention_allocation),
        );
        let rng = StdRng::seed_from_u64(config.rng_seed);

        Ok(Self {
            store,
            focus_store,
            matcher,
            rule_base: rule_base.name().to_string(),
            rules: rule_base.into_rules(),
            config,
            potential_sources: initial.into_iter().collect(),
            selected_sources: HashSet::new(),
            stats: ChainStats::new(),
            iteration: 0,
            rng,
        })
    }

    /// Swap in a different pattern matcher implementation.
    pub fn with_matcher(mut self, matcher: Box<dyn PatternMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// The store reads resolve through: the focus store when active,
    /// otherwise the global store.
    fn view(&self) -> Arc<FactStore> {
        self.focus_store
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.store))
    }

    /// Run one chaining step.
    ///
    /// In the degenerate no-sources state every rule is applied once against
    /// the global store instead. The iteration counter advances
    /// unconditionally after the attempted step, whether or not a rule
    /// matched.
    pub fn step(&mut self) -> ChainResult<()> {
        if self.potential_sources.is_empty() {
            self.apply_all_rules()?;
            self.iteration += 1;
            return Ok(());
        }

        let Some(source) = self.choose_source() else {
            self.iteration += 1;
            return Ok(());
        };
        tracing::debug!(source = %source, "source selected");

        match self.choose_rule(source)? {
            None => {
                tracing::debug!("no selected rule, abort step");
            }
            Some(rule) => {
                let products = self.apply_rule(source, &rule)?;
                self.potential_sources.extend(products.iter().copied());
                self.stats
                    .add_inference_record(Some(source), rule.name(), products);
            }
        }

        self.iteration += 1;
        Ok(())
    }

    /// Run until the iteration bound.
    ///
    /// With no potential sources on entry, every rule is applied once in
    /// lieu of the stepping loop.
    pub fn run(&mut self) -> ChainResult<()> {
        if self.potential_sources.is_empty() {
            self.apply_all_rules()?;
            return Ok(());
        }
        while self.iteration < self.config.maximum_iterations {
            tracing::debug!(iteration = self.iteration, "chain iteration");
            self.step()?;
        }
        tracing::debug!("finished forward chaining");
        Ok(())
    }

    /// The union of every recorded product set.
    pub fn result(&self) -> HashSet<Handle> {
        self.stats.all_products()
    }

    /// Weighted-tournament source selection with novelty preference.
    fn choose_source(&mut self) -> Option<Handle> {
        let view = self.view();
        let mut weights: HashMap<Handle, f32> = HashMap::new();
        for &source in &self.potential_sources {
            let weight = match self.config.source_selection_mode {
                SourceSelectionMode::TvFitness => {
                    view.get(source).map(|a| a.tv.fitness()).unwrap_or(0.0)
                }
                SourceSelectionMode::StiBased => {
                    view.get(source).map(|a| a.av.sti as f32).unwrap_or(0.0)
                }
            };
            weights.insert(source, weight);
        }

        // Prefer sources never selected before.
        for _ in 0..weights.len() {
            let winner =
                tournament_select(&mut self.rng, &weights, self.config.tournament_size)?;
            if !self.selected_sources.contains(&winner) {
                self.selected_sources.insert(winner);
                return Some(winner);
            }
        }

        // Everything has been selected already; take the next winner.
        let winner = tournament_select(&mut self.rng, &weights, self.config.tournament_size)?;
        self.selected_sources.insert(winner);
        Some(winner)
    }

    /// Tournament-select a rule whose implicant unifies with the source,
    /// removing non-matching rules from the draw until one fits or the pool
    /// empties.
    fn choose_rule(&mut self, source: Handle) -> ChainResult<Option<Rule>> {
        let view = self.view();
        let mut weights: HashMap<usize, f32> = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (index, rule.weight()))
            .collect();
        tracing::debug!(
            rules = weights.len(),
            "rules to be searched as matched against the source"
        );

        while !weights.is_empty() {
            let Some(index) =
                tournament_select(&mut self.rng, &weights, self.config.tournament_size)
            else {
                break;
            };
            let rule = self.rules[index].clone();

            let vardecl = rule.vardecl(&view)?;
            let mut unified = false;
            for term in rule.implicant_terms(&view)? {
                if derive::unify(self.matcher.as_ref(), &view, source, term, vardecl)? {
                    unified = true;
                    break;
                }
            }

            if unified {
                tracing::debug!(rule = rule.name(), "rule matched the source");
                return Ok(Some(rule));
            }
            tracing::debug!(rule = rule.name(), "rule is not a match, looking for another");
            weights.remove(&index);
        }

        tracing::debug!("no matching rules were found for the given source");
        Ok(None)
    }

    /// Derive specializations of `rule` against `source` and apply each one.
    fn apply_rule(&mut self, source: Handle, rule: &Rule) -> ChainResult<HashSet<Handle>> {
        let view = self.view();
        let step_store = FactStore::new();
        let derived =
            derive::derive_rules(self.matcher.as_ref(), &view, &step_store, source, rule)?;
        if derived.is_empty() {
            tracing::debug!("no derived rule, abort step");
            return Ok(HashSet::new());
        }
        tracing::debug!(count = derived.len(), "derived rules");

        let mut products = HashSet::new();
        for handle in derived {
            products.extend(self.apply_rule_handle(&step_store, handle)?);
        }
        Ok(products)
    }

    /// Apply every rule once against the global store, absorbing all results.
    fn apply_all_rules(&mut self) -> ChainResult<()> {
        tracing::debug!("no potential sources, applying all rules once");
        let store = Arc::clone(&self.store);
        let rules = self.rules.clone();
        for rule in &rules {
            let results = self.apply_rule_handle(&store, rule.handle())?;
            let products: HashSet<Handle> = results.into_iter().collect();
            self.potential_sources.extend(products.iter().copied());
            self.stats.add_inference_record(None, rule.name(), products);
        }
        Ok(())
    }

    /// Apply one (possibly derived) rule BindLink living in `src_store`.
    ///
    /// Fully grounded rules are existence-gated and instantiated directly;
    /// partially grounded rules go through the pattern matcher, confined to
    /// the focus store when one is active. Products are interned into the
    /// focus store when active, otherwise the global store.
    fn apply_rule_handle(
        &self,
        src_store: &FactStore,
        rhandle: Handle,
    ) -> ChainResult<Vec<Handle>> {
        if !contains_variables(src_store, rhandle) {
            // Derivation may have assembled an implicant that exists nowhere;
            // in that case the implicand must not come into existence either.
            let (_, body, implicand) = bind_parts(src_store, rhandle)?;
            let body_atom = src_store.get(body).ok_or_else(|| ChainError::MalformedRule {
                rule: rhandle.to_string(),
                reason: "rule body does not resolve".into(),
            })?;
            let clauses: Vec<Handle> = match body_atom.atom_type {
                AtomType::AndLink | AtomType::OrLink => body_atom.outgoing().to_vec(),
                _ => vec![body],
            };
            for clause in clauses {
                if self.store.find(src_store, clause).is_none() {
                    return Ok(Vec::new());
                }
                if let Some(focus) = &self.focus_store {
                    match focus.find(src_store, clause) {
                        Some(member) if focus.contains(member) => {}
                        _ => return Ok(Vec::new()),
                    }
                }
            }

            tracing::debug!(implicand = %implicand, "instantiating fully grounded rule");
            let product = match &self.focus_store {
                Some(focus) => instantiate(focus, src_store, implicand, &Bindings::new())?,
                None => instantiate(&self.store, src_store, implicand, &Bindings::new())?,
            };
            return Ok(vec![product]);
        }

        if let Some(focus) = &self.focus_store {
            // Keep the derived rule's own atoms in a child store so the
            // matcher can never find an atom the derivation itself created.
            let scratch = FactStore::with_parent(Arc::clone(focus));
            let rhcpy = scratch.copy_from(src_store, rhandle)?;
            let (_, _, implicand) = bind_parts(&scratch, rhcpy)?;

            tracing::debug!(rule = %rhcpy, "applying rule in focus set");
            let mut sink = FocusSink::new(focus, &scratch, implicand);
            self.matcher.imply(&scratch, rhcpy, &mut sink)?;
            let found = sink.into_result().map_err(ChainError::from)?;

            let mut out = Vec::with_capacity(found.len());
            for handle in found {
                out.push(focus.copy_from(&scratch, handle)?);
            }
            Ok(out)
        } else {
            let scratch = FactStore::with_parent(Arc::clone(&self.store));
            let rhcpy = scratch.copy_from(src_store, rhandle)?;

            tracing::debug!(rule = %rhcpy, "applying rule on the whole store");
            let result = self.matcher.match_bind(&scratch, rhcpy)?;
            // A non-link result yields nothing, silently.
            let found = scratch
                .get(result)
                .map(|atom| atom.outgoing().to_vec())
                .unwrap_or_default();

            let mut out = Vec::with_capacity(found.len());
            for handle in found {
                out.push(self.store.copy_from(&scratch, handle)?);
            }
            Ok(out)
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Atoms currently eligible for source selection.
    pub fn potential_sources(&self) -> &HashSet<Handle> {
        &self.potential_sources
    }

    /// Sources chosen at least once.
    pub fn selected_sources(&self) -> &HashSet<Handle> {
        &self.selected_sources
    }

    /// Steps attempted so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The statistics recorder.
    pub fn stats(&self) -> &ChainStats {
        &self.stats
    }

    /// The global fact store.
    pub fn store(&self) -> &Arc<FactStore> {
        &self.store
    }

    /// The focus-set store, when one is active.
    pub fn focus_store(&self) -> Option<&Arc<FactStore>> {
        self.focus_store.as_ref()
    }

    /// The name of the rule base this chainer was built from.
    pub fn rule_base(&self) -> &str {
        &self.rule_base
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

impl std::fmt::Debug for ForwardChainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardChainer")
            .field("rule_base", &self.rule_base)
            .field("rules", &self.rules.len())
            .field("iteration", &self.iteration)
            .field("potential_sources", &self.potential_sources.len())
            .field("focus", &self.focus_store.is_some())
            .finish()
    }
}
