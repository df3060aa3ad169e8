//! # heka
//!
//! A symbolic forward-chaining inference engine over a typed hypergraph of
//! facts and rules.
//!
//! ## Architecture
//!
//! - **Atoms** (`atom`): typed nodes and links with truth and attention
//!   values, referenced through opaque handles
//! - **Fact stores** (`store`): arena-owned atoms with structural interning
//!   and parent overlays — reads cascade, writes stay local
//! - **Rules** (`rules`): named BindLink handles with selection weights
//! - **Pattern matching** (`matcher`): a swappable matcher seam plus the
//!   reference implementation, with substitution and template instantiation
//! - **Chaining** (`chain`): the iteration-bounded control loop with
//!   stochastic source and rule selection, rule derivation, and statistics
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use heka::atom::AtomType;
//! use heka::chain::{ChainConfig, ForwardChainer};
//! use heka::rules::{Rule, RuleBase};
//! use heka::store::FactStore;
//!
//! # fn main() -> heka::error::HekaResult<()> {
//! let store = Arc::new(FactStore::new());
//! let a = store.add_node(AtomType::ConceptNode, "A")?;
//! let b = store.add_node(AtomType::ConceptNode, "B")?;
//! store.add_link(AtomType::ImplicationLink, vec![a, b])?;
//!
//! let x = store.add_node(AtomType::VariableNode, "$x")?;
//! let y = store.add_node(AtomType::VariableNode, "$y")?;
//! let vardecl = store.add_link(AtomType::VariableList, vec![x, y])?;
//! let pattern = store.add_link(AtomType::ImplicationLink, vec![x, y])?;
//! let body = store.add_link(AtomType::AndLink, vec![pattern, x])?;
//! let bind = store.add_link(AtomType::BindLink, vec![vardecl, body, y])?;
//! let base = RuleBase::new("deduction").with_rule(Rule::new("modus-ponens", bind));
//!
//! let mut chainer = ForwardChainer::new(
//!     store,
//!     base,
//!     a,
//!     &[],
//!     ChainConfig::default().with_maximum_iterations(1),
//! )?;
//! chainer.run()?;
//! assert!(chainer.result().contains(&b));
//! # Ok(())
//! # }
//! ```

pub mod atom;
pub mod chain;
pub mod error;
pub mod matcher;
pub mod rules;
pub mod store;
