//! The forward chainer and its supporting pieces.
//!
//! - [`engine`] — the chainer control loop
//! - [`derive`] — unification and rule derivation
//! - [`select`] — weighted tournament selection
//! - [`stat`] — inference statistics

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChainError;

pub mod derive;
pub mod engine;
pub mod select;
pub mod stat;

pub use engine::ForwardChainer;
pub use stat::{ChainStats, InferenceRecord};

/// How candidate sources are scored for tournament selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceSelectionMode {
    /// Weight by truth-value fitness (high mean, high count).
    TvFitness,
    /// Weight by short-term importance.
    StiBased,
}

impl FromStr for SourceSelectionMode {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "TV_FITNESS" | "TV_FITNESS_BASED" => Ok(Self::TvFitness),
            "STI_BASED" => Ok(Self::StiBased),
            _ => Err(ChainError::UnknownMode { mode: s.into() }),
        }
    }
}

impl std::fmt::Display for SourceSelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TvFitness => write!(f, "TV_FITNESS"),
            Self::StiBased => write!(f, "STI_BASED"),
        }
    }
}

/// Configuration for a forward chain run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Hard upper bound on step count; the only termination condition.
    pub maximum_iterations: usize,
    /// Confine matching to attentionally-salient atoms.
    pub attention_allocation: bool,
    /// Source scoring mode.
    pub source_selection_mode: SourceSelectionMode,
    /// Tournament sample size for source and rule selection.
    pub tournament_size: usize,
    /// Seed for the chainer's RNG; fixed for reproducible runs.
    pub rng_seed: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            maximum_iterations: 20,
            attention_allocation: false,
            source_selection_mode: SourceSelectionMode::TvFitness,
            tournament_size: 2,
            rng_seed: 42,
        }
    }
}

impl ChainConfig {
    pub fn with_maximum_iterations(mut self, maximum_iterations: usize) -> Self {
        self.maximum_iterations = maximum_iterations;
        self
    }

    pub fn with_attention_allocation(mut self, attention_allocation: bool) -> Self {
        self.attention_allocation = attention_allocation;
        self
    }

    pub fn with_source_selection_mode(mut self, mode: SourceSelectionMode) -> Self {
        self.source_selection_mode = mode;
        self
    }

    pub fn with_tournament_size(mut self, tournament_size: usize) -> Self {
        self.tournament_size = tournament_size;
        self
    }

    pub fn with_rng_seed(mut self, rng_seed: u64) -> Self {
        self.rng_seed = rng_seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_the_original_spellings() {
        assert_eq!(
            "TV_FITNESS".parse::<SourceSelectionMode>().unwrap(),
            SourceSelectionMode::TvFitness
        );
        assert_eq!(
            "sti_based".parse::<SourceSelectionMode>().unwrap(),
            SourceSelectionMode::StiBased
        );
        assert_eq!(
            "tv-fitness".parse::<SourceSelectionMode>().unwrap(),
            SourceSelectionMode::TvFitness
        );
    }

    #[test]
    fn unknown_mode_is_an_error() {
        let err = "WEIGHT_BASED".parse::<SourceSelectionMode>().unwrap_err();
        assert!(matches!(err, ChainError::UnknownMode { mode } if mode == "WEIGHT_BASED"));
    }

    #[test]
    fn mode_display_round_trips() {
        for mode in [SourceSelectionMode::TvFitness, SourceSelectionMode::StiBased] {
            assert_eq!(mode.to_string().parse::<SourceSelectionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn config_builders() {
        let config = ChainConfig::default()
            .with_maximum_iterations(5)
            .with_source_selection_mode(SourceSelectionMode::StiBased)
            .with_tournament_size(4)
            .with_rng_seed(7);
        assert_eq!(config.maximum_iterations, 5);
        assert_eq!(config.source_selection_mode, SourceSelectionMode::StiBased);
        assert_eq!(config.tournament_size, 4);
        assert_eq!(config.rng_seed, 7);
    }
}
