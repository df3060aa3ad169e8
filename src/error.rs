//! Rich diagnostic error types for the heka engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong and
//! how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the heka engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum HekaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Chain(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("foreign handle {handle} is not visible from this fact store")]
    #[diagnostic(
        code(heka::store::foreign_handle),
        help(
            "Outgoing sets may only reference atoms owned by the same fact store \
             or one of its ancestors. Copy the atom in first with `copy_from()`."
        )
    )]
    ForeignHandle { handle: String },

    #[error("stale handle {handle}: the owning fact store is gone or never held it")]
    #[diagnostic(
        code(heka::store::stale_handle),
        help(
            "The handle does not resolve in the store it was presented to. \
             Temporary fact stores are dropped at the end of each derivation — \
             copy atoms out before the store goes away."
        )
    )]
    StaleHandle { handle: String },

    #[error("malformed atom: {reason}")]
    #[diagnostic(
        code(heka::store::malformed_atom),
        help(
            "Node bodies require a node type code and link bodies a link type code. \
             Build atoms with `Atom::node()` / `Atom::link()` and a matching type."
        )
    )]
    MalformedAtom { reason: String },
}

// ---------------------------------------------------------------------------
// Matcher errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MatchError {
    #[error("handle {handle} is not a BindLink")]
    #[diagnostic(
        code(heka::matcher::not_a_bindlink),
        help(
            "The pattern matcher operates on BindLink atoms: a 3-ary link of \
             (variable declaration, body, implicand). Check the handle you passed."
        )
    )]
    NotABindLink { handle: String },

    #[error("malformed pattern: {reason}")]
    #[diagnostic(
        code(heka::matcher::malformed_pattern),
        help(
            "A BindLink's outgoing set must be exactly (variable declaration, \
             body, implicand), each resolvable in the target fact store."
        )
    )]
    MalformedPattern { reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Chainer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ChainError {
    #[error("invalid source: the initial source handle does not resolve")]
    #[diagnostic(
        code(heka::chain::invalid_source),
        help(
            "The forward chainer needs at least one resolvable source atom to \
             start from. Intern the source in the fact store before constructing \
             the chainer."
        )
    )]
    InvalidSource,

    #[error("unknown source selection mode: \"{mode}\"")]
    #[diagnostic(
        code(heka::chain::unknown_mode),
        help("Valid source selection modes are TV_FITNESS and STI_BASED.")
    )]
    UnknownMode { mode: String },

    #[error("malformed rule {rule}: {reason}")]
    #[diagnostic(
        code(heka::chain::malformed_rule),
        help(
            "A rule wraps a BindLink: a 3-ary link of (variable declaration, \
             body, implicand). Check the atom the rule points at."
        )
    )]
    MalformedRule { rule: String, reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Match(#[from] MatchError),
}

/// Convenience alias for functions returning heka results.
pub type HekaResult<T> = std::result::Result<T, HekaError>;

/// Result type for fact-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for pattern-matcher operations.
pub type MatchResult<T> = std::result::Result<T, MatchError>;

/// Result type for chainer operations.
pub type ChainResult<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_heka_error() {
        let err = StoreError::StaleHandle {
            handle: "h:1.0".into(),
        };
        let heka: HekaError = err.into();
        assert!(matches!(heka, HekaError::Store(StoreError::StaleHandle { .. })));
    }

    #[test]
    fn match_error_wraps_store_error() {
        let store_err = StoreError::ForeignHandle {
            handle: "h:2.7".into(),
        };
        let match_err: MatchError = store_err.into();
        assert!(matches!(
            match_err,
            MatchError::Store(StoreError::ForeignHandle { .. })
        ));
    }

    #[test]
    fn chain_error_wraps_match_error() {
        let match_err = MatchError::NotABindLink {
            handle: "h:3.1".into(),
        };
        let chain_err: ChainError = match_err.into();
        assert!(matches!(
            chain_err,
            ChainError::Match(MatchError::NotABindLink { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ChainError::UnknownMode {
            mode: "WEIGHT_BASED".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("WEIGHT_BASED"));
    }
}
