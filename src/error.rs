//! Error types for gql_lowering.
//!
//! All errors that can occur while lowering IR are represented by [`LoweringError`].
//! Errors are propagated via `Result<T, LoweringError>` throughout the crate and
//! surfaced by the surrounding compiler pipeline as "internal compiler error"
//! failures, distinct from the front end's user-facing validation errors.
//!
//! # Error Classification
//!
//! Errors are classified into two categories:
//! - **Internal**: the IR stream or query tree violates an invariant the
//!   upstream lowering passes are supposed to guarantee. Indicates a bug.
//! - **Configuration**: the backend or configuration names something the
//!   emitter cannot apply (e.g. an unknown recursion combinator).
//!
//! Neither category is retried: any error aborts the current compilation,
//! since a partially lowered query is worse than no query at all.

use std::fmt;

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum LoweringError {
    // ── Internal errors: upstream lowering defects ──────────────────────
    /// The IR block stream does not match the step / global-operations grammar.
    #[error("malformed IR at {}: {reason} (block: {block})", position_label(.position))]
    MalformedIr {
        /// Index of the offending block in the stream, if the failure is tied to one.
        position: Option<usize>,
        /// Rendered offending block, or the rendered block sequence for shape errors.
        block: String,
        reason: String,
    },

    /// An edge's metadata matches neither a direct nor a junction-table edge.
    #[error("unsupported edge shape for relation {relation} at {location}: {detail}")]
    UnsupportedEdgeShape {
        location: String,
        relation: String,
        detail: String,
    },

    /// An unexpected internal inconsistency in the query tree.
    #[error("internal error: {0}")]
    InternalError(String),

    // ── Configuration errors ─────────────────────────────────────────────
    /// The metadata provider named a set operation that cannot combine
    /// the anchor and recursive terms of a recursive CTE.
    #[error("cannot combine anchor and recursive clauses with operation \"{0}\"")]
    UnsupportedRecursionCombinator(String),

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn position_label(position: &Option<usize>) -> String {
    match position {
        Some(index) => format!("position {index}"),
        None => "block sequence".to_string(),
    }
}

impl LoweringError {
    /// Build a `MalformedIr` error for a block at a known stream position.
    pub fn malformed_at(
        position: usize,
        block: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        LoweringError::MalformedIr {
            position: Some(position),
            block: block.to_string(),
            reason: reason.into(),
        }
    }

    /// Build a `MalformedIr` error for a shape violation that spans several blocks.
    pub fn malformed_shape(blocks: impl fmt::Display, reason: impl Into<String>) -> Self {
        LoweringError::MalformedIr {
            position: None,
            block: blocks.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify the error for reporting.
    pub fn kind(&self) -> LoweringErrorKind {
        match self {
            LoweringError::MalformedIr { .. }
            | LoweringError::UnsupportedEdgeShape { .. }
            | LoweringError::InternalError(_) => LoweringErrorKind::Internal,

            LoweringError::UnsupportedRecursionCombinator(_) | LoweringError::Config(_) => {
                LoweringErrorKind::Configuration
            }
        }
    }

    /// Whether callers should surface this as an internal compiler error.
    ///
    /// True for every failure caused by the shape of the IR or query tree.
    pub fn is_internal_compiler_error(&self) -> bool {
        self.kind() == LoweringErrorKind::Internal
    }
}

/// Classification of error kind for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoweringErrorKind {
    Internal,
    Configuration,
}

impl fmt::Display for LoweringErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoweringErrorKind::Internal => write!(f, "INTERNAL"),
            LoweringErrorKind::Configuration => write!(f, "CONFIGURATION"),
        }
    }
}
