//! Pattern-matching query objects.
//!
//! A [`CypherQuery`] is the full representation of a query for a
//! graph-pattern-matching language: an ordered list of [`CypherStep`]s that
//! make up the pattern-matching clause, the blocks of each `@fold` scope,
//! an optional post-filter applied after pattern matching, and the block
//! describing the returned outputs.

use crate::ir::{
    ConstructResult, Filter, FoldsMapping, Location, MarkLocation, QueryRoot, Recurse, Traverse,
};
use std::collections::BTreeSet;

/// The block that opens a step of the pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum StepBlock {
    QueryRoot(QueryRoot),
    Traverse(Traverse),
    Recurse(Recurse),
}

/// One component of the graph pattern.
///
/// Either starts a new component of the pattern (`linked_location` is
/// `None`) or attaches a new vertex to an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherStep {
    /// Location this step is in relation to, if any.
    pub linked_location: Option<Location>,
    pub step_block: StepBlock,
    /// Type labels the vertex is required to have.
    pub step_types: BTreeSet<String>,
    /// Filtering applied to the vertex of this step.
    pub where_block: Option<Filter>,
    /// Names the vertex of this step.
    pub as_block: MarkLocation,
}

impl CypherStep {
    /// The location bound by this step.
    pub fn bound_location(&self) -> &Location {
        &self.as_block.location
    }
}

/// A complete pattern-matching query.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    pub steps: Vec<CypherStep>,
    pub folds: FoldsMapping,
    /// Post-filtering required after pattern matching (e.g. to uphold
    /// `@optional` semantics with nested filters).
    pub global_where_block: Option<Filter>,
    pub output_block: ConstructResult,
}

/// Resolution of an exact vertex type to the labels a step requires.
///
/// The default resolves a type to itself. Implementations backed by a
/// schema may return the full ancestor set instead.
pub trait TypeHierarchy {
    fn supertypes_of_exact_type(&self, exact_type: &str) -> BTreeSet<String> {
        BTreeSet::from([exact_type.to_string()])
    }
}

/// Requires exactly the coerced type and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTypeOnly;

impl TypeHierarchy for ExactTypeOnly {}
