//! Vertex locations referenced by IR blocks.
//!
//! A [`Location`] names a vertex binding introduced by a `MarkLocation`
//! block. Later blocks (filters, outputs, backtracks) refer to locations but
//! never own them. A [`FoldScopeLocation`] names the root of a `@fold` scope:
//! a base location plus the edges traversed inside the fold.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction in which an edge is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    In,
    Out,
}

impl EdgeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeDirection::In => "in",
            EdgeDirection::Out => "out",
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vertex binding in the query.
///
/// Identified by the path of vertex fields walked from the root type plus a
/// visit counter that distinguishes repeated visits of the same path
/// (e.g. after a `Backtrack` and a second traversal of the same edge).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub query_path: Vec<String>,
    pub visit_counter: u32,
}

impl Location {
    /// The location of the query root.
    pub fn root(root_type: &str) -> Self {
        Location {
            query_path: vec![root_type.to_string()],
            visit_counter: 1,
        }
    }

    /// The location reached by following `vertex_field` from this location.
    pub fn navigate_to_subpath(&self, vertex_field: &str) -> Self {
        let mut query_path = self.query_path.clone();
        query_path.push(vertex_field.to_string());
        Location {
            query_path,
            visit_counter: 1,
        }
    }

    /// The same path, visited once more.
    pub fn revisit(&self) -> Self {
        Location {
            query_path: self.query_path.clone(),
            visit_counter: self.visit_counter + 1,
        }
    }

    /// Identifier-safe name, e.g. `Animal__out_ParentOf___1`.
    pub fn name(&self) -> String {
        format!("{}___{}", self.query_path.join("__"), self.visit_counter)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// The root of a `@fold` scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FoldScopeLocation {
    pub base_location: Location,
    pub fold_path: Vec<(EdgeDirection, String)>,
}

impl FoldScopeLocation {
    pub fn new(base_location: Location, direction: EdgeDirection, edge_name: &str) -> Self {
        FoldScopeLocation {
            base_location,
            fold_path: vec![(direction, edge_name.to_string())],
        }
    }
}

impl fmt::Display for FoldScopeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_location.query_path.join("__"))?;
        for (direction, edge_name) in &self.fold_path {
            write!(f, "__{direction}_{edge_name}")?;
        }
        write!(f, "___{}", self.base_location.visit_counter)
    }
}
