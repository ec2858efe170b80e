//! IR block vocabulary.
//!
//! A compiled query reaches this crate as an ordered stream of [`Block`]s
//! emitted by the upstream lowering passes. Blocks are immutable once
//! emitted; consumers classify them by exhaustive `match`.

use crate::ir::expressions::Expression;
use crate::ir::location::{EdgeDirection, FoldScopeLocation, Location};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Start the query at the vertices of the given type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRoot {
    pub start_types: BTreeSet<String>,
}

/// Follow an edge to a neighboring vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traverse {
    pub direction: EdgeDirection,
    pub edge_name: String,
    /// The traversal is marked `@optional`.
    #[serde(default)]
    pub optional: bool,
    /// The traversal happens inside an enclosing `@optional` scope.
    #[serde(default)]
    pub within_optional_scope: bool,
}

/// Follow an edge repeatedly, up to `depth` hops (`@recurse`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurse {
    pub direction: EdgeDirection,
    pub edge_name: String,
    pub depth: u32,
    #[serde(default)]
    pub within_optional_scope: bool,
}

/// Return to a previously marked location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backtrack {
    pub location: Location,
    #[serde(default)]
    pub optional: bool,
}

/// Name the vertex currently being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkLocation {
    pub location: Location,
}

/// Restrict the current vertex to the given type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoerceType {
    pub target_types: BTreeSet<String>,
}

/// Keep only vertices satisfying the predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub predicate: Expression,
}

/// Open a `@fold` scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    pub fold_scope_location: FoldScopeLocation,
}

/// Describe the outputs returned to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructResult {
    pub fields: IndexMap<String, Expression>,
}

/// One IR instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    QueryRoot(QueryRoot),
    Traverse(Traverse),
    Recurse(Recurse),
    Backtrack(Backtrack),
    MarkLocation(MarkLocation),
    CoerceType(CoerceType),
    Filter(Filter),
    Fold(Fold),
    Unfold,
    OutputSource,
    EndOptional,
    GlobalOperationsStart,
    ConstructResult(ConstructResult),
}

/// The tag of a [`Block`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    QueryRoot,
    Traverse,
    Recurse,
    Backtrack,
    MarkLocation,
    CoerceType,
    Filter,
    Fold,
    Unfold,
    OutputSource,
    EndOptional,
    GlobalOperationsStart,
    ConstructResult,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::QueryRoot => "QueryRoot",
            BlockKind::Traverse => "Traverse",
            BlockKind::Recurse => "Recurse",
            BlockKind::Backtrack => "Backtrack",
            BlockKind::MarkLocation => "MarkLocation",
            BlockKind::CoerceType => "CoerceType",
            BlockKind::Filter => "Filter",
            BlockKind::Fold => "Fold",
            BlockKind::Unfold => "Unfold",
            BlockKind::OutputSource => "OutputSource",
            BlockKind::EndOptional => "EndOptional",
            BlockKind::GlobalOperationsStart => "GlobalOperationsStart",
            BlockKind::ConstructResult => "ConstructResult",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::QueryRoot(_) => BlockKind::QueryRoot,
            Block::Traverse(_) => BlockKind::Traverse,
            Block::Recurse(_) => BlockKind::Recurse,
            Block::Backtrack(_) => BlockKind::Backtrack,
            Block::MarkLocation(_) => BlockKind::MarkLocation,
            Block::CoerceType(_) => BlockKind::CoerceType,
            Block::Filter(_) => BlockKind::Filter,
            Block::Fold(_) => BlockKind::Fold,
            Block::Unfold => BlockKind::Unfold,
            Block::OutputSource => BlockKind::OutputSource,
            Block::EndOptional => BlockKind::EndOptional,
            Block::GlobalOperationsStart => BlockKind::GlobalOperationsStart,
            Block::ConstructResult(_) => BlockKind::ConstructResult,
        }
    }

    // ── Builders ────────────────────────────────────────────────────────

    pub fn query_root(start_type: &str) -> Block {
        Block::QueryRoot(QueryRoot {
            start_types: BTreeSet::from([start_type.to_string()]),
        })
    }

    pub fn traverse(direction: EdgeDirection, edge_name: &str) -> Block {
        Block::Traverse(Traverse {
            direction,
            edge_name: edge_name.to_string(),
            optional: false,
            within_optional_scope: false,
        })
    }

    pub fn optional_traverse(direction: EdgeDirection, edge_name: &str) -> Block {
        Block::Traverse(Traverse {
            direction,
            edge_name: edge_name.to_string(),
            optional: true,
            within_optional_scope: false,
        })
    }

    pub fn recurse(direction: EdgeDirection, edge_name: &str, depth: u32) -> Block {
        Block::Recurse(Recurse {
            direction,
            edge_name: edge_name.to_string(),
            depth,
            within_optional_scope: false,
        })
    }

    pub fn backtrack(location: &Location) -> Block {
        Block::Backtrack(Backtrack {
            location: location.clone(),
            optional: false,
        })
    }

    pub fn mark_location(location: &Location) -> Block {
        Block::MarkLocation(MarkLocation {
            location: location.clone(),
        })
    }

    pub fn coerce_type(target_type: &str) -> Block {
        Block::CoerceType(CoerceType {
            target_types: BTreeSet::from([target_type.to_string()]),
        })
    }

    pub fn filter(predicate: Expression) -> Block {
        Block::Filter(Filter { predicate })
    }

    pub fn fold(fold_scope_location: FoldScopeLocation) -> Block {
        Block::Fold(Fold {
            fold_scope_location,
        })
    }

    pub fn construct_result<'a>(fields: impl IntoIterator<Item = (&'a str, Expression)>) -> Block {
        Block::ConstructResult(ConstructResult {
            fields: fields
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        })
    }
}

fn join_types(types: &BTreeSet<String>) -> String {
    types.iter().cloned().collect::<Vec<_>>().join("|")
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::QueryRoot(b) => write!(f, "QueryRoot({})", join_types(&b.start_types)),
            Block::Traverse(b) => {
                let optional = if b.optional { ", optional" } else { "" };
                write!(f, "Traverse({}_{}{optional})", b.direction, b.edge_name)
            }
            Block::Recurse(b) => {
                write!(f, "Recurse({}_{}, depth={})", b.direction, b.edge_name, b.depth)
            }
            Block::Backtrack(b) => write!(f, "Backtrack({})", b.location),
            Block::MarkLocation(b) => write!(f, "MarkLocation({})", b.location),
            Block::CoerceType(b) => write!(f, "CoerceType({})", join_types(&b.target_types)),
            Block::Filter(b) => write!(f, "Filter({})", b.predicate),
            Block::Fold(b) => write!(f, "Fold({})", b.fold_scope_location),
            Block::Unfold => f.write_str("Unfold"),
            Block::OutputSource => f.write_str("OutputSource"),
            Block::EndOptional => f.write_str("EndOptional"),
            Block::GlobalOperationsStart => f.write_str("GlobalOperationsStart"),
            Block::ConstructResult(b) => {
                let names: Vec<&str> = b.fields.keys().map(String::as_str).collect();
                write!(f, "ConstructResult({})", names.join(", "))
            }
        }
    }
}

/// Display adapter for a block sequence, used in error context.
pub struct DisplayBlocks<'a>(pub &'a [Block]);

impl fmt::Display for DisplayBlocks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, block) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{block}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expressions::BinaryOperator;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Block::query_root("Animal").kind(), BlockKind::QueryRoot);
        assert_eq!(Block::Unfold.kind(), BlockKind::Unfold);
        assert_eq!(
            Block::recurse(EdgeDirection::Out, "ParentOf", 2).kind(),
            BlockKind::Recurse
        );
        assert_eq!(BlockKind::GlobalOperationsStart.to_string(), "GlobalOperationsStart");
    }

    #[test]
    fn test_display_blocks() {
        let loc = Location::root("Animal");
        let blocks = vec![
            Block::query_root("Animal"),
            Block::filter(Expression::binary(
                BinaryOperator::Eq,
                Expression::local_field("name"),
                Expression::variable("n"),
            )),
            Block::mark_location(&loc),
            Block::optional_traverse(EdgeDirection::In, "ParentOf"),
        ];
        assert_eq!(
            DisplayBlocks(&blocks).to_string(),
            "[QueryRoot(Animal), Filter((name = $n)), MarkLocation(Animal___1), \
             Traverse(in_ParentOf, optional)]"
        );
    }

    #[test]
    fn test_construct_result_preserves_field_order() {
        let loc = Location::root("Animal");
        let block = Block::construct_result([
            ("zeta", Expression::context_field(&loc, "name")),
            ("alpha", Expression::context_field(&loc, "uuid")),
        ]);
        let Block::ConstructResult(result) = block else {
            panic!("expected ConstructResult");
        };
        let names: Vec<&String> = result.fields.keys().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_traverse_defaults_when_deserialized() {
        let json = r#"{"Traverse": {"direction": "out", "edge_name": "ParentOf"}}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block, Block::traverse(EdgeDirection::Out, "ParentOf"));
    }
}
