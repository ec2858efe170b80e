//! Relational backend: emits a query tree as nested CTEs.
//!
//! # Submodules
//! - `ast`: dialect-neutral statement AST with generic SQL rendering
//! - `tree`: the per-location query tree (arena)
//! - `metadata`: the caller-supplied physical binding
//! - `lower`: IR expression to SQL expression lowering
//! - `emit`: bottom-up collapse and CTE materialization
//! - `recursion`: recursive CTEs for `@recurse` edges

pub mod ast;
pub mod emit;
pub mod lower;
pub mod metadata;
pub(crate) mod recursion;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use ast::{
    BoundTable, CompareOp, Cte, CteBody, FromItem, JoinKind, Select, SelectItem, SetCombinator,
    SqlExpr, SqlLiteral, Statement, Table, quote_ident,
};
pub use emit::{SqlEmitter, emit_code_from_ir};
pub use lower::{ContextResolver, NoContext, lower_expression};
pub use metadata::{DirectEdge, Edge, EdgeHop, JoinClause, JunctionEdge, MetadataProvider};
pub use tree::{NodeBlock, NodeId, Predicate, QueryNode, QueryTree, Selection};
