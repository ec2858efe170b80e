//! Backend lowering for a graph query compiler.
//!
//! A compiled query arrives as a linear stream of IR [`Block`]s. This crate
//! lowers that stream to two targets:
//!
//! - **Pattern matching** ([`cypher`]): the stream is grouped into
//!   [`CypherStep`]s, one per traversal, each knowing the vertex it binds and
//!   the earlier vertex it hangs off. Fold scopes are split out first.
//! - **Relational** ([`sql`]): a [`QueryTree`] of per-location nodes,
//!   together with a caller-supplied [`MetadataProvider`], is emitted as one
//!   statement of nested CTEs. Optional edges become `LEFT OUTER JOIN`s and
//!   `@recurse` edges become bounded recursive CTEs with a cycle guard.
//!
//! Neither backend executes anything; both produce values that the caller
//! renders or sends on.
//!
//! # Example
//!
//! ```
//! use gql_lowering::{Block, ExactTypeOnly, Expression, Location, convert_to_cypher_query};
//!
//! let root = Location::root("Animal");
//! let blocks = vec![
//!     Block::query_root("Animal"),
//!     Block::mark_location(&root),
//!     Block::GlobalOperationsStart,
//!     Block::construct_result([("name", Expression::context_field(&root, "name"))]),
//! ];
//! let query = convert_to_cypher_query(&blocks, &ExactTypeOnly).unwrap();
//! assert_eq!(query.steps.len(), 1);
//! ```

pub mod config;
pub mod cypher;
pub mod error;
pub mod hash;
pub mod ir;
pub mod sql;

pub use config::{LoweringConfig, SqlBackend};
pub use cypher::{
    CypherQuery, CypherStep, ExactTypeOnly, StepBlock, TypeHierarchy, assemble_steps,
    convert_to_cypher_query,
};
pub use error::{LoweringError, LoweringErrorKind};
pub use ir::{
    BinaryOperator, Block, BlockKind, EdgeDirection, Expression, FoldScopeLocation, FoldsMapping,
    Location, blocks_from_json, blocks_to_json, extract_folds_from_ir_blocks,
};
pub use sql::{
    MetadataProvider, NodeId, QueryNode, QueryTree, SqlEmitter, Statement, emit_code_from_ir,
};
