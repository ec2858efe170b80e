//! Backend-agnostic intermediate representation consumed by both backends.
//!
//! # Submodules
//! - `blocks`: the tagged block vocabulary
//! - `expressions`: predicate and output expressions
//! - `location`: vertex and fold-scope locations
//! - `folds`: fold-scope extraction

pub mod blocks;
pub mod expressions;
pub mod folds;
pub mod location;

pub use blocks::{
    Backtrack, Block, BlockKind, CoerceType, ConstructResult, DisplayBlocks, Filter, Fold,
    MarkLocation, QueryRoot, Recurse, Traverse,
};
pub use expressions::{BinaryOperator, Expression};
pub use folds::{FoldsMapping, extract_folds_from_ir_blocks};
pub use location::{EdgeDirection, FoldScopeLocation, Location};

/// Deserialize a block stream from JSON.
pub fn blocks_from_json(json: &str) -> Result<Vec<Block>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Serialize a block stream to JSON.
pub fn blocks_to_json(blocks: &[Block]) -> Result<String, serde_json::Error> {
    serde_json::to_string(blocks)
}
