//! Graph pattern-matching backend: groups the IR stream into steps.
//!
//! # Submodules
//! - `query`: step and query objects
//! - `assemble`: the assembly state machine

pub mod assemble;
pub mod query;

pub use assemble::{assemble_steps, convert_to_cypher_query};
pub use query::{CypherQuery, CypherStep, ExactTypeOnly, StepBlock, TypeHierarchy};
