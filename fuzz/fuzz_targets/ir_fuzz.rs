//! Fuzz step assembly with arbitrary JSON block streams.
//!
//! Any stream that deserializes must either assemble or fail with
//! `LoweringError`; a panic is a bug.

#![no_main]

use gql_lowering::{ExactTypeOnly, blocks_from_json, convert_to_cypher_query};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(blocks) = blocks_from_json(input) else {
        return;
    };
    if let Ok(query) = convert_to_cypher_query(&blocks, &ExactTypeOnly) {
        // Every step binds a distinct location.
        let mut bound: Vec<_> = query.steps.iter().map(|s| s.bound_location()).collect();
        bound.sort();
        bound.dedup();
        assert_eq!(bound.len(), query.steps.len());
    }
});
