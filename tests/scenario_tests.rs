//! End-to-end scenarios through the public API:
//! - IR loaded from JSON → pattern-matching steps
//! - query tree → recursive-CTE statement, checked structurally
//! - configuration loaded from TOML driving the emitter
//! - malformed input rejected without partial output

mod common;

use common::{ZooSchema, animal_root, init_tracing, star_stream, zoo_tree};
use gql_lowering::cypher::StepBlock;
use gql_lowering::sql::{CteBody, JoinKind, SetCombinator, SqlEmitter};
use gql_lowering::{
    ExactTypeOnly, LoweringConfig, LoweringError, LoweringErrorKind, SqlBackend,
    blocks_from_json, convert_to_cypher_query, emit_code_from_ir,
};
use regex_lite::Regex;

const PARENT_WITH_FOLD_JSON: &str = r#"[
    {"QueryRoot": {"start_types": ["Animal"]}},
    {"MarkLocation": {"location": {"query_path": ["Animal"], "visit_counter": 1}}},
    {"Fold": {"fold_scope_location": {
        "base_location": {"query_path": ["Animal"], "visit_counter": 1},
        "fold_path": [["out", "FriendsWith"]]
    }}},
    {"CoerceType": {"target_types": ["Animal"]}},
    "Unfold",
    {"Traverse": {"direction": "out", "edge_name": "ParentOf", "optional": true}},
    {"CoerceType": {"target_types": ["Animal"]}},
    {"MarkLocation": {"location": {"query_path": ["Animal", "out_ParentOf"], "visit_counter": 1}}},
    "EndOptional",
    {"Backtrack": {"location": {"query_path": ["Animal"], "visit_counter": 1}}},
    {"Recurse": {"direction": "in", "edge_name": "ParentOf", "depth": 2}},
    {"CoerceType": {"target_types": ["Animal"]}},
    {"MarkLocation": {"location": {"query_path": ["Animal", "in_ParentOf"], "visit_counter": 1}}},
    "GlobalOperationsStart",
    {"ConstructResult": {"fields": {
        "name": {"ContextField": {
            "location": {"query_path": ["Animal"], "visit_counter": 1},
            "field": "name"
        }}
    }}}
]"#;

// ── Scenario 1: JSON stream to pattern-matching steps ──────────────────────

#[test]
fn test_scenario_json_stream_to_steps() {
    init_tracing();
    let blocks = blocks_from_json(PARENT_WITH_FOLD_JSON).unwrap();
    let query = convert_to_cypher_query(&blocks, &ExactTypeOnly).unwrap();

    assert_eq!(query.steps.len(), 3);
    assert_eq!(query.folds.len(), 1);
    assert!(query.global_where_block.is_none());
    assert_eq!(query.output_block.fields.len(), 1);

    let root = animal_root();
    assert!(matches!(query.steps[0].step_block, StepBlock::QueryRoot(_)));
    assert_eq!(query.steps[0].linked_location, None);

    assert!(matches!(
        &query.steps[1].step_block,
        StepBlock::Traverse(traverse) if traverse.optional
    ));
    assert_eq!(query.steps[1].linked_location.as_ref(), Some(&root));

    // The backtrack re-links the recursion to the root.
    assert!(matches!(
        &query.steps[2].step_block,
        StepBlock::Recurse(recurse) if recurse.depth == 2
    ));
    assert_eq!(query.steps[2].linked_location.as_ref(), Some(&root));
    assert_eq!(
        query.steps[2].bound_location(),
        &root.navigate_to_subpath("in_ParentOf")
    );
}

#[test]
fn test_scenario_star_pattern_links_every_branch_to_root() {
    let blocks = star_stream(&["ParentOf", "OfSpecies", "FriendsWith"]);
    let query = convert_to_cypher_query(&blocks, &ExactTypeOnly).unwrap();
    assert_eq!(query.steps.len(), 4);
    for step in &query.steps[1..] {
        assert_eq!(step.linked_location.as_ref(), Some(&animal_root()));
    }
}

#[test]
fn test_scenario_malformed_stream_reports_position() {
    let mut blocks = star_stream(&["ParentOf"]);
    // Drop GlobalOperationsStart.
    let global = blocks.len() - 2;
    blocks.remove(global);

    let err = convert_to_cypher_query(&blocks, &ExactTypeOnly).unwrap_err();
    match &err {
        LoweringError::MalformedIr { position, .. } => assert_eq!(*position, Some(global)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), LoweringErrorKind::Internal);
    assert!(err.is_internal_compiler_error());
}

// ── Scenario 2: query tree to recursive CTE statement ──────────────────────

#[test]
fn test_scenario_zoo_tree_statement_shape() {
    init_tracing();
    let statement = emit_code_from_ir(&zoo_tree(3), &ZooSchema::new()).unwrap();
    let sql = statement.to_string();

    assert!(sql.starts_with("WITH RECURSIVE "), "{sql}");
    let cte_defs = Regex::new(r#""__gql_cte_(\w+)_(\d+)" AS \("#).unwrap();
    let names: Vec<String> = cte_defs
        .captures_iter(&sql)
        .map(|c| format!("{}_{}", &c[1], &c[2]))
        .collect();
    assert_eq!(names, vec!["animal_1", "recursive_2", "animal_3"]);

    // Tables are qualified with the schema.
    let relations = Regex::new(r#""zoo"\."(animal|species|friendship)" AS "\w+""#).unwrap();
    assert!(relations.find_iter(&sql).count() >= 4, "{sql}");

    // One anchor and one step, bounded and cycle-guarded.
    assert_eq!(sql.matches("\nUNION\n").count(), 1);
    assert!(sql.contains("\"__depth_internal_name\" < 3)"), "{sql}");
    let guard =
        Regex::new(r#"NOT \(".+"\."__path_internal_name" LIKE \('%,' \|\| CAST\("#).unwrap();
    assert!(guard.is_match(&sql), "{sql}");

    // Optional species inside the root CTE, recursion joined at the top.
    let root_cte = statement.cte("__gql_cte_animal_1").unwrap();
    match &root_cte.body {
        CteBody::Select(select) => {
            assert_eq!(select.from.count_joins(JoinKind::LeftOuter), 1);
        }
        other => panic!("unexpected root body: {other}"),
    }
    assert_eq!(statement.body.from.count_joins(JoinKind::Inner), 1);

    let outputs: Vec<_> = statement
        .body
        .projection
        .iter()
        .filter_map(|item| item.alias.as_deref())
        .collect();
    assert_eq!(outputs, vec!["animal_name", "species_name", "descendant_name"]);
}

#[test]
fn test_scenario_recompilation_is_byte_identical() {
    let tree = zoo_tree(5);
    let schema = ZooSchema::new();
    let first = emit_code_from_ir(&tree, &schema).unwrap();
    let second = emit_code_from_ir(&tree, &schema).unwrap();
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_ne!(
        first.fingerprint(),
        emit_code_from_ir(&zoo_tree(4), &schema).unwrap().fingerprint()
    );
}

// ── Scenario 3: configuration from TOML ────────────────────────────────────

#[test]
fn test_scenario_mssql_config_uses_union_all() {
    let config = LoweringConfig::from_toml_str(
        r#"
        backend = "mssql"
        cast_type = "NVARCHAR(4000)"
        cte_prefix = "__mssql"
        "#,
    )
    .unwrap();
    assert_eq!(config.backend, SqlBackend::Mssql);

    let schema = ZooSchema::with_config(config.clone());
    let tree = zoo_tree(2);
    let statement = SqlEmitter::with_config(&tree, &schema, config)
        .emit()
        .unwrap();

    let recursive = statement.cte("__mssql_recursive_2").unwrap();
    assert!(matches!(
        recursive.body,
        CteBody::Compound {
            combinator: SetCombinator::UnionAll,
            ..
        }
    ));
    assert!(statement.to_string().contains("AS NVARCHAR(4000))"));
}

#[test]
fn test_scenario_unsupported_combinator_in_config() {
    let config = LoweringConfig {
        recursion_combinator: Some("intersect".into()),
        ..LoweringConfig::default()
    };
    assert!(config.validate().is_err());

    let tree = zoo_tree(2);
    let schema = ZooSchema::new();
    let err = SqlEmitter::with_config(&tree, &schema, config)
        .emit()
        .unwrap_err();
    assert_eq!(err.kind(), LoweringErrorKind::Configuration);
}

// ── Scenario 4: edges the schema cannot express ────────────────────────────

#[test]
fn test_scenario_recursion_over_unknown_edge() {
    let mut tree = zoo_tree(2);
    let root = tree.root();
    tree.add_recursion(
        root,
        animal_root().navigate_to_subpath("out_Eats"),
        "animal",
        common::recurse(gql_lowering::EdgeDirection::Out, "Eats", 2),
    )
    .unwrap();
    let err = emit_code_from_ir(&tree, &ZooSchema::new()).unwrap_err();
    assert!(matches!(err, LoweringError::UnsupportedEdgeShape { .. }));
}
