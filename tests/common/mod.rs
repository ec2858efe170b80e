//! Shared fixtures for integration tests: a zoo schema provider and IR
//! stream builders.

#![allow(dead_code)]

use gql_lowering::ir::{Block, EdgeDirection, Expression, Location, Recurse, Traverse};
use gql_lowering::sql::{
    BoundTable, DirectEdge, Edge, EdgeHop, JoinClause, JunctionEdge, MetadataProvider, NoContext,
    NodeBlock, Predicate, QueryNode, QueryTree, Selection, SqlExpr, Table, lower_expression,
};
use gql_lowering::{LoweringConfig, LoweringError};

pub const SCHEMA: &str = "zoo";

/// Install a test-writer subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Metadata provider ──────────────────────────────────────────────────────

/// Physical binding of the zoo schema:
///
/// ```text
/// zoo.animal(id, name, net_worth, parent_id, species_id)
/// zoo.species(id, name)
/// zoo.friendship(animal_id, friend_id)
/// ```
pub struct ZooSchema {
    pub config: LoweringConfig,
}

impl ZooSchema {
    pub fn new() -> Self {
        ZooSchema {
            config: LoweringConfig::default(),
        }
    }

    pub fn with_config(config: LoweringConfig) -> Self {
        ZooSchema { config }
    }
}

fn edge_name(node: &QueryNode) -> Option<&str> {
    match &node.block {
        NodeBlock::Root => None,
        NodeBlock::Traverse(traverse) => Some(&traverse.edge_name),
        NodeBlock::Recurse(recurse) => Some(&recurse.edge_name),
    }
}

impl MetadataProvider for ZooSchema {
    fn get_table(&self, relation: &str) -> Table {
        Table::in_schema(SCHEMA, relation)
    }

    fn get_table_by_name(&self, name: &str) -> Table {
        Table::in_schema(SCHEMA, name)
    }

    fn get_edge(&self, node: &QueryNode, _relation: &str) -> Option<Edge> {
        match edge_name(node)? {
            "ParentOf" => Some(Edge::Direct(DirectEdge {
                source_col: "id".into(),
                sink_col: "parent_id".into(),
            })),
            "FriendsWith" => Some(Edge::Junction(JunctionEdge {
                first_hop: EdgeHop {
                    table_name: "friendship".into(),
                    source_col: "id".into(),
                    sink_col: "animal_id".into(),
                },
                second_hop: EdgeHop {
                    table_name: "friendship".into(),
                    source_col: "friend_id".into(),
                    sink_col: "id".into(),
                },
            })),
            _ => None,
        }
    }

    fn get_join_clauses_for_child(
        &self,
        _parent: &QueryNode,
        child: &QueryNode,
        parent_table: &BoundTable,
        child_table: &BoundTable,
    ) -> Vec<JoinClause> {
        match edge_name(child) {
            Some("ParentOf") => vec![JoinClause {
                table: child_table.clone(),
                on: SqlExpr::eq(child_table.column("parent_id"), parent_table.column("id")),
            }],
            Some("OfSpecies") => vec![JoinClause {
                table: child_table.clone(),
                on: SqlExpr::eq(child_table.column("id"), parent_table.column("species_id")),
            }],
            _ => Vec::new(),
        }
    }

    fn get_column_for_selection(&self, selection: &Selection, table: &BoundTable) -> SqlExpr {
        table.column(&selection.field)
    }

    fn get_predicate_condition(
        &self,
        _node: &QueryNode,
        predicate: &Predicate,
        table: &BoundTable,
    ) -> Result<SqlExpr, LoweringError> {
        lower_expression(&predicate.expression, table, &NoContext)
    }

    fn get_presence_column(&self, _node: &QueryNode, table: &BoundTable) -> SqlExpr {
        table.column("id")
    }

    fn recursion_combinator(&self) -> String {
        self.config.combinator_name().to_string()
    }
}

// ── Query trees ────────────────────────────────────────────────────────────

pub fn animal_root() -> Location {
    Location::root("Animal")
}

pub fn traverse(edge_name: &str, optional: bool) -> Traverse {
    Traverse {
        direction: EdgeDirection::Out,
        edge_name: edge_name.into(),
        optional,
        within_optional_scope: false,
    }
}

pub fn recurse(direction: EdgeDirection, edge_name: &str, depth: u32) -> Recurse {
    Recurse {
        direction,
        edge_name: edge_name.into(),
        depth,
        within_optional_scope: false,
    }
}

/// `Animal { name  out_OfSpecies @optional { name }  out_ParentOf @recurse(depth) { name } }`
pub fn zoo_tree(depth: u32) -> QueryTree {
    let root = animal_root();
    let mut tree = QueryTree::new_root(root.clone(), "animal");
    let root_id = tree.root();
    tree.add_selection(root_id, Selection::new("name", "animal_name"))
        .expect("root exists");

    let species = tree
        .add_child(
            root_id,
            root.navigate_to_subpath("out_OfSpecies"),
            "species",
            traverse("OfSpecies", true),
        )
        .expect("root exists");
    tree.add_selection(species, Selection::new("name", "species_name"))
        .expect("species exists");

    let descendants = tree
        .add_recursion(
            root_id,
            root.navigate_to_subpath("out_ParentOf"),
            "animal",
            recurse(EdgeDirection::Out, "ParentOf", depth),
        )
        .expect("root exists");
    tree.add_selection(descendants, Selection::new("name", "descendant_name"))
        .expect("recursion exists");
    tree
}

// ── IR streams ─────────────────────────────────────────────────────────────

pub fn output_name(location: &Location) -> Block {
    Block::construct_result([("name", Expression::context_field(location, "name"))])
}

/// Root plus one traversal per edge, each backtracking to the root.
pub fn star_stream(edges: &[&str]) -> Vec<Block> {
    let root = animal_root();
    let mut blocks = vec![Block::query_root("Animal"), Block::mark_location(&root)];
    for edge in edges {
        blocks.push(Block::traverse(EdgeDirection::Out, edge));
        blocks.push(Block::coerce_type("Animal"));
        blocks.push(Block::mark_location(
            &root.navigate_to_subpath(&format!("out_{edge}")),
        ));
        blocks.push(Block::backtrack(&root));
    }
    blocks.push(Block::GlobalOperationsStart);
    blocks.push(output_name(&root));
    blocks
}
