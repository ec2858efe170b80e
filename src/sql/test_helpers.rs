//! Shared test builders for the SQL emitter.
//!
//! `ZooMetadata` models a small schema:
//!
//! ```text
//! animal(id, name, age, parent_id, species_id)
//! species(id, name)
//! friendship(animal_id, friend_id)   -- junction table for FriendsWith
//! ```
//!
//! Edges: `ParentOf` is stored directly on `animal` (`parent_id -> id`),
//! `OfSpecies` on `animal.species_id`, `FriendsWith` in `friendship`.

use crate::error::LoweringError;
use crate::ir::{Block, EdgeDirection, Location, Recurse, Traverse};
use crate::sql::ast::{BoundTable, SqlExpr, Table};
use crate::sql::lower::{NoContext, lower_expression};
use crate::sql::metadata::{
    DirectEdge, Edge, EdgeHop, JoinClause, JunctionEdge, MetadataProvider,
};
use crate::sql::tree::{NodeBlock, Predicate, QueryNode, QueryTree, Selection};

pub struct ZooMetadata {
    pub combinator: String,
}

impl Default for ZooMetadata {
    fn default() -> Self {
        ZooMetadata {
            combinator: "union".to_string(),
        }
    }
}

fn edge_name(node: &QueryNode) -> Option<&str> {
    match &node.block {
        NodeBlock::Root => None,
        NodeBlock::Traverse(traverse) => Some(&traverse.edge_name),
        NodeBlock::Recurse(recurse) => Some(&recurse.edge_name),
    }
}

fn friendship_hops() -> JunctionEdge {
    JunctionEdge {
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
    }
}

impl MetadataProvider for ZooMetadata {
    fn get_table(&self, relation: &str) -> Table {
        Table::new(relation)
    }

    fn get_table_by_name(&self, name: &str) -> Table {
        Table::new(name)
    }

    fn get_edge(&self, node: &QueryNode, _relation: &str) -> Option<Edge> {
        match edge_name(node)? {
            "ParentOf" => Some(Edge::Direct(DirectEdge {
                source_col: "id".into(),
                sink_col: "parent_id".into(),
            })),
            "FriendsWith" => Some(Edge::Junction(friendship_hops())),
            "RivalOf" => Some(Edge::Junction(JunctionEdge {
                second_hop: EdgeHop {
                    table_name: "rivalry".into(),
                    ..friendship_hops().second_hop
                },
                ..friendship_hops()
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
            Some("FriendsWith") => {
                let via = Table::new("friendship").bind(format!("{}_via", child_table.qualifier()));
                vec![
                    JoinClause {
                        on: SqlExpr::eq(via.column("animal_id"), parent_table.column("id")),
                        table: via.clone(),
                    },
                    JoinClause {
                        table: child_table.clone(),
                        on: SqlExpr::eq(child_table.column("id"), via.column("friend_id")),
                    },
                ]
            }
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
        self.combinator.clone()
    }
}

// ── Block payload builders ──────────────────────────────────────────────

pub fn traverse(edge_name: &str) -> Traverse {
    match Block::traverse(EdgeDirection::Out, edge_name) {
        Block::Traverse(traverse) => traverse,
        _ => unreachable!(),
    }
}

pub fn optional_traverse(edge_name: &str) -> Traverse {
    Traverse {
        optional: true,
        ..traverse(edge_name)
    }
}

pub fn recurse(direction: EdgeDirection, edge_name: &str, depth: u32) -> Recurse {
    match Block::recurse(direction, edge_name, depth) {
        Block::Recurse(recurse) => recurse,
        _ => unreachable!(),
    }
}

// ── Tree builders ───────────────────────────────────────────────────────

pub fn root_location() -> Location {
    Location::root("Animal")
}

/// `animal { name }`
pub fn single_node_tree() -> QueryTree {
    let mut tree = QueryTree::new_root(root_location(), "animal");
    tree.add_selection(tree.root(), Selection::new("name", "animal_name"))
        .unwrap();
    tree
}

/// `animal { name  out_ParentOf { name } }`, optionally `@optional`.
pub fn parent_child_tree(optional: bool) -> QueryTree {
    let mut tree = single_node_tree();
    let edge = if optional {
        optional_traverse("ParentOf")
    } else {
        traverse("ParentOf")
    };
    let child = tree
        .add_child(
            tree.root(),
            root_location().navigate_to_subpath("out_ParentOf"),
            "animal",
            edge,
        )
        .unwrap();
    tree.add_selection(child, Selection::new("name", "child_name"))
        .unwrap();
    tree
}

/// `animal { name  out_ParentOf @recurse(depth) { name } }`
pub fn recursive_tree(direction: EdgeDirection, edge_name: &str, depth: u32) -> QueryTree {
    let mut tree = single_node_tree();
    let rec = tree
        .add_recursion(
            tree.root(),
            root_location().navigate_to_subpath(&format!("{direction}_{edge_name}")),
            "animal",
            recurse(direction, edge_name, depth),
        )
        .unwrap();
    tree.add_selection(rec, Selection::new("name", "descendant_name"))
        .unwrap();
    tree
}
