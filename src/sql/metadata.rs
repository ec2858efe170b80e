//! Physical binding supplied by the caller.
//!
//! The emitter knows nothing about table layouts. Every table, edge,
//! column and join condition comes from a [`MetadataProvider`].

use crate::error::LoweringError;
use crate::sql::ast::{BoundTable, SqlExpr, Table};
use crate::sql::tree::{Predicate, QueryNode, Selection};

/// An edge stored as a pair of columns on a single relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectEdge {
    pub source_col: String,
    pub sink_col: String,
}

/// One hop of a junction-table edge.
///
/// The first hop leads from the vertex column `source_col` into the junction
/// column `sink_col`; the second hop leads from the junction column
/// `source_col` out to the vertex column `sink_col`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeHop {
    pub table_name: String,
    pub source_col: String,
    pub sink_col: String,
}

/// An edge stored in a junction table, traversed in two hops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionEdge {
    pub first_hop: EdgeHop,
    pub second_hop: EdgeHop,
}

/// Physical representation of a graph edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edge {
    Direct(DirectEdge),
    Junction(JunctionEdge),
}

impl Edge {
    /// The column a recursion is linked through on the node it hangs off.
    pub fn link_column(&self) -> &str {
        match self {
            Edge::Direct(edge) => &edge.source_col,
            Edge::Junction(edge) => &edge.first_hop.source_col,
        }
    }
}

/// One hop of the join from a parent node to a child node.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Table this hop joins in. When it equals the child's bound table the
    /// child's accumulated relation is joined instead.
    pub table: BoundTable,
    pub on: SqlExpr,
}

pub trait MetadataProvider {
    /// Table backing a vertex relation.
    fn get_table(&self, relation: &str) -> Table;

    /// Table by physical name (junction tables).
    fn get_table_by_name(&self, name: &str) -> Table;

    /// Physical edge traversed by `node` into `relation`.
    fn get_edge(&self, node: &QueryNode, relation: &str) -> Option<Edge>;

    /// Ordered join hops from `parent` (bound to `parent_table`) to `child`
    /// (bound to `child_table`).
    fn get_join_clauses_for_child(
        &self,
        parent: &QueryNode,
        child: &QueryNode,
        parent_table: &BoundTable,
        child_table: &BoundTable,
    ) -> Vec<JoinClause>;

    fn get_column_for_selection(&self, selection: &Selection, table: &BoundTable) -> SqlExpr;

    fn get_predicate_condition(
        &self,
        node: &QueryNode,
        predicate: &Predicate,
        table: &BoundTable,
    ) -> Result<SqlExpr, LoweringError>;

    /// A column of `node` that is non-NULL whenever the vertex exists.
    fn get_presence_column(&self, node: &QueryNode, table: &BoundTable) -> SqlExpr;

    /// Name of the set operation combining recursive anchor and step:
    /// `"union"` or `"union_all"`.
    fn recursion_combinator(&self) -> String;
}

/// Check an edge against the shapes the emitter can lower.
pub(crate) fn validate_edge(
    edge: Option<Edge>,
    node: &QueryNode,
    relation: &str,
) -> Result<Edge, LoweringError> {
    let unsupported = |detail: String| LoweringError::UnsupportedEdgeShape {
        location: node.location.name(),
        relation: relation.to_string(),
        detail,
    };

    let edge = edge.ok_or_else(|| unsupported("no edge metadata for relation".to_string()))?;
    match &edge {
        Edge::Direct(direct) => {
            if direct.source_col.is_empty() || direct.sink_col.is_empty() {
                return Err(unsupported(
                    "direct edge has an empty column name".to_string(),
                ));
            }
            if direct.source_col == direct.sink_col {
                return Err(unsupported(format!(
                    "direct edge source and sink are both {:?}",
                    direct.source_col
                )));
            }
        }
        Edge::Junction(junction) => {
            for hop in [&junction.first_hop, &junction.second_hop] {
                if hop.table_name.is_empty() || hop.source_col.is_empty() || hop.sink_col.is_empty()
                {
                    return Err(unsupported(format!(
                        "junction hop through {:?} has an empty name",
                        hop.table_name
                    )));
                }
            }
            if junction.first_hop.sink_col == junction.second_hop.source_col {
                return Err(unsupported(format!(
                    "junction hops enter and leave through the same column {:?}",
                    junction.first_hop.sink_col
                )));
            }
            if junction.first_hop.table_name != junction.second_hop.table_name {
                return Err(unsupported(format!(
                    "junction hops name different tables ({} and {})",
                    junction.first_hop.table_name, junction.second_hop.table_name
                )));
            }
        }
    }
    Ok(edge)
}
