//! Recursive CTE construction for bounded-depth traversal (`@recurse`).
//!
//! For a recursing node bound to table `t` with edge columns `(source, sink)`
//! and parent link column `link` in CTE `p`:
//!
//! ```sql
//! <name> AS (
//!   -- Anchor: every vertex the parent links to, at depth 0
//!   SELECT DISTINCT t.base AS source, t.base AS sink, 0 AS depth,
//!          (',' || CAST(t.base AS VARCHAR) || ',') AS path
//!   FROM t INNER JOIN (SELECT DISTINCT p.link AS link FROM p) AS l ON t.base = l.link
//!   UNION
//!   -- Step: one more hop, bounded and cycle-free
//!   SELECT e.source, <name>.sink, <name>.depth + 1,
//!          <name>.path || CAST(e.source AS VARCHAR) || ','
//!   FROM e INNER JOIN <name> ON e.sink = <name>.source
//!   WHERE <name>.depth < max_depth
//!     AND NOT (<name>.path LIKE '%,' || CAST(e.source AS VARCHAR) || ',%')
//! )
//! ```
//!
//! The path is bracketed by the delimiter on both ends so the membership
//! test matches whole ids only (`1` never matches inside `,10,`). Direction
//! `in` swaps the source and sink columns. The node then joins the CTE on
//! `t.base = source`, and `sink` becomes the column linking the node back
//! to its parent.

use crate::error::LoweringError;
use crate::ir::EdgeDirection;
use crate::sql::ast::{
    BoundTable, CompareOp, Cte, CteBody, FromItem, JoinKind, Select, SelectItem, SqlExpr,
};
use crate::sql::emit::{OutputColumn, SqlEmitter};
use crate::sql::metadata::{Edge, MetadataProvider, validate_edge};
use crate::sql::tree::{NodeBlock, NodeId};
use tracing::debug;

/// Output name of the distinct parent-link subquery.
const LINK_COLUMN: &str = "link";

/// Where a recursion attaches to its parent.
#[derive(Debug, Clone)]
pub(crate) struct RecursionLink {
    /// The parent's materialized CTE.
    pub parent_cte: BoundTable,
    /// Link column of that CTE.
    pub column: String,
}

/// Build the recursive CTE for node `id`, join it onto the node, and
/// return the name of the node's new link column.
pub(crate) fn create_recursive_clause<M: MetadataProvider + ?Sized>(
    emitter: &mut SqlEmitter<'_, M>,
    id: NodeId,
    link: &RecursionLink,
) -> Result<String, LoweringError> {
    let node = emitter.tree.node(id)?;
    let NodeBlock::Recurse(recurse) = &node.block else {
        return Err(LoweringError::InternalError(format!(
            "create_recursive_clause called on non-recursive node {}",
            node.location
        )));
    };
    let edge = validate_edge(
        emitter.metadata.get_edge(node, &node.relation),
        node,
        &node.relation,
    )?;

    let (base_col, mut source_col, mut sink_col, edge_table) = match &edge {
        Edge::Direct(direct) => (
            direct.source_col.clone(),
            direct.source_col.clone(),
            direct.sink_col.clone(),
            emitter.metadata.get_table(&node.relation),
        ),
        Edge::Junction(junction) => (
            junction.first_hop.source_col.clone(),
            junction.second_hop.source_col.clone(),
            junction.first_hop.sink_col.clone(),
            emitter
                .metadata
                .get_table_by_name(&junction.first_hop.table_name),
        ),
    };
    if recurse.direction == EdgeDirection::In {
        std::mem::swap(&mut source_col, &mut sink_col);
    }

    let depth_col = emitter.config.depth_column.clone();
    let path_col = emitter.config.path_column.clone();
    let delimiter = emitter.config.path_delimiter.clone();
    let cast_type = emitter.config.cast_type.clone();

    let node_table = emitter.state(id)?.table.clone();
    let base = node_table.column(&base_col);

    // ── Anchor ──────────────────────────────────────────────────────────
    let link_alias = emitter.next_alias(LINK_COLUMN);
    let parent_links = FromItem::Subquery {
        query: Box::new(Select {
            distinct: true,
            projection: vec![SelectItem::aliased(
                link.parent_cte.column(&link.column),
                LINK_COLUMN,
            )],
            from: link.parent_cte.to_from_item(),
            filter: None,
        }),
        alias: link_alias.clone(),
    };
    let anchor = Select {
        distinct: true,
        projection: vec![
            SelectItem::aliased(base.clone(), source_col.as_str()),
            SelectItem::aliased(base.clone(), sink_col.as_str()),
            SelectItem::aliased(SqlExpr::integer(0), depth_col.as_str()),
            SelectItem::aliased(
                SqlExpr::Concat(vec![
                    SqlExpr::string(&delimiter),
                    SqlExpr::cast(base.clone(), &cast_type),
                    SqlExpr::string(&delimiter),
                ]),
                path_col.as_str(),
            ),
        ],
        from: FromItem::join(
            JoinKind::Inner,
            node_table.to_from_item(),
            parent_links,
            SqlExpr::eq(base.clone(), SqlExpr::column(&link_alias, LINK_COLUMN)),
        ),
        filter: None,
    };

    // ── Recursive step ──────────────────────────────────────────────────
    let cte_name = emitter.next_cte_name("recursive");
    let previous = BoundTable::cte(cte_name.clone());
    let edge_alias = emitter.next_alias(&edge_table.name);
    let edge_bound = edge_table.bind(edge_alias);
    let next_vertex = edge_bound.column(&source_col);

    let within_depth = SqlExpr::compare(
        CompareOp::Lt,
        previous.column(&depth_col),
        SqlExpr::integer(i64::from(recurse.depth)),
    );
    let not_visited = SqlExpr::Not(Box::new(SqlExpr::like(
        previous.column(&path_col),
        SqlExpr::Concat(vec![
            SqlExpr::string(&format!("%{delimiter}")),
            SqlExpr::cast(next_vertex.clone(), &cast_type),
            SqlExpr::string(&format!("{delimiter}%")),
        ]),
    )));
    let step = Select {
        distinct: false,
        projection: vec![
            SelectItem::aliased(next_vertex.clone(), source_col.as_str()),
            SelectItem::aliased(previous.column(&sink_col), sink_col.as_str()),
            SelectItem::aliased(
                SqlExpr::Add(
                    Box::new(previous.column(&depth_col)),
                    Box::new(SqlExpr::integer(1)),
                ),
                depth_col.as_str(),
            ),
            SelectItem::aliased(
                SqlExpr::Concat(vec![
                    previous.column(&path_col),
                    SqlExpr::cast(next_vertex, &cast_type),
                    SqlExpr::string(&delimiter),
                ]),
                path_col.as_str(),
            ),
        ],
        from: FromItem::join(
            JoinKind::Inner,
            edge_bound.to_from_item(),
            previous.to_from_item(),
            SqlExpr::eq(edge_bound.column(&sink_col), previous.column(&source_col)),
        ),
        filter: Some(SqlExpr::And(vec![within_depth, not_visited])),
    };

    debug!(
        cte = %cte_name,
        location = %node.location,
        depth = recurse.depth,
        combinator = emitter.combinator.as_str(),
        "built recursive clause"
    );
    emitter.push_cte(Cte {
        name: cte_name,
        recursive: true,
        body: CteBody::Compound {
            anchor: Box::new(anchor),
            combinator: emitter.combinator,
            step: Box::new(step),
        },
    });

    // ── Attach to the node ──────────────────────────────────────────────
    let label = emitter.next_link_label();
    let state = emitter.state_mut(id)?;
    state.join(
        JoinKind::Inner,
        previous.to_from_item(),
        SqlExpr::eq(base, previous.column(&source_col)),
    );
    state.link_columns.push(OutputColumn {
        expr: previous.column(&sink_col),
        name: label.clone(),
    });
    Ok(label)
}
