//! Query-tree emission.
//!
//! Collapses a [`QueryTree`] bottom-up into a chain of CTEs and returns one
//! [`Statement`]. Per node:
//!
//! 1. collapse ordinary children into the node's relation (joins, pulled-up
//!    selections and predicates);
//! 2. if the node recurses, build its recursive CTE (see [`recursion`]);
//! 3. materialize the node's query as a CTE and rebind its columns to it;
//! 4. emit every recursion subtree hanging off the node and join it in.
//!
//! The root additionally yields the outward `SELECT DISTINCT`.
//!
//! The tree is read-only; all per-node state lives in a side table keyed by
//! [`NodeId`].
//!
//! [`recursion`]: crate::sql::recursion

use crate::config::LoweringConfig;
use crate::error::LoweringError;
use crate::sql::ast::{
    BoundTable, Cte, CteBody, FromItem, JoinKind, Select, SelectItem, SetCombinator, SqlExpr,
    Statement,
};
use crate::sql::metadata::{MetadataProvider, validate_edge};
use crate::sql::recursion::{self, RecursionLink};
use crate::sql::tree::{NodeBlock, NodeId, QueryNode, QueryTree};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Compile `tree` into a statement with default configuration.
pub fn emit_code_from_ir<M: MetadataProvider + ?Sized>(
    tree: &QueryTree,
    metadata: &M,
) -> Result<Statement, LoweringError> {
    SqlEmitter::new(tree, metadata).emit()
}

/// A named output column and the expression currently producing it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutputColumn {
    pub expr: SqlExpr,
    pub name: String,
}

impl OutputColumn {
    fn to_select_item(&self) -> SelectItem {
        SelectItem::aliased(self.expr.clone(), self.name.clone())
    }
}

/// Emission state of one node.
#[derive(Debug, Clone)]
pub(crate) struct NodeState {
    /// Table the node's columns are qualified with: its relation alias
    /// until materialized, then its CTE.
    pub table: BoundTable,
    pub from: FromItem,
    pub selections: Vec<OutputColumn>,
    pub predicates: Vec<SqlExpr>,
    /// Recursion subtrees to emit once this node is materialized.
    pub recursions: Vec<NodeId>,
    /// Link column on this node for each recursion.
    pub recursion_links: IndexMap<NodeId, String>,
    pub link_columns: Vec<OutputColumn>,
}

impl NodeState {
    /// Join `right` onto the accumulated from clause.
    pub fn join(&mut self, kind: JoinKind, right: FromItem, on: SqlExpr) {
        let left = std::mem::replace(&mut self.from, self.table.to_from_item());
        self.from = FromItem::join(kind, left, right, on);
    }
}

fn join_kind(node: &QueryNode) -> JoinKind {
    if node.optional {
        JoinKind::LeftOuter
    } else {
        JoinKind::Inner
    }
}

/// Context for one compilation of a query tree.
pub struct SqlEmitter<'a, M: ?Sized> {
    pub(crate) tree: &'a QueryTree,
    pub(crate) metadata: &'a M,
    pub(crate) config: LoweringConfig,
    /// Resolved before any SQL is built.
    pub(crate) combinator: SetCombinator,
    alias_counter: usize,
    cte_counter: usize,
    link_counter: usize,
    ctes: Vec<Cte>,
    states: HashMap<NodeId, NodeState>,
}

impl<'a, M: MetadataProvider + ?Sized> SqlEmitter<'a, M> {
    pub fn new(tree: &'a QueryTree, metadata: &'a M) -> Self {
        Self::with_config(tree, metadata, LoweringConfig::default())
    }

    pub fn with_config(tree: &'a QueryTree, metadata: &'a M, config: LoweringConfig) -> Self {
        SqlEmitter {
            tree,
            metadata,
            config,
            combinator: SetCombinator::Union,
            alias_counter: 0,
            cte_counter: 0,
            link_counter: 0,
            ctes: Vec::new(),
            states: HashMap::new(),
        }
    }

    /// Compile the tree into a statement.
    pub fn emit(mut self) -> Result<Statement, LoweringError> {
        self.config.validate()?;
        let combinator_name = match &self.config.recursion_combinator {
            Some(name) => name.clone(),
            None => self.metadata.recursion_combinator(),
        };
        self.combinator = combinator_name.parse()?;

        let root = self.tree.root();
        self.check_tree_shape(root)?;
        self.lower_subtree(root, None)?;
        let body = self.final_select(root)?;

        let statement = Statement {
            ctes: self.ctes,
            body,
        };
        let fingerprint = format!("{:016x}", statement.fingerprint());
        debug!(
            backend = self.config.backend.label(),
            ctes = statement.ctes.len(),
            recursive = statement.is_recursive(),
            fingerprint = %fingerprint,
            "emitted SQL statement"
        );
        Ok(statement)
    }

    // ── Naming ──────────────────────────────────────────────────────────

    /// Fresh table alias `<name>_<n>`.
    pub(crate) fn next_alias(&mut self, name: &str) -> String {
        self.alias_counter += 1;
        format!("{name}_{}", self.alias_counter)
    }

    /// Fresh CTE name with a descriptive part.
    pub(crate) fn next_cte_name(&mut self, part: &str) -> String {
        self.cte_counter += 1;
        format!("{}_{part}_{}", self.config.cte_prefix, self.cte_counter)
    }

    /// Fresh output name for a link column.
    pub(crate) fn next_link_label(&mut self) -> String {
        self.link_counter += 1;
        format!("__link_{}", self.link_counter)
    }

    pub(crate) fn push_cte(&mut self, cte: Cte) {
        self.ctes.push(cte);
    }

    // ── Side table ──────────────────────────────────────────────────────

    pub(crate) fn state(&self, id: NodeId) -> Result<&NodeState, LoweringError> {
        self.states.get(&id).ok_or_else(|| missing_state(id))
    }

    pub(crate) fn state_mut(&mut self, id: NodeId) -> Result<&mut NodeState, LoweringError> {
        self.states.get_mut(&id).ok_or_else(|| missing_state(id))
    }

    fn take_state(&mut self, id: NodeId) -> Result<NodeState, LoweringError> {
        self.states.remove(&id).ok_or_else(|| missing_state(id))
    }

    // ── Tree shape ──────────────────────────────────────────────────────

    fn check_tree_shape(&self, root: NodeId) -> Result<(), LoweringError> {
        let tree = self.tree;
        let root_node = tree.node(root)?;
        if root_node.parent.is_some() || root_node.block != NodeBlock::Root {
            return Err(LoweringError::InternalError(format!(
                "query tree root {} is not a root node",
                root_node.location
            )));
        }
        for id in tree.subtree(root)? {
            let node = tree.node(id)?;
            for &child in &node.children {
                if tree.node(child)?.is_recursive() {
                    return Err(LoweringError::InternalError(format!(
                        "recursive node {} is attached as an ordinary child",
                        tree.node(child)?.location
                    )));
                }
            }
            for &recursion in &node.recursions {
                if !tree.node(recursion)?.is_recursive() {
                    return Err(LoweringError::InternalError(format!(
                        "non-recursive node {} is attached as a recursion",
                        tree.node(recursion)?.location
                    )));
                }
            }
        }
        Ok(())
    }

    // ── Emission ────────────────────────────────────────────────────────

    /// Emit the subtree at `id`. For a recursive node, returns the name of
    /// the column carrying the link back to the parent.
    fn lower_subtree(
        &mut self,
        id: NodeId,
        link: Option<RecursionLink>,
    ) -> Result<Option<String>, LoweringError> {
        let node = self.tree.node(id)?;

        self.collapse(id)?;
        let out_link = if node.is_recursive() {
            let link = link.ok_or_else(|| {
                LoweringError::InternalError(format!(
                    "recursive node {} reached without a parent link",
                    node.location
                ))
            })?;
            Some(recursion::create_recursive_clause(self, id, &link)?)
        } else {
            None
        };
        let query = self.base_query(id)?;
        self.wrap_query_as_cte(id, query)?;
        self.traverse_recursions(id)?;
        Ok(out_link)
    }

    /// Post-order collapse of ordinary children into `id`.
    fn collapse(&mut self, id: NodeId) -> Result<(), LoweringError> {
        let node = self.tree.node(id)?;
        for &child in &node.children {
            self.collapse(child)?;
        }
        self.bind_table(id)?;
        self.create_links_for_recursions(id)?;
        for &child in &node.children {
            self.pull_up_and_join(id, child)?;
        }
        Ok(())
    }

    fn bind_table(&mut self, id: NodeId) -> Result<(), LoweringError> {
        let node = self.tree.node(id)?;
        let table = self.metadata.get_table(&node.relation);
        let alias = self.next_alias(&table.name);
        let bound = table.bind(alias);

        let selections = node
            .selections
            .iter()
            .map(|selection| OutputColumn {
                expr: self.metadata.get_column_for_selection(selection, &bound),
                name: selection.alias.clone(),
            })
            .collect();
        let predicates = node
            .predicates
            .iter()
            .map(|predicate| self.metadata.get_predicate_condition(node, predicate, &bound))
            .collect::<Result<Vec<_>, _>>()?;

        trace!(location = %node.location, alias = bound.qualifier(), "bound relation");
        self.states.insert(
            id,
            NodeState {
                from: bound.to_from_item(),
                table: bound,
                selections,
                predicates,
                recursions: node.recursions.clone(),
                recursion_links: IndexMap::new(),
                link_columns: Vec::new(),
            },
        );
        Ok(())
    }

    /// Expose on `id` the column each of its own recursions links through.
    fn create_links_for_recursions(&mut self, id: NodeId) -> Result<(), LoweringError> {
        let node = self.tree.node(id)?;
        for &recursion in &node.recursions {
            let recursion_node = self.tree.node(recursion)?;
            let edge = validate_edge(
                self.metadata
                    .get_edge(recursion_node, &recursion_node.relation),
                recursion_node,
                &recursion_node.relation,
            )?;
            let label = self.next_link_label();
            let state = self.state_mut(id)?;
            state.link_columns.push(OutputColumn {
                expr: state.table.column(edge.link_column()),
                name: label.clone(),
            });
            state.recursion_links.insert(recursion, label);
        }
        Ok(())
    }

    fn pull_up_and_join(&mut self, parent: NodeId, child: NodeId) -> Result<(), LoweringError> {
        let parent_node = self.tree.node(parent)?;
        let child_node = self.tree.node(child)?;
        let NodeState {
            table: child_table,
            from: child_from,
            selections,
            predicates,
            recursions,
            recursion_links,
            link_columns,
        } = self.take_state(child)?;

        let clauses = self.metadata.get_join_clauses_for_child(
            parent_node,
            child_node,
            &self.state(parent)?.table,
            &child_table,
        );
        if clauses.is_empty() {
            return Err(LoweringError::InternalError(format!(
                "no join clauses from {} to {}",
                parent_node.location, child_node.location
            )));
        }

        // An optional child's predicates must not remove the parent row when
        // the child is absent.
        let presence = (child_node.optional && !predicates.is_empty())
            .then(|| self.metadata.get_presence_column(child_node, &child_table));

        let state = self.state_mut(parent)?;
        state.selections.extend(selections);
        match presence {
            Some(presence) => state.predicates.push(SqlExpr::Or(vec![
                SqlExpr::IsNull(Box::new(presence)),
                SqlExpr::and_all(predicates),
            ])),
            None => state.predicates.extend(predicates),
        }
        state.recursions.extend(recursions);
        state.recursion_links.extend(recursion_links);
        state.link_columns.extend(link_columns);

        let kind = join_kind(child_node);
        let mut child_from = Some(child_from);
        for clause in clauses {
            let right = if clause.table == child_table {
                child_from.take().ok_or_else(|| {
                    LoweringError::InternalError(format!(
                        "join clauses reach {} more than once",
                        child_node.location
                    ))
                })?
            } else {
                clause.table.to_from_item()
            };
            state.join(kind, right, clause.on);
        }
        if child_from.is_some() {
            return Err(LoweringError::InternalError(format!(
                "join clauses never reach {} from {}",
                child_node.location, parent_node.location
            )));
        }
        trace!(
            parent = %parent_node.location,
            child = %child_node.location,
            kind = kind.as_str(),
            "joined child"
        );
        Ok(())
    }

    fn base_query(&self, id: NodeId) -> Result<Select, LoweringError> {
        let state = self.state(id)?;
        let projection: Vec<SelectItem> = state
            .selections
            .iter()
            .chain(&state.link_columns)
            .map(OutputColumn::to_select_item)
            .collect();
        if projection.is_empty() {
            return Err(LoweringError::InternalError(format!(
                "{} selects no columns",
                self.tree.node(id)?.location
            )));
        }
        let mut seen = HashSet::new();
        for item in &projection {
            if let Some(name) = item.alias.as_deref()
                && !seen.insert(name)
            {
                return Err(LoweringError::InternalError(format!(
                    "{} projects output name {name:?} more than once",
                    self.tree.node(id)?.location
                )));
            }
        }
        let filter = if state.predicates.is_empty() {
            None
        } else {
            Some(SqlExpr::and_all(state.predicates.clone()))
        };
        Ok(Select {
            distinct: true,
            projection,
            from: state.from.clone(),
            filter,
        })
    }

    /// Materialize `query` as a CTE and rebind `id` to it.
    fn wrap_query_as_cte(&mut self, id: NodeId, query: Select) -> Result<(), LoweringError> {
        let node = self.tree.node(id)?;
        let name = self.next_cte_name(&node.relation);
        debug!(cte = %name, location = %node.location, "materialized node");
        self.push_cte(Cte {
            name: name.clone(),
            recursive: false,
            body: CteBody::Select(query),
        });

        let cte = BoundTable::cte(name);
        let state = self.state_mut(id)?;
        for column in state
            .selections
            .iter_mut()
            .chain(state.link_columns.iter_mut())
        {
            column.expr = cte.column(&column.name);
        }
        // Applied inside the CTE.
        state.predicates.clear();
        state.from = cte.to_from_item();
        state.table = cte;
        Ok(())
    }

    fn traverse_recursions(&mut self, id: NodeId) -> Result<(), LoweringError> {
        let recursions = self.state(id)?.recursions.clone();
        let mut recursive_selections = Vec::new();
        for recursion in recursions {
            let state = self.state(id)?;
            let in_column = state
                .recursion_links
                .get(&recursion)
                .cloned()
                .ok_or_else(|| {
                    LoweringError::InternalError(format!(
                        "no link column recorded for recursion node {}",
                        recursion.index()
                    ))
                })?;
            let link = RecursionLink {
                parent_cte: state.table.clone(),
                column: in_column.clone(),
            };

            let out_column = self.lower_subtree(recursion, Some(link))?.ok_or_else(|| {
                LoweringError::InternalError(format!(
                    "recursion node {} produced no link column",
                    recursion.index()
                ))
            })?;
            let recursion_state = self.take_state(recursion)?;
            let kind = join_kind(self.tree.node(recursion)?);

            let state = self.state_mut(id)?;
            let on = SqlExpr::eq(
                state.table.column(&in_column),
                recursion_state.table.column(&out_column),
            );
            state.join(kind, recursion_state.from, on);
            recursive_selections.extend(recursion_state.selections);
        }
        self.state_mut(id)?.selections.extend(recursive_selections);
        Ok(())
    }

    fn final_select(&mut self, root: NodeId) -> Result<Select, LoweringError> {
        let state = self.take_state(root)?;
        if state.selections.is_empty() {
            return Err(LoweringError::InternalError(
                "query selects no output columns".into(),
            ));
        }
        // Predicates are already applied inside the CTEs.
        Ok(Select {
            distinct: true,
            projection: state
                .selections
                .iter()
                .map(OutputColumn::to_select_item)
                .collect(),
            from: state.from,
            filter: None,
        })
    }
}

fn missing_state(id: NodeId) -> LoweringError {
    LoweringError::InternalError(format!(
        "node {} has no emission state at this point",
        id.index()
    ))
}
