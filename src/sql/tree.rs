//! Per-location query tree consumed by the SQL emitter.
//!
//! Nodes live in an arena owned by [`QueryTree`] and are addressed by
//! [`NodeId`]. Each node corresponds to one vertex location of the query and
//! owns its ordinary children (joined into the parent's relation) and its
//! recursion children (emitted as separate recursive CTEs). The emitter reads
//! the tree and never mutates it.

use crate::error::LoweringError;
use crate::ir::{Expression, Location, Recurse, Traverse};

/// Index of a node in its [`QueryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// How a node is reached from its parent.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBlock {
    Root,
    Traverse(Traverse),
    Recurse(Recurse),
}

/// An output column of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Field of the node's relation.
    pub field: String,
    /// Name of the output column.
    pub alias: String,
}

impl Selection {
    pub fn new(field: &str, alias: &str) -> Self {
        Selection {
            field: field.to_string(),
            alias: alias.to_string(),
        }
    }
}

/// A filter applied to a node's relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryNode {
    pub location: Location,
    /// Name of the relation backing this vertex.
    pub relation: String,
    pub block: NodeBlock,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub recursions: Vec<NodeId>,
    pub selections: Vec<Selection>,
    pub predicates: Vec<Predicate>,
    /// The node is reached through an `@optional` edge or inside one.
    pub optional: bool,
}

impl QueryNode {
    fn new(location: Location, relation: &str, block: NodeBlock, parent: Option<NodeId>) -> Self {
        let optional = match &block {
            NodeBlock::Root => false,
            NodeBlock::Traverse(traverse) => traverse.optional || traverse.within_optional_scope,
            NodeBlock::Recurse(recurse) => recurse.within_optional_scope,
        };
        QueryNode {
            location,
            relation: relation.to_string(),
            block,
            parent,
            children: Vec::new(),
            recursions: Vec::new(),
            selections: Vec::new(),
            predicates: Vec::new(),
            optional,
        }
    }

    pub fn is_recursive(&self) -> bool {
        matches!(self.block, NodeBlock::Recurse(_))
    }
}

/// Arena of query nodes rooted at a single `Root` node.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    nodes: Vec<QueryNode>,
}

impl QueryTree {
    pub fn new_root(location: Location, relation: &str) -> Self {
        QueryTree {
            nodes: vec![QueryNode::new(location, relation, NodeBlock::Root, None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&QueryNode> {
        self.nodes.get(id.0)
    }

    /// Look up a node, treating an unknown id as a compiler defect.
    pub fn node(&self, id: NodeId) -> Result<&QueryNode, LoweringError> {
        self.get(id).ok_or_else(|| {
            LoweringError::InternalError(format!(
                "node id {} is outside the query tree ({} nodes)",
                id.0,
                self.nodes.len()
            ))
        })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut QueryNode, LoweringError> {
        let len = self.nodes.len();
        self.nodes.get_mut(id.0).ok_or_else(|| {
            LoweringError::InternalError(format!(
                "node id {} is outside the query tree ({len} nodes)",
                id.0
            ))
        })
    }

    fn push(&mut self, node: QueryNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Attach an ordinary child reached by `traverse`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        location: Location,
        relation: &str,
        traverse: Traverse,
    ) -> Result<NodeId, LoweringError> {
        self.node(parent)?;
        let id = self.push(QueryNode::new(
            location,
            relation,
            NodeBlock::Traverse(traverse),
            Some(parent),
        ));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Attach a recursion child reached by `recurse`.
    pub fn add_recursion(
        &mut self,
        parent: NodeId,
        location: Location,
        relation: &str,
        recurse: Recurse,
    ) -> Result<NodeId, LoweringError> {
        self.node(parent)?;
        let id = self.push(QueryNode::new(
            location,
            relation,
            NodeBlock::Recurse(recurse),
            Some(parent),
        ));
        self.node_mut(parent)?.recursions.push(id);
        Ok(id)
    }

    pub fn add_selection(&mut self, id: NodeId, selection: Selection) -> Result<(), LoweringError> {
        self.node_mut(id)?.selections.push(selection);
        Ok(())
    }

    pub fn add_predicate(
        &mut self,
        id: NodeId,
        expression: Expression,
    ) -> Result<(), LoweringError> {
        self.node_mut(id)?.predicates.push(Predicate { expression });
        Ok(())
    }

    /// Ids of all nodes in the subtree rooted at `id`, pre-order, children
    /// before recursions.
    pub fn subtree(&self, id: NodeId) -> Result<Vec<NodeId>, LoweringError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            out.push(current);
            stack.extend(node.recursions.iter().rev());
            stack.extend(node.children.iter().rev());
        }
        Ok(out)
    }
}
