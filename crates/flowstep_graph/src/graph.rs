// SPDX-License-Identifier: MIT OR Apache-2.0
//! Operation graph: operation nodes connected by field-typed links.

use crate::capability::Capabilities;
use crate::dag::{Dag, DagError};
use crate::field::{FieldDirection, FieldRef};
use crate::link::{Link, LinkId};
use crate::node::{NodeId, OperationNode};
use crate::value::ValueType;
use std::any::Any;

/// An acyclic graph of operation nodes
#[derive(Debug)]
pub struct OperationGraph {
    /// Graph name
    pub name: String,
    dag: Dag<OperationNode, Link>,
    capabilities: Capabilities,
}

impl OperationGraph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dag: Dag::new(),
            capabilities: Capabilities::new(),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: OperationNode) -> Result<NodeId, GraphError> {
        Ok(self.dag.add_vertex(node)?)
    }

    /// Remove a node and every link attached to it
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<(OperationNode, Vec<Link>), GraphError> {
        Ok(self.dag.remove_vertex(node_id)?)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&OperationNode> {
        self.dag.vertex(node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut OperationNode> {
        self.dag.vertex_mut(node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &OperationNode> {
        self.dag.vertices()
    }

    /// Get all node IDs in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dag.vertex_ids()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.dag.vertex_count()
    }

    /// Link an output field to an input field.
    ///
    /// Nothing changes unless every check passes: both nodes exist, both
    /// fields exist, the input accepts the output's declared type, the input
    /// is not linked yet, and the link closes no cycle.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_field: &str,
        to_node: NodeId,
        to_field: &str,
    ) -> Result<LinkId, GraphError> {
        let source = self.node(from_node).ok_or(GraphError::NodeNotFound(from_node))?;
        let target = self.node(to_node).ok_or(GraphError::NodeNotFound(to_node))?;
        let link = Link::new(source, from_field, target, to_field)?;

        // One link per input field
        if self.dag.incoming_edges(to_node).any(|l| l.to_field == to_field) {
            return Err(GraphError::FieldAlreadyConnected {
                node: to_node,
                field: to_field.to_string(),
            });
        }

        let id = self.dag.add_edge(link)?;
        tracing::trace!("Linked {}.{} -> {}.{}", from_node, from_field, to_node, to_field);
        Ok(id)
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        self.dag.remove_edge(link_id)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.dag.edge(link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.dag.edges()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.dag.edge_count()
    }

    /// Links entering a node
    pub fn incoming_links(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.dag.incoming_edges(node_id)
    }

    /// Links leaving a node
    pub fn outgoing_links(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.dag.outgoing_edges(node_id)
    }

    /// Links attached to a specific field
    pub fn links_at<'a>(&'a self, field: &'a FieldRef) -> impl Iterator<Item = &'a Link> + 'a {
        let links: Box<dyn Iterator<Item = &'a Link> + 'a> = match field.direction {
            FieldDirection::Input => Box::new(self.incoming_links(field.node)),
            FieldDirection::Output => Box::new(self.outgoing_links(field.node)),
        };
        links.filter(move |link| link.involves_field(field))
    }

    /// Whether an input field has a link feeding it
    pub fn is_linked(&self, node_id: NodeId, input: &str) -> bool {
        self.incoming_links(node_id).any(|link| link.to_field == input)
    }

    /// Links whose source or target field no longer exists.
    ///
    /// Removing or unpublishing a field leaves its links in place; callers
    /// use this to find and disconnect them.
    pub fn orphaned_links(&self) -> Vec<LinkId> {
        self.links()
            .filter(|link| {
                let source_ok = self
                    .node(link.from_node)
                    .is_some_and(|n| n.output(&link.from_field).is_some());
                let target_ok = self
                    .node(link.to_node)
                    .is_some_and(|n| n.input(&link.to_field).is_some());
                !(source_ok && target_ok)
            })
            .map(|link| link.id)
            .collect()
    }

    /// Get nodes in topological order (for evaluation).
    ///
    /// Nodes that are ready at the same time keep insertion order.
    pub fn topological_order(&self) -> Vec<NodeId> {
        self.dag.topological_order().to_vec()
    }

    /// Look up a graph capability
    pub fn capability<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.capabilities.get::<T>()
    }

    /// Look up a graph capability for mutation
    pub fn capability_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.capabilities.get_mut::<T>()
    }

    /// Attach a graph capability, returning the one it replaces
    pub fn set_capability<T: Any + Send + Sync>(&mut self, capability: T) -> Option<T> {
        self.capabilities.insert(capability)
    }

    /// All graph capabilities
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Type names of the attached capabilities, for persistence and display
    pub fn capability_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.capabilities.names()
    }
}

impl Default for OperationGraph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when mutating a graph or a node's fields
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node already present
    #[error("Node already in graph: {0}")]
    DuplicateNode(NodeId),

    /// Link would create a cycle
    #[error("Linking {from} -> {to} would create a cycle")]
    CycleDetected {
        /// Source node
        from: NodeId,
        /// Target node
        to: NodeId,
    },

    /// Field not found
    #[error("Node {node} has no {direction} field `{field}`")]
    FieldMissing {
        /// Node that was searched
        node: NodeId,
        /// Direction that was searched
        direction: FieldDirection,
        /// Field key
        field: String,
    },

    /// Field key already used
    #[error("Node {node} already has an {direction} field `{field}`")]
    DuplicateField {
        /// Node
        node: NodeId,
        /// Field direction
        direction: FieldDirection,
        /// Field key
        field: String,
    },

    /// Field cannot be removed
    #[error("Field `{field}` on node {node} is fixed")]
    FieldFixed {
        /// Node
        node: NodeId,
        /// Field key
        field: String,
    },

    /// Input rejects the source type
    #[error("Field `{field}` on node {node} accepts {expected}, not {found}")]
    TypeRejected {
        /// Target node
        node: NodeId,
        /// Target field
        field: String,
        /// What the field accepts
        expected: String,
        /// Declared type of the source
        found: ValueType,
    },

    /// Input already has a link
    #[error("Field `{field}` on node {node} is already connected")]
    FieldAlreadyConnected {
        /// Target node
        node: NodeId,
        /// Target field
        field: String,
    },

    /// Field already exposed on the composite node
    #[error("Field `{field}` of node {node} is already published")]
    AlreadyPublished {
        /// Inner node
        node: NodeId,
        /// Inner field
        field: String,
    },

    /// Field was never published
    #[error("Field `{field}` of node {node} is not published")]
    NotPublished {
        /// Inner node
        node: NodeId,
        /// Inner field
        field: String,
    },

    /// Node lacks a capability the operation needs
    #[error("Node {node} has no {capability} capability")]
    MissingCapability {
        /// Node
        node: NodeId,
        /// Capability type name
        capability: &'static str,
    },
}

impl From<DagError<NodeId>> for GraphError {
    fn from(err: DagError<NodeId>) -> Self {
        match err {
            DagError::VertexNotFound(id) => Self::NodeNotFound(id),
            DagError::DuplicateVertex(id) => Self::DuplicateNode(id),
            DagError::CycleDetected { from, to } => Self::CycleDetected { from, to },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, Validator};
    use crate::nodes::math::{add, constant};
    use crate::value::Value;

    fn arithmetic() -> (OperationGraph, NodeId, NodeId, NodeId) {
        let mut graph = OperationGraph::new("test");
        let a = graph.add_node(constant(Value::Float(1.0))).unwrap();
        let b = graph.add_node(constant(Value::Float(2.0))).unwrap();
        let sum = graph.add_node(add()).unwrap();
        graph.connect(a, "value", sum, "a").unwrap();
        graph.connect(b, "value", sum, "b").unwrap();
        (graph, a, b, sum)
    }

    #[test]
    fn test_cycle_leaves_graph_unchanged() {
        let (mut graph, _, _, sum) = arithmetic();
        let other = graph.add_node(add()).unwrap();
        graph.connect(sum, "result", other, "a").unwrap();

        let links_before: Vec<LinkId> = graph.links().map(|l| l.id).collect();
        // `sum.a` is already fed, give the back edge a free input
        assert!(graph.connect(other, "result", sum, "a").is_err());

        graph
            .node_mut(sum)
            .unwrap()
            .add_field(Field::input("c", Validator::Any).optional())
            .unwrap();
        let err = graph.connect(other, "result", sum, "c").unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));

        let links_after: Vec<LinkId> = graph.links().map(|l| l.id).collect();
        assert_eq!(links_before, links_after);
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_missing_field_and_node() {
        let (mut graph, a, _, sum) = arithmetic();
        assert!(matches!(
            graph.connect(a, "nope", sum, "a"),
            Err(GraphError::FieldMissing { direction: FieldDirection::Output, .. })
        ));
        // Inputs are not valid link sources
        assert!(matches!(
            graph.connect(sum, "a", a, "enabled"),
            Err(GraphError::FieldMissing { .. })
        ));
        assert!(matches!(
            graph.connect(a, "value", NodeId::new(), "a"),
            Err(GraphError::NodeNotFound(_))
        ));
        assert_eq!(graph.link_count(), 2);
    }

    #[test]
    fn test_type_rejected() {
        let (mut graph, _, _, sum) = arithmetic();
        let text = graph.add_node(constant(Value::from("hello"))).unwrap();
        let other = graph.add_node(add()).unwrap();
        let err = graph.connect(text, "value", other, "a").unwrap_err();
        match err {
            GraphError::TypeRejected { expected, found, .. } => {
                assert_eq!(expected, "float");
                assert_eq!(found, ValueType::String);
            }
            other => panic!("unexpected error: {other}"),
        }
        // A float cannot drive the boolean enabled flag
        assert!(graph.connect(sum, "result", other, "enabled").is_err());
        assert_eq!(graph.outgoing_links(text).count(), 0);
    }

    #[test]
    fn test_input_cardinality() {
        let (mut graph, a, _, sum) = arithmetic();
        assert!(matches!(
            graph.connect(a, "value", sum, "b"),
            Err(GraphError::FieldAlreadyConnected { .. })
        ));
        assert!(graph.is_linked(sum, "b"));
    }

    #[test]
    fn test_remove_node_removes_links() {
        let (mut graph, a, b, sum) = arithmetic();
        let (node, links) = graph.remove_node(sum).unwrap();
        assert_eq!(node.id(), sum);
        assert_eq!(links.len(), 2);
        assert_eq!(graph.link_count(), 0);
        assert!(graph.links().all(|l| !l.involves_node(sum)));
        assert_eq!(graph.outgoing_links(a).count(), 0);
        assert_eq!(graph.outgoing_links(b).count(), 0);
        assert!(matches!(graph.remove_node(sum), Err(GraphError::NodeNotFound(_))));
    }

    #[test]
    fn test_topological_order_respects_links() {
        let mut graph = OperationGraph::new("order");
        let sum = graph.add_node(add()).unwrap();
        let b = graph.add_node(constant(Value::Float(2.0))).unwrap();
        let a = graph.add_node(constant(Value::Float(1.0))).unwrap();
        graph.connect(a, "value", sum, "a").unwrap();
        graph.connect(b, "value", sum, "b").unwrap();

        assert_eq!(graph.topological_order(), vec![b, a, sum]);
        let order = graph.topological_order();
        for link in graph.links() {
            let from = order.iter().position(|n| *n == link.from_node).unwrap();
            let to = order.iter().position(|n| *n == link.to_node).unwrap();
            assert!(from < to);
        }
    }

    #[test]
    fn test_disconnect_and_links_at() {
        let (mut graph, a, _, sum) = arithmetic();
        let at_a = FieldRef::output(a, "value");
        let id = graph.links_at(&at_a).next().unwrap().id;
        assert!(graph.disconnect(id).is_some());
        assert_eq!(graph.links_at(&at_a).count(), 0);
        assert!(!graph.is_linked(sum, "a"));
        // The input is free again
        graph.connect(a, "value", sum, "a").unwrap();
    }

    #[test]
    fn test_orphaned_links() {
        let (mut graph, _, _, sum) = arithmetic();
        let extra = graph.add_node(add()).unwrap();
        graph
            .node_mut(extra)
            .unwrap()
            .add_field(Field::input("bias", Validator::of(ValueType::Float)).removable())
            .unwrap();
        let link = graph.connect(sum, "result", extra, "bias").unwrap();
        assert!(graph.orphaned_links().is_empty());

        graph
            .node_mut(extra)
            .unwrap()
            .remove_field(FieldDirection::Input, "bias")
            .unwrap();
        assert_eq!(graph.orphaned_links(), vec![link]);
    }
}
