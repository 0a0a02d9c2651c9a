// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the operation graph.

use crate::dag::Edge;
use crate::field::{FieldDirection, FieldRef};
use crate::graph::GraphError;
use crate::node::{NodeId, OperationNode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed connection from an output field to an input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Source node ID
    pub from_node: NodeId,
    /// Source output field key
    pub from_field: String,
    /// Target node ID
    pub to_node: NodeId,
    /// Target input field key
    pub to_field: String,
}

impl Link {
    /// Create a link between two nodes.
    ///
    /// Fails if the source has no such output, the target has no such input,
    /// or the target's validator rejects the source's declared type.
    pub fn new(
        from: &OperationNode,
        from_field: &str,
        to: &OperationNode,
        to_field: &str,
    ) -> Result<Self, GraphError> {
        let source = from.output(from_field).ok_or_else(|| GraphError::FieldMissing {
            node: from.id(),
            direction: FieldDirection::Output,
            field: from_field.to_string(),
        })?;
        let target = to.input(to_field).ok_or_else(|| GraphError::FieldMissing {
            node: to.id(),
            direction: FieldDirection::Input,
            field: to_field.to_string(),
        })?;

        if !target.validator.accepts_type(&source.value_type) {
            return Err(GraphError::TypeRejected {
                node: to.id(),
                field: to_field.to_string(),
                expected: target.validator.to_string(),
                found: source.value_type.clone(),
            });
        }

        Ok(Self {
            id: LinkId::new(),
            from_node: from.id(),
            from_field: from_field.to_string(),
            to_node: to.id(),
            to_field: to_field.to_string(),
        })
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this link is attached to a specific field
    pub fn involves_field(&self, field: &FieldRef) -> bool {
        match field.direction {
            FieldDirection::Output => self.from_node == field.node && self.from_field == field.key,
            FieldDirection::Input => self.to_node == field.node && self.to_field == field.key,
        }
    }

    /// The source end as a field reference
    pub fn source_field(&self) -> FieldRef {
        FieldRef::output(self.from_node, self.from_field.clone())
    }

    /// The target end as a field reference
    pub fn target_field(&self) -> FieldRef {
        FieldRef::input(self.to_node, self.to_field.clone())
    }
}

impl Edge for Link {
    type Id = LinkId;
    type VertexId = NodeId;

    fn id(&self) -> LinkId {
        self.id
    }

    fn source(&self) -> NodeId {
        self.from_node
    }

    fn target(&self) -> NodeId {
        self.to_node
    }
}
