// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposing inner fields of a composite node as the node's own fields.

use crate::capability::CompositeNode;
use crate::field::{Field, FieldDirection, FieldRef, Validator};
use crate::graph::GraphError;
use crate::node::OperationNode;
use crate::value::ValueType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How published fields relate to the inner fields they expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PublishMode {
    /// The outer field has the inner field's type
    #[default]
    Direct,
    /// The outer field carries a list of the inner field's type
    Collection,
}

/// An outer field delegating to an inner node's field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublishedField {
    /// Key of the field on the composite node
    pub key: String,
    /// The inner field it exposes
    pub target: FieldRef,
}

/// Capability: the node can publish fields of its inner graph
#[derive(Debug, Clone, Default)]
pub struct Publishable {
    mode: PublishMode,
    inputs: IndexMap<String, PublishedField>,
    outputs: IndexMap<String, PublishedField>,
}

impl Publishable {
    /// Create an empty publish table
    pub fn new(mode: PublishMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Publish mode
    pub fn mode(&self) -> PublishMode {
        self.mode
    }

    /// Published inputs in publish order
    pub fn inputs(&self) -> impl Iterator<Item = &PublishedField> {
        self.inputs.values()
    }

    /// Published outputs in publish order
    pub fn outputs(&self) -> impl Iterator<Item = &PublishedField> {
        self.outputs.values()
    }

    /// Look up a published field by outer key
    pub fn get(&self, direction: FieldDirection, key: &str) -> Option<&PublishedField> {
        self.table(direction).get(key)
    }

    /// The published field exposing `target`, if any
    pub fn find(&self, target: &FieldRef) -> Option<&PublishedField> {
        self.table(target.direction)
            .values()
            .find(|published| &published.target == target)
    }

    /// Check whether `target` is published
    pub fn is_published(&self, target: &FieldRef) -> bool {
        self.find(target).is_some()
    }

    fn table(&self, direction: FieldDirection) -> &IndexMap<String, PublishedField> {
        match direction {
            FieldDirection::Input => &self.inputs,
            FieldDirection::Output => &self.outputs,
        }
    }

    fn table_mut(&mut self, direction: FieldDirection) -> &mut IndexMap<String, PublishedField> {
        match direction {
            FieldDirection::Input => &mut self.inputs,
            FieldDirection::Output => &mut self.outputs,
        }
    }
}

impl OperationNode {
    /// Expose an inner field as a field of this node.
    ///
    /// The node needs both a [`Publishable`] and a [`CompositeNode`]
    /// capability. The new field mirrors the inner one and is removable;
    /// if `key` is taken, `_1`, `_2`, … is appended until it is free.
    pub fn publish(&mut self, key: &str, target: FieldRef) -> Result<PublishedField, GraphError> {
        let id = self.id();
        let publishable = self
            .capability::<Publishable>()
            .ok_or(GraphError::MissingCapability {
                node: id,
                capability: "Publishable",
            })?;
        let composite = self
            .capability::<CompositeNode>()
            .ok_or(GraphError::MissingCapability {
                node: id,
                capability: "CompositeNode",
            })?;

        if publishable.is_published(&target) {
            return Err(GraphError::AlreadyPublished {
                node: target.node,
                field: target.key,
            });
        }
        let inner = composite
            .graph()
            .node(target.node)
            .ok_or(GraphError::NodeNotFound(target.node))?
            .field(target.direction, &target.key)
            .ok_or_else(|| GraphError::FieldMissing {
                node: target.node,
                direction: target.direction,
                field: target.key.clone(),
            })?;

        let key = self.free_key(target.direction, key);
        let field = outer_field(&key, inner, publishable.mode());
        self.add_field(field)?;

        let published = PublishedField { key, target };
        if let Some(publishable) = self.capability_mut::<Publishable>() {
            publishable
                .table_mut(published.target.direction)
                .insert(published.key.clone(), published.clone());
        }
        tracing::debug!(
            "Published {}.{} as {}.{}",
            published.target.node,
            published.target.key,
            self.name,
            published.key
        );
        Ok(published)
    }

    /// Remove the field exposing `target`.
    ///
    /// Links in the containing graph that were attached to the removed field
    /// are not touched; find them with
    /// [`OperationGraph::orphaned_links`](crate::graph::OperationGraph::orphaned_links).
    pub fn unpublish(&mut self, target: &FieldRef) -> Result<PublishedField, GraphError> {
        let id = self.id();
        let publishable = self
            .capability_mut::<Publishable>()
            .ok_or(GraphError::MissingCapability {
                node: id,
                capability: "Publishable",
            })?;
        let table = publishable.table_mut(target.direction);
        let key = table
            .values()
            .find(|published| &published.target == target)
            .map(|published| published.key.clone())
            .ok_or_else(|| GraphError::NotPublished {
                node: target.node,
                field: target.key.clone(),
            })?;
        let published = table.shift_remove(&key).ok_or_else(|| GraphError::NotPublished {
            node: target.node,
            field: target.key.clone(),
        })?;

        self.remove_field(target.direction, &published.key)?;
        tracing::debug!("Unpublished {}.{}", self.name, published.key);
        Ok(published)
    }

    fn free_key(&self, direction: FieldDirection, key: &str) -> String {
        if self.field(direction, key).is_none() {
            return key.to_string();
        }
        (1..)
            .map(|n| format!("{key}_{n}"))
            .find(|candidate| self.field(direction, candidate).is_none())
            .unwrap_or_else(|| key.to_string())
    }
}

fn outer_field(key: &str, inner: &Field, mode: PublishMode) -> Field {
    let mut field = match (inner.direction, mode) {
        (FieldDirection::Input, PublishMode::Direct) => Field::input(key, inner.validator.clone()),
        (FieldDirection::Input, PublishMode::Collection) => {
            Field::input(key, Validator::collection_of(inner.validator.clone()))
        }
        (FieldDirection::Output, PublishMode::Direct) => Field::output(key, inner.value_type.clone()),
        (FieldDirection::Output, PublishMode::Collection) => {
            Field::output(key, ValueType::list_of(inner.value_type.clone()))
        }
    }
    .with_description(inner.description.clone())
    .removable();
    field.optional = inner.optional;
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::macro_node;
    use crate::graph::OperationGraph;
    use crate::nodes::math::{constant, min, passthrough};
    use crate::value::Value;

    fn inner() -> (OperationGraph, crate::node::NodeId) {
        let mut graph = OperationGraph::new("inner");
        let min = graph.add_node(min()).unwrap();
        (graph, min)
    }

    #[test]
    fn test_publish_mirrors_inner_field() {
        let (graph, min) = inner();
        let mut node = macro_node("Wrapped", graph);

        let a = node.publish("x", FieldRef::input(min, "a")).unwrap();
        let out = node.publish("result", FieldRef::output(min, "result")).unwrap();
        assert_eq!(a.key, "x");
        assert_eq!(out.key, "result");

        let x = node.input("x").unwrap();
        assert_eq!(x.validator, Validator::of(ValueType::Float));
        assert!(!x.optional);
        assert!(!x.fixed);
        assert_eq!(node.output("result").unwrap().value_type, ValueType::Float);
    }

    #[test]
    fn test_publish_key_collision_gets_suffix() {
        let mut graph = OperationGraph::new("inner");
        let first = graph.add_node(passthrough()).unwrap();
        let second = graph.add_node(passthrough()).unwrap();
        let third = graph.add_node(passthrough()).unwrap();
        let fourth = graph.add_node(passthrough()).unwrap();
        let mut node = macro_node("Wrapped", graph);

        let keys: Vec<String> = [first, second, third]
            .into_iter()
            .map(|inner| node.publish("x", FieldRef::input(inner, "value")).unwrap().key)
            .collect();
        assert_eq!(keys, ["x", "x_1", "x_2"]);

        // The reserved input counts as taken; outputs have their own keys
        let input = node.publish("enabled", FieldRef::input(fourth, "value")).unwrap();
        assert_eq!(input.key, "enabled_1");
        let output = node.publish("x", FieldRef::output(first, "value")).unwrap();
        assert_eq!(output.key, "x");
    }

    #[test]
    fn test_publish_errors() {
        let (graph, min) = inner();
        let mut node = macro_node("Wrapped", graph);
        node.publish("x", FieldRef::input(min, "a")).unwrap();

        assert!(matches!(
            node.publish("again", FieldRef::input(min, "a")),
            Err(GraphError::AlreadyPublished { .. })
        ));
        assert!(matches!(
            node.publish("y", FieldRef::input(min, "nope")),
            Err(GraphError::FieldMissing { .. })
        ));
        assert!(matches!(
            node.publish("y", FieldRef::input(crate::node::NodeId::new(), "a")),
            Err(GraphError::NodeNotFound(_))
        ));

        let mut plain = constant(Value::Float(1.0));
        assert!(matches!(
            plain.publish("x", FieldRef::input(min, "a")),
            Err(GraphError::MissingCapability { capability: "Publishable", .. })
        ));
    }

    #[test]
    fn test_unpublish_leaves_orphaned_links() {
        let (inner_graph, min) = inner();
        let mut node = macro_node("Wrapped", inner_graph);
        node.publish("x", FieldRef::input(min, "a")).unwrap();

        let mut outer = OperationGraph::new("outer");
        let source = outer.add_node(constant(Value::Float(2.0))).unwrap();
        let wrapped = outer.add_node(node).unwrap();
        let link = outer.connect(source, "value", wrapped, "x").unwrap();

        let removed = outer
            .node_mut(wrapped)
            .unwrap()
            .unpublish(&FieldRef::input(min, "a"))
            .unwrap();
        assert_eq!(removed.key, "x");
        assert!(outer.node(wrapped).unwrap().input("x").is_none());
        assert_eq!(outer.link_count(), 1);
        assert_eq!(outer.orphaned_links(), vec![link]);

        assert!(matches!(
            outer.node_mut(wrapped).unwrap().unpublish(&FieldRef::input(min, "a")),
            Err(GraphError::NotPublished { .. })
        ));
    }
}
