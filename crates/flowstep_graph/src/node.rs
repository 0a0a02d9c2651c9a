// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the operation graph.

use crate::capability::Capabilities;
use crate::context::NodeScope;
use crate::dag::Vertex;
use crate::field::{Field, FieldDirection, Validator, ENABLED_FIELD};
use crate::graph::GraphError;
use crate::operation::{Operation, OperationError};
use crate::value::ValueType;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An operation node: declared fields, a behaviour and optional capabilities
#[derive(Debug)]
pub struct OperationNode {
    id: NodeId,
    /// Display name (can be customized)
    pub name: String,
    node_type: String,
    inputs: IndexMap<String, Field>,
    outputs: IndexMap<String, Field>,
    operation: Box<dyn Operation>,
    capabilities: Capabilities,
}

impl OperationNode {
    /// Create a node with only the reserved `enabled` input
    pub fn new(
        node_type: impl Into<String>,
        name: impl Into<String>,
        operation: impl Operation + 'static,
    ) -> Self {
        let enabled = Field::input(ENABLED_FIELD, Validator::of(ValueType::Bool))
            .optional()
            .with_description("Skip the node when false");
        let mut inputs = IndexMap::new();
        inputs.insert(enabled.key.clone(), enabled);

        Self {
            id: NodeId::new(),
            name: name.into(),
            node_type: node_type.into(),
            inputs,
            outputs: IndexMap::new(),
            operation: Box::new(operation),
            capabilities: Capabilities::new(),
        }
    }

    /// Add a field, replacing any field with the same key and direction
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields_mut(field.direction).insert(field.key.clone(), field);
        self
    }

    /// Stable identifier
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Registry type identifier
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Input fields in declaration order
    pub fn inputs(&self) -> impl Iterator<Item = &Field> {
        self.inputs.values()
    }

    /// Output fields in declaration order
    pub fn outputs(&self) -> impl Iterator<Item = &Field> {
        self.outputs.values()
    }

    /// Get an input field by key
    pub fn input(&self, key: &str) -> Option<&Field> {
        self.inputs.get(key)
    }

    /// Get an output field by key
    pub fn output(&self, key: &str) -> Option<&Field> {
        self.outputs.get(key)
    }

    /// Get a field by direction and key
    pub fn field(&self, direction: FieldDirection, key: &str) -> Option<&Field> {
        match direction {
            FieldDirection::Input => self.input(key),
            FieldDirection::Output => self.output(key),
        }
    }

    /// Add a field at runtime
    pub fn add_field(&mut self, field: Field) -> Result<(), GraphError> {
        let id = self.id;
        let fields = self.fields_mut(field.direction);
        if fields.contains_key(&field.key) {
            return Err(GraphError::DuplicateField {
                node: id,
                direction: field.direction,
                field: field.key,
            });
        }
        fields.insert(field.key.clone(), field);
        Ok(())
    }

    /// Remove a non-fixed field.
    ///
    /// Links attached to the field in any graph are left in place and become
    /// orphaned; see [`OperationGraph::orphaned_links`](crate::graph::OperationGraph::orphaned_links).
    pub fn remove_field(&mut self, direction: FieldDirection, key: &str) -> Result<Field, GraphError> {
        let id = self.id;
        let fields = self.fields_mut(direction);
        let missing = || GraphError::FieldMissing {
            node: id,
            direction,
            field: key.to_string(),
        };
        match fields.get(key).map(|field| field.fixed) {
            None => Err(missing()),
            Some(true) => Err(GraphError::FieldFixed {
                node: id,
                field: key.to_string(),
            }),
            Some(false) => fields.shift_remove(key).ok_or_else(missing),
        }
    }

    fn fields_mut(&mut self, direction: FieldDirection) -> &mut IndexMap<String, Field> {
        match direction {
            FieldDirection::Input => &mut self.inputs,
            FieldDirection::Output => &mut self.outputs,
        }
    }

    /// Run the node's behaviour
    pub fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        self.operation.operate(scope)
    }

    /// Look up a capability
    pub fn capability<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.capabilities.get::<T>()
    }

    /// Look up a capability for mutation
    pub fn capability_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.capabilities.get_mut::<T>()
    }

    /// Attach a capability, returning the one it replaces
    pub fn set_capability<T: Any + Send + Sync>(&mut self, capability: T) -> Option<T> {
        self.capabilities.insert(capability)
    }

    /// Builder form of [`set_capability`](Self::set_capability)
    pub fn with_capability<T: Any + Send + Sync>(mut self, capability: T) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Detach a capability
    pub fn remove_capability<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.capabilities.remove::<T>()
    }

    /// Check whether a capability is attached
    pub fn has_capability<T: Any + Send + Sync>(&self) -> bool {
        self.capabilities.contains::<T>()
    }

    /// All capabilities
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Type names of the attached capabilities, for persistence and display
    pub fn capability_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.capabilities.names()
    }
}

impl Vertex for OperationNode {
    type Id = NodeId;

    fn id(&self) -> NodeId {
        self.id
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Math operations
    Math,
    /// Logic/flow control
    Logic,
    /// Composite nodes (macros, loops)
    Composite,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Builds a fresh node of this type
    pub factory: fn() -> OperationNode,
}

/// Change notification sent to registry listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A type was added or replaced
    Registered(String),
    /// A type was removed
    Unregistered(String),
}

type Listener = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Registry of available node types.
///
/// Shareable across threads: the type table and the listener list are each
/// behind their own lock, and listeners run with neither lock held, so a
/// listener may call back into the registry.
pub struct NodeRegistry {
    /// Registered node types by ID
    types: RwLock<IndexMap<String, NodeType>>,
    listeners: Mutex<Vec<Listener>>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: RwLock::new(IndexMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register a node type
    pub fn register(&self, node_type: NodeType) {
        let id = node_type.id.clone();
        self.types.write().insert(id.clone(), node_type);
        tracing::debug!("Registered node type {}", id);
        self.notify(&RegistryEvent::Registered(id));
    }

    /// Remove a node type
    pub fn unregister(&self, id: &str) -> Option<NodeType> {
        let removed = self.types.write().shift_remove(id);
        if removed.is_some() {
            self.notify(&RegistryEvent::Unregistered(id.to_string()));
        }
        removed
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<NodeType> {
        self.types.read().get(id).cloned()
    }

    /// IDs of all registered types
    pub fn type_ids(&self) -> Vec<String> {
        self.types.read().keys().cloned().collect()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> Vec<NodeType> {
        self.types
            .read()
            .values()
            .filter(|t| t.category == category)
            .cloned()
            .collect()
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str) -> Option<OperationNode> {
        let factory = self.types.read().get(type_id).map(|t| t.factory)?;
        Some(factory())
    }

    /// Listen for registration changes
    pub fn subscribe(&self, listener: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    fn notify(&self, event: &RegistryEvent) {
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            listener(event);
        }
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.type_ids())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Noop;

    impl Operation for Noop {
        fn operate(&self, _scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
            Ok(())
        }
    }

    fn noop_node() -> OperationNode {
        OperationNode::new("noop", "Noop", Noop)
    }

    #[test]
    fn test_enabled_field_is_reserved() {
        let mut node = noop_node();
        let enabled = node.input(ENABLED_FIELD).unwrap();
        assert!(enabled.optional);
        assert!(enabled.fixed);

        let clash = Field::input(ENABLED_FIELD, Validator::Any);
        assert!(matches!(node.add_field(clash), Err(GraphError::DuplicateField { .. })));
    }

    #[test]
    fn test_field_keys_are_per_direction() {
        let mut node = noop_node();
        node.add_field(Field::input("value", Validator::Any)).unwrap();
        node.add_field(Field::output("value", ValueType::Any)).unwrap();
        assert!(node.add_field(Field::output("value", ValueType::Int)).is_err());
        assert_eq!(node.outputs().count(), 1);
    }

    #[test]
    fn test_remove_field() {
        let mut node = noop_node()
            .with_field(Field::input("fixed", Validator::Any))
            .with_field(Field::input("extra", Validator::Any).removable());

        assert!(matches!(
            node.remove_field(FieldDirection::Input, "fixed"),
            Err(GraphError::FieldFixed { .. })
        ));
        assert!(matches!(
            node.remove_field(FieldDirection::Output, "extra"),
            Err(GraphError::FieldMissing { .. })
        ));
        let removed = node.remove_field(FieldDirection::Input, "extra").unwrap();
        assert_eq!(removed.key, "extra");
        assert!(node.input("extra").is_none());
    }

    #[test]
    fn test_registry() {
        let registry = NodeRegistry::new();
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.register(NodeType {
            id: "noop".to_string(),
            name: "Noop".to_string(),
            category: NodeCategory::Utility,
            description: "Does nothing".to_string(),
            factory: noop_node,
        });

        let node = registry.create_node("noop").unwrap();
        assert_eq!(node.node_type(), "noop");
        assert!(registry.create_node("missing").is_none());
        assert_eq!(registry.types_in_category(NodeCategory::Utility).len(), 1);

        assert!(registry.unregister("noop").is_some());
        assert!(registry.unregister("noop").is_none());
        assert_eq!(events.load(Ordering::SeqCst), 2);
    }

    fn noop_type(id: &str) -> NodeType {
        NodeType {
            id: id.to_string(),
            name: "Noop".to_string(),
            category: NodeCategory::Utility,
            description: String::new(),
            factory: noop_node,
        }
    }

    #[test]
    fn test_listener_can_register() {
        let registry = Arc::new(NodeRegistry::new());
        let inner = Arc::downgrade(&registry);
        registry.subscribe(move |event| {
            if *event == RegistryEvent::Registered("a".to_string()) {
                if let Some(registry) = inner.upgrade() {
                    registry.register(noop_type("b"));
                    registry.subscribe(|_| {});
                }
            }
        });

        registry.register(noop_type("a"));
        assert_eq!(registry.type_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.listeners.lock().len(), 2);
    }
}
