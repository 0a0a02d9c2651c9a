// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type-indexed capabilities attached to nodes and graphs.
//!
//! Optional behaviours are granted by registering a value under its own type
//! instead of through a class hierarchy: a node is composite because it
//! carries a [`CompositeNode`], steps its own children because it carries a
//! [`CustomProcessing`], and so on. Any combination is allowed.

use crate::context::ScopePath;
use crate::graph::OperationGraph;
use crate::node::OperationNode;
use crate::processor::{ExecutionError, NodeIterator};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, Any, TypeId};
use std::fmt;

struct Entry {
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

/// Map from capability type to instance
#[derive(Default)]
pub struct Capabilities {
    entries: IndexMap<TypeId, Entry>,
}

impl Capabilities {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the capability of type `T`
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries.get(&TypeId::of::<T>())?.value.downcast_ref::<T>()
    }

    /// Get the capability of type `T` for mutation
    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.entries.get_mut(&TypeId::of::<T>())?.value.downcast_mut::<T>()
    }

    /// Register a capability, returning the one it replaces
    pub fn insert<T: Any + Send + Sync>(&mut self, capability: T) -> Option<T> {
        let entry = Entry {
            name: type_name::<T>(),
            value: Box::new(capability),
        };
        let previous = self.entries.insert(TypeId::of::<T>(), entry)?;
        previous.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Remove the capability of type `T`
    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        let entry = self.entries.shift_remove(&TypeId::of::<T>())?;
        entry.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Check whether a capability of type `T` is present
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Type names of the registered capabilities, in registration order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(|entry| entry.name)
    }

    /// Number of capabilities
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no capability is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Capability: the node owns an inner graph
#[derive(Debug)]
pub struct CompositeNode {
    graph: OperationGraph,
}

impl CompositeNode {
    /// Wrap an inner graph
    pub fn new(graph: OperationGraph) -> Self {
        Self { graph }
    }

    /// The inner graph
    pub fn graph(&self) -> &OperationGraph {
        &self.graph
    }

    /// The inner graph, for editing
    pub fn graph_mut(&mut self) -> &mut OperationGraph {
        &mut self.graph
    }

    /// Take the inner graph back
    pub fn into_graph(self) -> OperationGraph {
        self.graph
    }
}

/// Supplies the stepping sequence of a composite node
pub trait StepProvider: Send + Sync {
    /// Build the iterator the processor pushes when it steps into `node`.
    ///
    /// `inner` is the graph held by the node's [`CompositeNode`] capability and
    /// `scope` the path of the node's own scope; inner nodes live in child
    /// scopes of it.
    fn node_iterator<'g>(
        &self,
        node: &'g OperationNode,
        inner: &'g OperationGraph,
        scope: ScopePath,
    ) -> Result<Box<dyn NodeIterator + 'g>, ExecutionError>;
}

/// Capability: the node drives its own inner stepping
pub struct CustomProcessing {
    provider: Box<dyn StepProvider>,
}

impl CustomProcessing {
    /// Wrap a step provider
    pub fn new(provider: impl StepProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
        }
    }

    /// Build the node iterator, see [`StepProvider::node_iterator`]
    pub fn node_iterator<'g>(
        &self,
        node: &'g OperationNode,
        inner: &'g OperationGraph,
        scope: ScopePath,
    ) -> Result<Box<dyn NodeIterator + 'g>, ExecutionError> {
        self.provider.node_iterator(node, inner, scope)
    }
}

impl fmt::Debug for CustomProcessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomProcessing").finish_non_exhaustive()
    }
}

/// Error loading or saving node settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Stored settings could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Opaque configuration a persistence layer can save and restore
pub trait NodeSettings: Send + Sync {
    /// Serialize the settings
    fn save(&self) -> Result<String, SettingsError>;

    /// Replace the settings from serialized data
    fn load(&mut self, data: &str) -> Result<(), SettingsError>;
}

/// [`NodeSettings`] stored as RON
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RonSettings<T> {
    /// Current settings
    pub value: T,
}

impl<T> RonSettings<T> {
    /// Wrap a settings value
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> NodeSettings for RonSettings<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn save(&self) -> Result<String, SettingsError> {
        Ok(ron::to_string(&self.value)?)
    }

    fn load(&mut self, data: &str) -> Result<(), SettingsError> {
        self.value = ron::from_str(data)?;
        Ok(())
    }
}

/// Capability: the node has persisted configuration
pub struct PersistableSettings {
    settings: Box<dyn NodeSettings>,
}

impl PersistableSettings {
    /// Wrap a settings implementation
    pub fn new(settings: impl NodeSettings + 'static) -> Self {
        Self {
            settings: Box::new(settings),
        }
    }

    /// Serialize the settings
    pub fn save(&self) -> Result<String, SettingsError> {
        self.settings.save()
    }

    /// Restore the settings
    pub fn load(&mut self, data: &str) -> Result<(), SettingsError> {
        self.settings.load(data)
    }
}

impl fmt::Debug for PersistableSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistableSettings").finish_non_exhaustive()
    }
}
