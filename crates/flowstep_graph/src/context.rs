// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hierarchical execution context.
//!
//! Every node evaluated during a run owns a [`Scope`] holding its field
//! values. Scopes nest: a composite node's scope owns the scopes of the
//! nodes in its inner graph. A separate global scope answers reads that miss
//! a node's own scope; writes never go there implicitly.

use crate::node::NodeId;
use crate::operation::OperationError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of node identities from the root graph down to a scope.
///
/// The empty path addresses the root level itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopePath(Vec<NodeId>);

impl ScopePath {
    /// The root level
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of a child scope
    pub fn child(&self, node: NodeId) -> Self {
        let mut nodes = self.0.clone();
        nodes.push(node);
        Self(nodes)
    }

    /// Path of the enclosing scope
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// Last node on the path
    pub fn node(&self) -> Option<NodeId> {
        self.0.last().copied()
    }

    /// Nodes on the path, outermost first
    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    /// Number of nested levels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether this is the root path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", node.0)?;
        }
        Ok(())
    }
}

/// Key/value storage for one node, plus the scopes nested below it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    values: IndexMap<String, Value>,
    children: IndexMap<NodeId, Scope>,
}

impl Scope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store a value, returning the previous one
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Check whether a value is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    /// Remove every value and nested scope
    pub fn clear(&mut self) {
        self.values.clear();
        self.children.clear();
    }

    /// Stored values in write order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check whether the scope holds neither values nor nested scopes
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty()
    }

    /// Nested scope of a node, created on first access
    pub fn scope(&mut self, node: NodeId) -> &mut Scope {
        self.children.entry(node).or_default()
    }

    /// Nested scope of a node, if it was ever created
    pub fn find_scope(&self, node: NodeId) -> Option<&Scope> {
        self.children.get(&node)
    }

    /// All nested scopes
    pub fn children(&self) -> &IndexMap<NodeId, Scope> {
        &self.children
    }

    /// Replace all nested scopes
    pub fn set_children(&mut self, children: IndexMap<NodeId, Scope>) {
        self.children = children;
    }
}

/// Execution context of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    global: Scope,
    root: Scope,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// The global fallback scope
    pub fn global_scope(&self) -> &Scope {
        &self.global
    }

    /// The global fallback scope, for pre-populating defaults
    pub fn global_scope_mut(&mut self) -> &mut Scope {
        &mut self.global
    }

    /// Scope of a root-level node, created on first access
    pub fn scope(&mut self, node: NodeId) -> &mut Scope {
        self.root.scope(node)
    }

    /// Scope of a root-level node, if it exists
    pub fn find_scope(&self, node: NodeId) -> Option<&Scope> {
        self.root.find_scope(node)
    }

    /// Scope at a path, creating every missing level
    pub fn scope_at(&mut self, path: &ScopePath) -> &mut Scope {
        path.nodes()
            .iter()
            .fold(&mut self.root, |scope, node| scope.scope(*node))
    }

    /// Scope at a path, if every level exists
    pub fn find_scope_at(&self, path: &ScopePath) -> Option<&Scope> {
        path.nodes()
            .iter()
            .try_fold(&self.root, |scope, node| scope.find_scope(*node))
    }

    /// Read a value from the scope at `path`, falling back to the global scope
    pub fn lookup(&self, path: &ScopePath, key: &str) -> Option<&Value> {
        self.find_scope_at(path)
            .and_then(|scope| scope.get(key))
            .or_else(|| self.global.get(key))
    }

    /// View handed to a node's operation
    pub fn node_scope(&mut self, path: &ScopePath) -> NodeScope<'_> {
        let Self { global, root } = self;
        let scope = path
            .nodes()
            .iter()
            .fold(root, |scope, node| scope.scope(*node));
        NodeScope { scope, global }
    }

    /// Reset to an empty context
    pub fn clear(&mut self) {
        self.global.clear();
        self.root.clear();
    }
}

/// A node's own scope paired with the global fallback.
///
/// Reads consult the node scope first; writes always land in the node scope.
#[derive(Debug)]
pub struct NodeScope<'a> {
    scope: &'a mut Scope,
    global: &'a Scope,
}

impl<'a> NodeScope<'a> {
    /// Wrap a scope with a global fallback
    pub fn new(scope: &'a mut Scope, global: &'a Scope) -> Self {
        Self { scope, global }
    }

    /// Read a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scope.get(key).or_else(|| self.global.get(key))
    }

    /// Check whether a value is readable under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Write a value into the node scope
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.scope.put(key, value);
    }

    /// Read a value that must be present
    pub fn require(&self, key: &str) -> Result<&Value, OperationError> {
        self.get(key)
            .ok_or_else(|| OperationError::MissingValue(key.to_string()))
    }

    /// Read a number that must be present
    pub fn require_f64(&self, key: &str) -> Result<f64, OperationError> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| OperationError::InvalidValue {
            field: key.to_string(),
            expected: "number",
            found: value.value_type(),
        })
    }

    /// Read a boolean that must be present
    pub fn require_bool(&self, key: &str) -> Result<bool, OperationError> {
        let value = self.require(key)?;
        value.as_bool().ok_or_else(|| OperationError::InvalidValue {
            field: key.to_string(),
            expected: "bool",
            found: value.value_type(),
        })
    }
}
