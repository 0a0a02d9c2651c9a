// SPDX-License-Identifier: MIT OR Apache-2.0
//! For-each nodes: an inner graph run once per item of the list inputs.
//!
//! Published inputs take lists whose items the inner field accepts and
//! published outputs produce lists. The number of iterations is the length of
//! the longest input; an input that is shorter supplies no value on the
//! remaining iterations, and so does a `null` item. Output lists hold one
//! item per iteration, `null` where the inner field was left unset. Inner scopes are reset to their state on entry
//! before every iteration, so nothing leaks from one item to the next.

use super::{publish_table, read_inner, write_inner, Stepped};
use crate::capability::{CompositeNode, CustomProcessing, StepProvider};
use crate::context::{ExecutionContext, Scope, ScopePath};
use crate::graph::OperationGraph;
use crate::node::{NodeId, OperationNode};
use crate::processor::{ExecutionError, NodeIterator};
use crate::publish::{PublishMode, Publishable, PublishedField};
use crate::value::Value;
use indexmap::IndexMap;

/// Registry type of for-each nodes
pub const FOR_EACH_TYPE: &str = "composite.for_each";

/// Create a for-each node around `graph`
pub fn for_each_node(name: impl Into<String>, graph: OperationGraph) -> OperationNode {
    OperationNode::new(FOR_EACH_TYPE, name, Stepped)
        .with_capability(CompositeNode::new(graph))
        .with_capability(CustomProcessing::new(ForEachProcessing))
        .with_capability(Publishable::new(PublishMode::Collection))
}

/// Steps a for-each node's inner graph once per iteration
#[derive(Debug, Clone, Copy, Default)]
pub struct ForEachProcessing;

impl StepProvider for ForEachProcessing {
    fn node_iterator<'g>(
        &self,
        node: &'g OperationNode,
        inner: &'g OperationGraph,
        scope: ScopePath,
    ) -> Result<Box<dyn NodeIterator + 'g>, ExecutionError> {
        Ok(Box::new(ForEachIterator {
            node,
            published: publish_table(node)?,
            scope,
            order: inner.topological_order(),
            cursor: 0,
            iteration: 0,
            count: 0,
            items: Vec::new(),
            results: IndexMap::new(),
            baseline: IndexMap::new(),
        }))
    }
}

struct ForEachIterator<'g> {
    node: &'g OperationNode,
    published: &'g Publishable,
    scope: ScopePath,
    order: Vec<NodeId>,
    cursor: usize,
    iteration: usize,
    count: usize,
    items: Vec<(&'g PublishedField, Vec<Value>)>,
    results: IndexMap<String, Vec<Value>>,
    baseline: IndexMap<NodeId, Scope>,
}

impl ForEachIterator<'_> {
    fn has_more_iterations(&self) -> bool {
        self.iteration + 1 < self.count
    }

    fn begin(&mut self, context: &mut ExecutionContext) {
        context
            .scope_at(&self.scope)
            .set_children(self.baseline.clone());
        for (published, items) in &self.items {
            if let Some(item) = items.get(self.iteration).filter(|item| !item.is_null()) {
                write_inner(context, &self.scope, published, item.clone());
            }
        }
        self.cursor = 0;
        tracing::trace!(
            "{} iteration {}/{}",
            self.node.name,
            self.iteration + 1,
            self.count
        );
    }

    fn collect(&mut self, context: &ExecutionContext) {
        for published in self.published.outputs() {
            let value = read_inner(context, &self.scope, published).unwrap_or(Value::Null);
            self.results
                .entry(published.key.clone())
                .or_default()
                .push(value);
        }
    }
}

impl NodeIterator for ForEachIterator<'_> {
    fn initialize(&mut self, context: &mut ExecutionContext) -> Result<(), ExecutionError> {
        for published in self.published.inputs() {
            let items = match context.lookup(&self.scope, &published.key) {
                None => Vec::new(),
                Some(Value::List(items)) => items.clone(),
                Some(other) => {
                    return Err(ExecutionError::InvalidInput {
                        node: self.node.id(),
                        name: self.node.name.clone(),
                        field: published.key.clone(),
                        expected: "list".to_string(),
                        found: other.value_type(),
                    });
                }
            };
            self.items.push((published, items));
        }
        self.count = self.items.iter().map(|(_, items)| items.len()).max().unwrap_or(0);
        self.results = self
            .published
            .outputs()
            .map(|published| (published.key.clone(), Vec::new()))
            .collect();
        self.baseline = context
            .find_scope_at(&self.scope)
            .map(|scope| scope.children().clone())
            .unwrap_or_default();

        tracing::debug!("{} runs {} iterations", self.node.name, self.count);
        if self.count > 0 {
            self.begin(context);
        }
        Ok(())
    }

    fn peek(&self) -> Option<NodeId> {
        if self.count == 0 {
            return None;
        }
        match self.order.get(self.cursor) {
            Some(node) => Some(*node),
            None if self.has_more_iterations() => self.order.first().copied(),
            None => None,
        }
    }

    fn next(&mut self, context: &mut ExecutionContext) -> Result<Option<NodeId>, ExecutionError> {
        if self.count == 0 {
            return Ok(None);
        }
        if self.cursor >= self.order.len() && self.has_more_iterations() {
            self.collect(context);
            self.iteration += 1;
            self.begin(context);
        }
        let next = self.order.get(self.cursor).copied();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    fn terminate(&mut self, context: &mut ExecutionContext) -> Result<(), ExecutionError> {
        if self.count > 0 && !self.order.is_empty() {
            self.collect(context);
        }
        let scope = context.scope_at(&self.scope);
        for (key, values) in std::mem::take(&mut self.results) {
            scope.put(key, Value::List(values));
        }
        Ok(())
    }
}
