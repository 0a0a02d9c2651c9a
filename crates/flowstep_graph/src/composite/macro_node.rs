// SPDX-License-Identifier: MIT OR Apache-2.0
//! Macro nodes: an inner graph run once in place of the node.

use super::{publish_table, read_inner, write_inner, Stepped};
use crate::capability::{CompositeNode, CustomProcessing, StepProvider};
use crate::context::{ExecutionContext, ScopePath};
use crate::graph::OperationGraph;
use crate::node::{NodeId, OperationNode};
use crate::processor::{ExecutionError, NodeIterator, TopologicalIterator};
use crate::publish::{PublishMode, Publishable};

/// Registry type of macro nodes
pub const MACRO_TYPE: &str = "composite.macro";

/// Create a macro node around `graph`.
///
/// The node starts with no fields besides `enabled`; expose inner fields with
/// [`OperationNode::publish`].
pub fn macro_node(name: impl Into<String>, graph: OperationGraph) -> OperationNode {
    OperationNode::new(MACRO_TYPE, name, Stepped)
        .with_capability(CompositeNode::new(graph))
        .with_capability(CustomProcessing::new(MacroProcessing))
        .with_capability(Publishable::new(PublishMode::Direct))
}

/// Steps a macro's inner graph once in topological order
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroProcessing;

impl StepProvider for MacroProcessing {
    fn node_iterator<'g>(
        &self,
        node: &'g OperationNode,
        inner: &'g OperationGraph,
        scope: ScopePath,
    ) -> Result<Box<dyn NodeIterator + 'g>, ExecutionError> {
        Ok(Box::new(MacroIterator {
            published: publish_table(node)?,
            scope,
            nodes: TopologicalIterator::new(inner),
        }))
    }
}

struct MacroIterator<'g> {
    published: &'g Publishable,
    scope: ScopePath,
    nodes: TopologicalIterator,
}

impl NodeIterator for MacroIterator<'_> {
    fn initialize(&mut self, context: &mut ExecutionContext) -> Result<(), ExecutionError> {
        for published in self.published.inputs() {
            if let Some(value) = context.lookup(&self.scope, &published.key).cloned() {
                write_inner(context, &self.scope, published, value);
            }
        }
        Ok(())
    }

    fn peek(&self) -> Option<NodeId> {
        self.nodes.peek()
    }

    fn next(&mut self, context: &mut ExecutionContext) -> Result<Option<NodeId>, ExecutionError> {
        self.nodes.next(context)
    }

    fn terminate(&mut self, context: &mut ExecutionContext) -> Result<(), ExecutionError> {
        for published in self.published.outputs() {
            if let Some(value) = read_inner(context, &self.scope, published) {
                context.scope_at(&self.scope).put(published.key.clone(), value);
            }
        }
        Ok(())
    }
}
