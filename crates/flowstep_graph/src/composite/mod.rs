// SPDX-License-Identifier: MIT OR Apache-2.0
//! Composite nodes built from an inner graph and published fields.
//!
//! - [`macro_node`]: runs its inner graph once, fields mirror the inner ones
//! - [`for_each_node`]: runs its inner graph once per item of its list inputs

mod for_each;
mod macro_node;

pub use for_each::{for_each_node, ForEachProcessing, FOR_EACH_TYPE};
pub use macro_node::{macro_node, MacroProcessing, MACRO_TYPE};

use crate::context::{ExecutionContext, NodeScope, ScopePath};
use crate::node::OperationNode;
use crate::operation::{Operation, OperationError};
use crate::processor::ExecutionError;
use crate::publish::{PublishedField, Publishable};
use crate::value::Value;

/// Operation of a composite node; the processor steps its inner graph instead
#[derive(Debug)]
struct Stepped;

impl Operation for Stepped {
    fn operate(&self, _scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        Err(OperationError::Unsupported(
            "composite nodes are evaluated by stepping their inner graph",
        ))
    }
}

fn publish_table(node: &OperationNode) -> Result<&Publishable, ExecutionError> {
    node.capability::<Publishable>()
        .ok_or(ExecutionError::MissingCapability {
            node: node.id(),
            capability: "Publishable",
        })
}

/// Read the value an inner field holds after the inner graph ran
fn read_inner(
    context: &ExecutionContext,
    scope: &ScopePath,
    published: &PublishedField,
) -> Option<Value> {
    context
        .find_scope_at(&scope.child(published.target.node))
        .and_then(|inner| inner.get(&published.target.key))
        .cloned()
}

/// Seed an inner field before the inner graph runs
fn write_inner(
    context: &mut ExecutionContext,
    scope: &ScopePath,
    published: &PublishedField,
    value: Value,
) {
    context
        .scope_at(&scope.child(published.target.node))
        .put(published.target.key.clone(), value);
}
