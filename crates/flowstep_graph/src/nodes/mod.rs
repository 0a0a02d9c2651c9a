// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node library.

pub mod logic;
pub mod math;

use crate::composite::{for_each_node, macro_node, FOR_EACH_TYPE, MACRO_TYPE};
use crate::graph::OperationGraph;
use crate::node::{NodeCategory, NodeRegistry, NodeType, OperationNode};
use crate::value::Value;
use math::BinaryOp;

/// Create a registry holding every built-in node type
pub fn create_standard_registry() -> NodeRegistry {
    let registry = NodeRegistry::new();

    // ========================================================================
    // Input
    // ========================================================================

    registry.register(NodeType {
        id: "math.constant".to_string(),
        name: "Constant".to_string(),
        category: NodeCategory::Input,
        description: "Constant float value".to_string(),
        factory: || math::constant(Value::Float(0.0)),
    });

    // ========================================================================
    // Math
    // ========================================================================

    let binary: [(BinaryOp, &str, fn() -> OperationNode); 6] = [
        (BinaryOp::Add, "Sum of a and b", math::add),
        (BinaryOp::Subtract, "Difference of a and b", math::subtract),
        (BinaryOp::Multiply, "Product of a and b", math::multiply),
        (BinaryOp::Divide, "Quotient of a and b", math::divide),
        (BinaryOp::Min, "Smaller of a and b", math::min),
        (BinaryOp::Max, "Larger of a and b", math::max),
    ];
    for (op, description, factory) in binary {
        registry.register(NodeType {
            id: op.type_id().to_string(),
            name: op.name().to_string(),
            category: NodeCategory::Math,
            description: description.to_string(),
            factory,
        });
    }

    // ========================================================================
    // Logic
    // ========================================================================

    registry.register(NodeType {
        id: "logic.not".to_string(),
        name: "Not".to_string(),
        category: NodeCategory::Logic,
        description: "Boolean negation".to_string(),
        factory: logic::not,
    });

    registry.register(NodeType {
        id: "logic.less".to_string(),
        name: "Less".to_string(),
        category: NodeCategory::Logic,
        description: "True when a < b".to_string(),
        factory: logic::less,
    });

    registry.register(NodeType {
        id: "logic.select".to_string(),
        name: "Select".to_string(),
        category: NodeCategory::Logic,
        description: "Pick one of two values by condition".to_string(),
        factory: logic::select,
    });

    // ========================================================================
    // Composite
    // ========================================================================

    registry.register(NodeType {
        id: MACRO_TYPE.to_string(),
        name: "Macro".to_string(),
        category: NodeCategory::Composite,
        description: "Run an inner graph once".to_string(),
        factory: || macro_node("Macro", OperationGraph::new("Macro")),
    });

    registry.register(NodeType {
        id: FOR_EACH_TYPE.to_string(),
        name: "For Each".to_string(),
        category: NodeCategory::Composite,
        description: "Run an inner graph once per list item".to_string(),
        factory: || for_each_node("For Each", OperationGraph::new("For Each")),
    });

    // ========================================================================
    // Utility
    // ========================================================================

    registry.register(NodeType {
        id: "math.passthrough".to_string(),
        name: "Passthrough".to_string(),
        category: NodeCategory::Utility,
        description: "Forward a value unchanged".to_string(),
        factory: math::passthrough,
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CompositeNode;

    #[test]
    fn test_standard_registry() {
        let registry = create_standard_registry();
        assert_eq!(registry.type_ids().len(), 13);
        assert_eq!(registry.types_in_category(NodeCategory::Math).len(), 6);

        // Factories produce nodes reporting their own type
        for id in registry.type_ids() {
            let node = registry.create_node(&id).unwrap();
            assert_eq!(node.node_type(), id);
        }

        let looped = registry.create_node(FOR_EACH_TYPE).unwrap();
        assert!(looped.has_capability::<CompositeNode>());
        assert!(registry.create_node("missing").is_none());
    }
}
