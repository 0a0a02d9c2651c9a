// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boolean logic and comparison.

use crate::context::NodeScope;
use crate::field::{Field, Validator};
use crate::node::OperationNode;
use crate::operation::{Operation, OperationError};
use crate::value::ValueType;

/// Negates `value`
#[derive(Debug, Clone, Copy)]
pub struct Not;

impl Operation for Not {
    fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        let value = scope.require_bool("value")?;
        scope.put("result", !value);
        Ok(())
    }
}

/// Writes `a < b`
#[derive(Debug, Clone, Copy)]
pub struct Less;

impl Operation for Less {
    fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        let a = scope.require_f64("a")?;
        let b = scope.require_f64("b")?;
        scope.put("result", a < b);
        Ok(())
    }
}

/// Forwards `if_true` or `if_false` depending on `condition`.
///
/// Only the chosen branch needs a value.
#[derive(Debug, Clone, Copy)]
pub struct Select;

impl Operation for Select {
    fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        let key = if scope.require_bool("condition")? {
            "if_true"
        } else {
            "if_false"
        };
        let value = scope.require(key)?.clone();
        scope.put("result", value);
        Ok(())
    }
}

/// Boolean negation node
pub fn not() -> OperationNode {
    OperationNode::new("logic.not", "Not", Not)
        .with_field(Field::input("value", Validator::of(ValueType::Bool)))
        .with_field(Field::output("result", ValueType::Bool))
}

/// Numeric comparison node
pub fn less() -> OperationNode {
    OperationNode::new("logic.less", "Less", Less)
        .with_field(Field::input("a", Validator::of(ValueType::Float)))
        .with_field(Field::input("b", Validator::of(ValueType::Float)))
        .with_field(Field::output("result", ValueType::Bool))
}

/// Two-way selection node
pub fn select() -> OperationNode {
    OperationNode::new("logic.select", "Select", Select)
        .with_field(Field::input("condition", Validator::of(ValueType::Bool)))
        .with_field(Field::input("if_true", Validator::Any).optional())
        .with_field(Field::input("if_false", Validator::Any).optional())
        .with_field(Field::output("result", ValueType::Any))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionContext, Scope};
    use crate::field::ENABLED_FIELD;
    use crate::graph::OperationGraph;
    use crate::nodes::math::constant;
    use crate::processor::Processor;
    use crate::value::Value;

    #[test]
    fn test_not_and_less() {
        let mut scope = Scope::new();
        scope.put("value", true);
        scope.put("a", 1.0);
        scope.put("b", 2.0);
        let global = Scope::new();
        let mut view = NodeScope::new(&mut scope, &global);

        not().operate(&mut view).unwrap();
        assert_eq!(view.get("result"), Some(&Value::Bool(false)));
        less().operate(&mut view).unwrap();
        assert_eq!(view.get("result"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_select_needs_only_the_chosen_branch() {
        let mut graph = OperationGraph::new("select");
        let flag = graph.add_node(constant(Value::Bool(false))).unwrap();
        let yes = graph.add_node(constant(Value::from("yes"))).unwrap();
        let no = graph.add_node(constant(Value::from("no"))).unwrap();
        let choice = graph.add_node(select()).unwrap();
        graph.connect(flag, "value", choice, "condition").unwrap();
        graph.connect(yes, "value", choice, "if_true").unwrap();
        graph.connect(no, "value", choice, "if_false").unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.scope(yes).put(ENABLED_FIELD, false);
        let ctx = Processor::run(&graph, ctx).unwrap();
        assert_eq!(ctx.find_scope(choice).unwrap().get("result"), Some(&Value::from("no")));
    }

    #[test]
    fn test_not_drives_enabled() {
        let mut graph = OperationGraph::new("gate");
        let flag = graph.add_node(constant(Value::Bool(true))).unwrap();
        let invert = graph.add_node(not()).unwrap();
        let gated = graph.add_node(constant(Value::Float(1.0))).unwrap();
        graph.connect(flag, "value", invert, "value").unwrap();
        graph.connect(invert, "result", gated, ENABLED_FIELD).unwrap();

        let ctx = Processor::run(&graph, ExecutionContext::new()).unwrap();
        assert_eq!(ctx.find_scope(gated).unwrap().get("value"), None);
    }
}
