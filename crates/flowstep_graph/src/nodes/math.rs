// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constants and arithmetic on floats.

use crate::context::NodeScope;
use crate::field::{Field, Validator};
use crate::node::OperationNode;
use crate::operation::{Operation, OperationError};
use crate::value::{Value, ValueType};

/// Writes a fixed value to its `value` output
#[derive(Debug, Clone)]
pub struct Constant {
    value: Value,
}

impl Operation for Constant {
    fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        scope.put("value", self.value.clone());
        Ok(())
    }
}

/// Two-operand float operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// a + b
    Add,
    /// a - b
    Subtract,
    /// a * b
    Multiply,
    /// a / b, failing on a zero divisor
    Divide,
    /// Smaller operand
    Min,
    /// Larger operand
    Max,
}

impl BinaryOp {
    /// Display name of nodes using the operator
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
            Self::Min => "Min",
            Self::Max => "Max",
        }
    }

    /// Registry type of nodes using the operator
    pub fn type_id(self) -> &'static str {
        match self {
            Self::Add => "math.add",
            Self::Subtract => "math.subtract",
            Self::Multiply => "math.multiply",
            Self::Divide => "math.divide",
            Self::Min => "math.min",
            Self::Max => "math.max",
        }
    }

    /// Apply the operator
    pub fn apply(self, a: f64, b: f64) -> Result<f64, OperationError> {
        Ok(match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide if b == 0.0 => {
                return Err(OperationError::Custom("division by zero".to_string()))
            }
            Self::Divide => a / b,
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        })
    }
}

/// Reads `a` and `b`, writes `result`
#[derive(Debug, Clone, Copy)]
pub struct Binary(pub BinaryOp);

impl Operation for Binary {
    fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        let a = scope.require_f64("a")?;
        let b = scope.require_f64("b")?;
        scope.put("result", self.0.apply(a, b)?);
        Ok(())
    }
}

/// Copies `value` through unchanged
#[derive(Debug, Clone, Copy)]
pub struct Passthrough;

impl Operation for Passthrough {
    fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
        let value = scope.require("value")?.clone();
        scope.put("value", value);
        Ok(())
    }
}

/// Constant node with output `value` of the value's type
pub fn constant(value: Value) -> OperationNode {
    let value_type = value.value_type();
    OperationNode::new("math.constant", "Constant", Constant { value })
        .with_field(Field::output("value", value_type).with_description("The constant"))
}

/// Node applying `op` to float inputs `a` and `b`
pub fn binary(op: BinaryOp) -> OperationNode {
    OperationNode::new(op.type_id(), op.name(), Binary(op))
        .with_field(Field::input("a", Validator::of(ValueType::Float)))
        .with_field(Field::input("b", Validator::of(ValueType::Float)))
        .with_field(Field::output("result", ValueType::Float))
}

/// a + b
pub fn add() -> OperationNode {
    binary(BinaryOp::Add)
}

/// a - b
pub fn subtract() -> OperationNode {
    binary(BinaryOp::Subtract)
}

/// a * b
pub fn multiply() -> OperationNode {
    binary(BinaryOp::Multiply)
}

/// a / b
pub fn divide() -> OperationNode {
    binary(BinaryOp::Divide)
}

/// min(a, b)
pub fn min() -> OperationNode {
    binary(BinaryOp::Min)
}

/// max(a, b)
pub fn max() -> OperationNode {
    binary(BinaryOp::Max)
}

/// Node forwarding any value from input `value` to output `value`
pub fn passthrough() -> OperationNode {
    OperationNode::new("math.passthrough", "Passthrough", Passthrough)
        .with_field(Field::input("value", Validator::Any))
        .with_field(Field::output("value", ValueType::Any))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Scope;

    fn run(node: &OperationNode, inputs: &[(&str, Value)]) -> Result<Scope, OperationError> {
        let mut scope = Scope::new();
        for (key, value) in inputs {
            scope.put(*key, value.clone());
        }
        let global = Scope::new();
        node.operate(&mut NodeScope::new(&mut scope, &global))?;
        Ok(scope)
    }

    #[test]
    fn test_binary_ops() {
        let cases = [
            (BinaryOp::Add, 7.0),
            (BinaryOp::Subtract, 3.0),
            (BinaryOp::Multiply, 10.0),
            (BinaryOp::Divide, 2.5),
            (BinaryOp::Min, 2.0),
            (BinaryOp::Max, 5.0),
        ];
        for (op, expected) in cases {
            let scope = run(&binary(op), &[("a", Value::Float(5.0)), ("b", Value::Float(2.0))]).unwrap();
            assert_eq!(scope.get("result"), Some(&Value::Float(expected)), "{}", op.name());
        }
    }

    #[test]
    fn test_int_inputs_widen() {
        let scope = run(&add(), &[("a", Value::Int(2)), ("b", Value::Float(0.5))]).unwrap();
        assert_eq!(scope.get("result"), Some(&Value::Float(2.5)));
    }

    #[test]
    fn test_divide_by_zero_fails() {
        let err = run(&divide(), &[("a", Value::Float(1.0)), ("b", Value::Float(0.0))]).unwrap_err();
        assert!(matches!(err, OperationError::Custom(_)));
    }

    #[test]
    fn test_constant_declares_value_type() {
        let node = constant(Value::from("label"));
        assert_eq!(node.output("value").unwrap().value_type, ValueType::String);
        let scope = run(&node, &[]).unwrap();
        assert_eq!(scope.get("value"), Some(&Value::from("label")));
    }

    #[test]
    fn test_passthrough() {
        let scope = run(&passthrough(), &[("value", Value::from(vec![1_i64, 2]))]).unwrap();
        assert_eq!(scope.get("value"), Some(&Value::from(vec![1_i64, 2])));
        assert!(matches!(run(&passthrough(), &[]), Err(OperationError::MissingValue(_))));
    }
}
