// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field descriptors for node inputs/outputs and their type predicates.

use crate::node::NodeId;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of the reserved boolean input every node carries.
///
/// A node whose `enabled` value is `false` is skipped during a run.
pub const ENABLED_FIELD: &str = "enabled";

/// Field direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldDirection {
    /// Input field
    Input,
    /// Output field
    Output,
}

impl fmt::Display for FieldDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Type-acceptance predicate attached to a field.
///
/// Predicates answer two questions: whether a concrete value is acceptable
/// ([`accepts`](Self::accepts)) and whether anything of a declared type could
/// be ([`accepts_type`](Self::accepts_type)). The second is what link
/// creation checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Validator {
    /// Accepts everything
    Any,
    /// Accepts values assignable to the type
    Type(ValueType),
    /// Accepts numbers within an inclusive range
    Range {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Accepts what every inner predicate accepts
    And(Vec<Validator>),
    /// Accepts what at least one inner predicate accepts
    Or(Vec<Validator>),
    /// Accepts lists whose every element the inner predicate accepts
    CollectionOf(Box<Validator>),
}

impl Validator {
    /// Predicate for a single type
    pub fn of(value_type: ValueType) -> Self {
        Self::Type(value_type)
    }

    /// Wrap a predicate so it validates each item of a list
    pub fn collection_of(element: Validator) -> Self {
        Self::CollectionOf(Box::new(element))
    }

    /// Check a concrete value
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Type(value_type) => value_type.accepts_value(value),
            Self::Range { min, max } => value
                .as_f64()
                .is_some_and(|v| v >= *min && v <= *max),
            Self::And(all) => all.iter().all(|v| v.accepts(value)),
            Self::Or(any) => any.iter().any(|v| v.accepts(value)),
            Self::CollectionOf(element) => match value {
                Value::List(items) => items
                    .iter()
                    .all(|item| item.is_null() || element.accepts(item)),
                _ => false,
            },
        }
    }

    /// Check a declared type
    pub fn accepts_type(&self, value_type: &ValueType) -> bool {
        match self {
            Self::Any => true,
            Self::Type(expected) => value_type.is_assignable_to(expected),
            Self::Range { .. } => matches!(
                value_type,
                ValueType::Int | ValueType::Float | ValueType::Any
            ),
            Self::And(all) => all.iter().all(|v| v.accepts_type(value_type)),
            Self::Or(any) => any.iter().any(|v| v.accepts_type(value_type)),
            Self::CollectionOf(element) => match value_type {
                ValueType::List(inner) => element.accepts_type(inner),
                ValueType::Any => true,
                _ => false,
            },
        }
    }

    /// The most specific type this predicate describes
    pub fn declared_type(&self) -> ValueType {
        match self {
            Self::Any => ValueType::Any,
            Self::Type(value_type) => value_type.clone(),
            Self::Range { .. } => ValueType::Float,
            Self::And(all) => all
                .iter()
                .map(Validator::declared_type)
                .find(|t| *t != ValueType::Any)
                .unwrap_or(ValueType::Any),
            Self::Or(any) => {
                let mut types = any.iter().map(Validator::declared_type);
                match types.next() {
                    Some(first) if types.all(|t| t == first) => first,
                    _ => ValueType::Any,
                }
            }
            Self::CollectionOf(element) => ValueType::list_of(element.declared_type()),
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Type(value_type) => write!(f, "{value_type}"),
            Self::Range { min, max } => write!(f, "number in [{min}, {max}]"),
            Self::And(all) => write_joined(f, all, " and "),
            Self::Or(any) => write_joined(f, any, " or "),
            Self::CollectionOf(element) => write!(f, "list of {element}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Validator], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

/// A field declared on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Key, unique per direction within its node
    pub key: String,
    /// Human description
    pub description: String,
    /// Field direction
    pub direction: FieldDirection,
    /// Declared data type
    pub value_type: ValueType,
    /// Acceptance predicate
    pub validator: Validator,
    /// Whether the node can run without a value here
    pub optional: bool,
    /// Whether the field is part of the node's fixed shape
    pub fixed: bool,
    /// Value used when the scope holds none
    pub default_value: Option<Value>,
}

impl Field {
    /// Create a new required, fixed input field
    pub fn input(key: impl Into<String>, validator: Validator) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
            direction: FieldDirection::Input,
            value_type: validator.declared_type(),
            validator,
            optional: false,
            fixed: true,
            default_value: None,
        }
    }

    /// Create a new fixed output field
    pub fn output(key: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
            direction: FieldDirection::Output,
            validator: Validator::Type(value_type.clone()),
            value_type,
            optional: true,
            fixed: true,
            default_value: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Allow removing the field at runtime
    pub fn removable(mut self) -> Self {
        self.fixed = false;
        self
    }

    /// Check whether this is an input field
    pub fn is_input(&self) -> bool {
        self.direction == FieldDirection::Input
    }
}

/// Address of a field on a specific node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Owning node
    pub node: NodeId,
    /// Field direction
    pub direction: FieldDirection,
    /// Field key
    pub key: String,
}

impl FieldRef {
    /// Refer to an input field
    pub fn input(node: NodeId, key: impl Into<String>) -> Self {
        Self {
            node,
            direction: FieldDirection::Input,
            key: key.into(),
        }
    }

    /// Refer to an output field
    pub fn output(node: NodeId, key: impl Into<String>) -> Self {
        Self {
            node,
            direction: FieldDirection::Output,
            key: key.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_predicates() {
        let number = Validator::Or(vec![
            Validator::of(ValueType::Int),
            Validator::of(ValueType::Float),
        ]);
        assert!(number.accepts(&Value::Int(1)));
        assert!(number.accepts_type(&ValueType::Float));
        assert!(!number.accepts(&Value::from("x")));
        assert!(!number.accepts_type(&ValueType::Bool));

        let unit = Validator::And(vec![
            Validator::of(ValueType::Float),
            Validator::Range { min: 0.0, max: 1.0 },
        ]);
        assert!(unit.accepts(&Value::Float(0.5)));
        assert!(!unit.accepts(&Value::Float(1.5)));
        assert!(unit.accepts_type(&ValueType::Int));
        assert_eq!(unit.declared_type(), ValueType::Float);
    }

    #[test]
    fn test_collection_predicate() {
        let floats = Validator::collection_of(Validator::of(ValueType::Float));
        assert!(floats.accepts(&Value::from(vec![1.0, 2.0])));
        assert!(floats.accepts(&Value::List(Vec::new())));
        assert!(!floats.accepts(&Value::Float(1.0)));
        assert!(!floats.accepts(&Value::from(vec!["a"])));
        assert!(floats.accepts(&Value::List(vec![Value::Float(1.0), Value::Null])));
        assert!(floats.accepts_type(&ValueType::list_of(ValueType::Int)));
        assert!(!floats.accepts_type(&ValueType::Float));
        assert_eq!(floats.declared_type(), ValueType::list_of(ValueType::Float));
        assert_eq!(floats.to_string(), "list of float");
    }

    #[test]
    fn test_field_builders() {
        let field = Field::input("x", Validator::of(ValueType::Float))
            .optional()
            .removable()
            .with_default(Value::Float(1.0))
            .with_description("X coordinate");
        assert!(field.is_input());
        assert!(field.optional);
        assert!(!field.fixed);
        assert_eq!(field.value_type, ValueType::Float);

        let out = Field::output("result", ValueType::Int);
        assert!(!out.is_input());
        assert!(out.validator.accepts(&Value::Int(3)));
    }
}
