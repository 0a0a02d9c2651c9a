// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values that flow along links and their declared types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type a field declares
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// Ordered collection of values of the element type
    List(Box<ValueType>),
    /// Any type (for generic nodes)
    Any,
}

impl ValueType {
    /// List of the given element type
    pub fn list_of(element: ValueType) -> Self {
        Self::List(Box::new(element))
    }

    /// Check whether a value declared as `self` can be stored where `target`
    /// is expected
    pub fn is_assignable_to(&self, target: &ValueType) -> bool {
        match (self, target) {
            // Any type can connect to anything
            (Self::Any, _) | (_, Self::Any) => true,
            // Integers widen to floats
            (Self::Int, Self::Float) => true,
            (Self::List(from), Self::List(to)) => from.is_assignable_to(to),
            _ => self == target,
        }
    }

    /// Check whether a concrete value satisfies this type
    pub fn accepts_value(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Int, Value::Int(_)) => true,
            (Self::Float, Value::Float(_) | Value::Int(_)) => true,
            (Self::String, Value::String(_)) => true,
            (Self::List(element), Value::List(items)) => items
                .iter()
                .all(|item| item.is_null() || element.accepts_value(item)),
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::List(element) => write!(f, "list<{element}>"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// A value stored in an execution scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// Ordered list
    List(Vec<Value>),
    /// Empty slot in a list, written where an iteration produced nothing
    Null,
}

impl Value {
    /// Get the type of this value.
    ///
    /// Lists report the type of their first non-null element, or `any` when
    /// there is none.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Any,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::List(items) => ValueType::list_of(
                items
                    .iter()
                    .find(|item| !item.is_null())
                    .map_or(ValueType::Any, Value::value_type),
            ),
        }
    }

    /// Check for the empty-slot marker
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view (integers widen)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer view
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// List view
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Null => f.write_str("null"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}
