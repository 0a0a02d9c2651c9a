// SPDX-License-Identifier: MIT OR Apache-2.0
//! The behaviour contract every node implements.

use crate::context::NodeScope;
use crate::value::ValueType;
use std::fmt::Debug;

/// Behaviour of a node: read inputs from the scope, write outputs back.
///
/// Implementations read required and optional inputs by field key and write
/// zero or more of the node's declared outputs. Anything not written stays
/// absent for downstream nodes.
pub trait Operation: Debug + Send + Sync {
    /// Run the operation against the node's scope
    fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError>;
}

/// Failure raised from inside an [`Operation`]
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// A value the operation needs is absent
    #[error("No value for field `{0}`")]
    MissingValue(String),

    /// A value has the wrong kind
    #[error("Field `{field}` expected {expected}, got {found}")]
    InvalidValue {
        /// Field key
        field: String,
        /// What the operation expected
        expected: &'static str,
        /// What it found
        found: ValueType,
    },

    /// The operation cannot run in this configuration
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),

    /// Any other failure
    #[error("{0}")]
    Custom(String),
}
