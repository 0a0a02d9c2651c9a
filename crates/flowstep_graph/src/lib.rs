// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow graph execution engine for `FlowStep`.
//!
//! Graphs of operation nodes joined by typed field links are evaluated one
//! node at a time, so a driver such as an interactive debugger can pause
//! between any two evaluations, including inside composite nodes.
//!
//! ## Architecture
//!
//! - [`dag`]: generic acyclic graph with cycle rejection and a deterministic
//!   topological order
//! - [`field`], [`value`]: field descriptors, values and type predicates
//! - [`context`]: hierarchical scopes holding field values during a run
//! - [`graph`]: operation nodes and links on top of the DAG
//! - [`capability`]: type-indexed optional behaviours for nodes and graphs
//! - [`processor`]: the stepwise interpreter
//! - [`publish`], [`composite`]: macro and for-each nodes built from inner
//!   graphs
//! - [`nodes`]: built-in math and logic nodes

pub mod capability;
pub mod composite;
pub mod context;
pub mod dag;
pub mod field;
pub mod graph;
pub mod link;
pub mod node;
pub mod nodes;
pub mod operation;
pub mod processor;
pub mod publish;
pub mod value;

pub use capability::{Capabilities, CompositeNode, CustomProcessing, PersistableSettings};
pub use context::{ExecutionContext, NodeScope, Scope, ScopePath};
pub use field::{Field, FieldDirection, FieldRef, Validator};
pub use graph::{GraphError, OperationGraph};
pub use link::{Link, LinkId};
pub use node::{NodeId, NodeRegistry, NodeType, OperationNode};
pub use operation::{Operation, OperationError};
pub use processor::{ExecutionError, Processor, ProcessorSettings, ProcessorState, StepEvent, StepKind};
pub use publish::{PublishMode, Publishable, PublishedField};
pub use value::{Value, ValueType};
