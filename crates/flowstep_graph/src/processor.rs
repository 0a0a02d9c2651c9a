// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stepwise graph execution.
//!
//! A [`Processor`] walks a graph in topological order one node per
//! [`step`](Processor::step). Composite nodes that carry both a
//! [`CompositeNode`] and a [`CustomProcessing`] capability are not evaluated
//! in place: stepping onto one pushes the node's own [`NodeIterator`] onto an
//! explicit stack, and the following steps walk its inner nodes until the
//! iterator is exhausted and popped again. A driver can therefore stop between
//! any two node evaluations, at any nesting depth.

use crate::capability::{CompositeNode, CustomProcessing};
use crate::context::{ExecutionContext, ScopePath};
use crate::field::ENABLED_FIELD;
use crate::graph::OperationGraph;
use crate::node::{NodeId, OperationNode};
use crate::operation::OperationError;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Sequence of nodes a frame of the processor stack walks.
///
/// This is the explicit form of a coroutine: the processor calls
/// [`initialize`](Self::initialize) when the frame is pushed,
/// [`next`](Self::next) once per step, and [`terminate`](Self::terminate) when
/// [`has_next`](Self::has_next) turns false and the frame is popped.
pub trait NodeIterator {
    /// Prepare the frame, e.g. copy published inputs into inner scopes
    fn initialize(&mut self, _context: &mut ExecutionContext) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// The node the next call to [`next`](Self::next) will return
    fn peek(&self) -> Option<NodeId>;

    /// Whether another node is pending
    fn has_next(&self) -> bool {
        self.peek().is_some()
    }

    /// Advance to the next node
    fn next(&mut self, context: &mut ExecutionContext) -> Result<Option<NodeId>, ExecutionError>;

    /// Finish the frame, e.g. copy inner results out to published outputs
    fn terminate(&mut self, _context: &mut ExecutionContext) -> Result<(), ExecutionError> {
        Ok(())
    }
}

/// Iterates a graph's nodes once in topological order
#[derive(Debug, Clone)]
pub struct TopologicalIterator {
    order: Vec<NodeId>,
    cursor: usize,
}

impl TopologicalIterator {
    /// Snapshot the current topological order of `graph`
    pub fn new(graph: &OperationGraph) -> Self {
        Self {
            order: graph.topological_order(),
            cursor: 0,
        }
    }

    /// Start over from the first node
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// The full order
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }
}

impl NodeIterator for TopologicalIterator {
    fn peek(&self) -> Option<NodeId> {
        self.order.get(self.cursor).copied()
    }

    fn next(&mut self, _context: &mut ExecutionContext) -> Result<Option<NodeId>, ExecutionError> {
        let next = self.peek();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }
}

/// Processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Maximum number of nested frames, root included
    pub max_depth: usize,
    /// Validate input values against field predicates before each node runs
    pub check_input_types: bool,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            max_depth: 32,
            check_input_types: true,
        }
    }
}

impl ProcessorSettings {
    /// Parse settings from RON; missing fields keep their defaults
    pub fn from_ron(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    /// Serialize settings to pretty RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorState {
    /// Constructed, not reset yet
    Idle,
    /// Nodes are pending
    Running,
    /// Stopped by the first error
    Halted,
    /// Every node was visited
    Complete,
}

/// What a step did with its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// The node's operation ran
    Executed,
    /// The node was disabled
    Skipped,
    /// The node's own iterator was pushed
    Entered,
    /// The node raised the halting error
    Failed,
}

/// Report of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Node that was stepped
    pub node: NodeId,
    /// Its display name
    pub name: String,
    /// Path of the node's own scope
    pub scope: ScopePath,
    /// Stack depth the node was taken from (1 = root graph)
    pub depth: usize,
    /// Outcome
    pub kind: StepKind,
}

/// Snapshot of one stack frame, for inspection by a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Composite node that pushed the frame, `None` for the root
    pub owner: Option<NodeId>,
    /// Name of the graph the frame walks
    pub graph: String,
    /// Path of the scope holding the frame's node scopes
    pub scope: ScopePath,
    /// Next node the frame will yield
    pub next: Option<NodeId>,
}

struct Frame<'g> {
    graph: &'g OperationGraph,
    path: ScopePath,
    owner: Option<NodeId>,
    iter: Box<dyn NodeIterator + 'g>,
}

/// Error that halts a run
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// An iterator yielded a node its graph does not contain
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A required input has no value and no link
    #[error("Field `{field}` on node `{name}` needs a value")]
    RequiredInputMissing {
        /// Node
        node: NodeId,
        /// Node name
        name: String,
        /// Field key
        field: String,
    },

    /// An input value is rejected by its field
    #[error("Field `{field}` on node `{name}` expected {expected}, got {found}")]
    InvalidInput {
        /// Node
        node: NodeId,
        /// Node name
        name: String,
        /// Field key
        field: String,
        /// What the field accepts
        expected: String,
        /// Type of the rejected value
        found: ValueType,
    },

    /// The node's operation failed
    #[error("Node `{name}` failed: {source}")]
    NodeFailed {
        /// Node
        node: NodeId,
        /// Node name
        name: String,
        /// Original failure
        source: OperationError,
    },

    /// Composite nesting is deeper than the configured limit
    #[error("Stepping into node {node} exceeds the depth limit of {limit}")]
    DepthExceeded {
        /// Composite node
        node: NodeId,
        /// Configured limit
        limit: usize,
    },

    /// A composite node lacks a capability its processing relies on
    #[error("Node {node} has no {capability} capability")]
    MissingCapability {
        /// Node
        node: NodeId,
        /// Capability type name
        capability: &'static str,
    },
}

impl ExecutionError {
    /// Node the error is attributed to, if any
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::NodeNotFound(node)
            | Self::RequiredInputMissing { node, .. }
            | Self::InvalidInput { node, .. }
            | Self::NodeFailed { node, .. }
            | Self::DepthExceeded { node, .. }
            | Self::MissingCapability { node, .. } => Some(*node),
        }
    }
}

/// Stepwise interpreter over one graph and one execution context
pub struct Processor<'g> {
    graph: &'g OperationGraph,
    settings: ProcessorSettings,
    context: ExecutionContext,
    stack: Vec<Frame<'g>>,
    state: ProcessorState,
    error: Option<ExecutionError>,
}

impl<'g> Processor<'g> {
    /// Create an idle processor with default settings
    pub fn new(graph: &'g OperationGraph) -> Self {
        Self::with_settings(graph, ProcessorSettings::default())
    }

    /// Create an idle processor
    pub fn with_settings(graph: &'g OperationGraph, settings: ProcessorSettings) -> Self {
        Self {
            graph,
            settings,
            context: ExecutionContext::new(),
            stack: Vec::new(),
            state: ProcessorState::Idle,
            error: None,
        }
    }

    /// Run a graph to completion and hand back the context
    pub fn run(
        graph: &'g OperationGraph,
        context: ExecutionContext,
    ) -> Result<ExecutionContext, ExecutionError> {
        let mut processor = Self::new(graph);
        processor.reset(context);
        processor.step_all();
        processor.into_result()
    }

    /// Start a fresh run with `context`.
    ///
    /// Recomputes the topological order and discards any previous error and
    /// stack.
    pub fn reset(&mut self, context: ExecutionContext) {
        self.context = context;
        self.stack.clear();
        self.error = None;
        self.state = ProcessorState::Running;

        tracing::info!(
            "Reset run of graph {} ({} nodes)",
            self.graph.name,
            self.graph.node_count()
        );

        let mut root = TopologicalIterator::new(self.graph);
        if let Err(err) = root.initialize(&mut self.context) {
            self.halt(err);
            return;
        }
        self.stack.push(Frame {
            graph: self.graph,
            path: ScopePath::root(),
            owner: None,
            iter: Box::new(root),
        });
        if let Err(err) = self.unwind() {
            self.halt(err);
        }
    }

    /// Whether a node is pending
    pub fn has_next(&self) -> bool {
        self.state == ProcessorState::Running
            && self.stack.last().is_some_and(|frame| frame.iter.has_next())
    }

    /// The node the next step will take
    pub fn peek(&self) -> Option<NodeId> {
        if self.state != ProcessorState::Running {
            return None;
        }
        self.stack.last().and_then(|frame| frame.iter.peek())
    }

    /// Evaluate the next node.
    ///
    /// Returns `None` when nothing was pending. When the step raises an error
    /// the run halts and the event is reported as [`StepKind::Failed`]; the
    /// error itself is available from [`error`](Self::error).
    pub fn step(&mut self) -> Option<StepEvent> {
        if !self.has_next() {
            return None;
        }
        let depth = self.stack.len();
        let frame = self.stack.last_mut()?;
        let graph = frame.graph;
        let path = frame.path.clone();

        let node_id = match frame.iter.next(&mut self.context) {
            Ok(Some(node_id)) => node_id,
            Ok(None) => {
                if let Err(err) = self.unwind() {
                    self.halt(err);
                }
                return None;
            }
            Err(err) => {
                self.halt(err);
                return None;
            }
        };
        let Some(node) = graph.node(node_id) else {
            self.halt(ExecutionError::NodeNotFound(node_id));
            return None;
        };

        let kind = match self.evaluate(graph, &path, node) {
            Ok(kind) => match self.unwind() {
                Ok(()) => kind,
                Err(err) => {
                    self.halt(err);
                    kind
                }
            },
            Err(err) => {
                self.halt(err);
                StepKind::Failed
            }
        };

        Some(StepEvent {
            node: node_id,
            name: node.name.clone(),
            scope: path.child(node_id),
            depth,
            kind,
        })
    }

    /// Same as [`step`](Self::step): composite nodes are entered
    pub fn step_into(&mut self) -> Option<StepEvent> {
        self.step()
    }

    /// Step, running a composite node through to its exit
    pub fn step_over(&mut self) -> Option<StepEvent> {
        let depth = self.depth();
        let event = self.step()?;
        while self.depth() > depth && self.has_next() {
            self.step();
        }
        Some(event)
    }

    /// Run until the current frame is popped; at the root, run to the end.
    ///
    /// Returns the number of steps taken.
    pub fn step_out(&mut self) -> usize {
        let depth = self.depth();
        let mut steps = 0;
        while self.depth() >= depth && self.has_next() {
            self.step();
            steps += 1;
        }
        steps
    }

    /// Step until nothing is pending or the run halts.
    ///
    /// Returns the number of steps taken.
    pub fn step_all(&mut self) -> usize {
        let mut steps = 0;
        while self.has_next() {
            self.step();
            steps += 1;
        }
        steps
    }

    /// The halting error, if the run stopped on one
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    /// Current state
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// The context of the current run
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// The context of the current run, for a driver editing values while paused
    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    /// The graph being run
    pub fn graph(&self) -> &'g OperationGraph {
        self.graph
    }

    /// Settings in use
    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Number of frames on the stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The stack, outermost frame first
    pub fn frames(&self) -> Vec<FrameInfo> {
        self.stack
            .iter()
            .map(|frame| FrameInfo {
                owner: frame.owner,
                graph: frame.graph.name.clone(),
                scope: frame.path.clone(),
                next: frame.iter.peek(),
            })
            .collect()
    }

    /// Give up the context
    pub fn into_context(self) -> ExecutionContext {
        self.context
    }

    /// The context, or the halting error
    pub fn into_result(self) -> Result<ExecutionContext, ExecutionError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.context),
        }
    }

    fn evaluate(
        &mut self,
        graph: &'g OperationGraph,
        path: &ScopePath,
        node: &'g OperationNode,
    ) -> Result<StepKind, ExecutionError> {
        let node_id = node.id();
        let scope_path = path.child(node_id);
        self.apply_defaults(node, &scope_path);

        if !is_enabled(self.context.lookup(&scope_path, ENABLED_FIELD)) {
            tracing::debug!("Skipping disabled node {} ({})", node.name, node_id);
            return Ok(StepKind::Skipped);
        }
        self.check_inputs(graph, node, &scope_path)?;

        if let (Some(composite), Some(custom)) = (
            node.capability::<CompositeNode>(),
            node.capability::<CustomProcessing>(),
        ) {
            if self.stack.len() >= self.settings.max_depth {
                return Err(ExecutionError::DepthExceeded {
                    node: node_id,
                    limit: self.settings.max_depth,
                });
            }
            let inner = composite.graph();
            let mut iter = custom.node_iterator(node, inner, scope_path.clone())?;
            iter.initialize(&mut self.context)?;
            tracing::debug!(
                "Stepping into {} ({} inner nodes, depth {})",
                node.name,
                inner.node_count(),
                self.stack.len() + 1
            );
            self.stack.push(Frame {
                graph: inner,
                path: scope_path,
                owner: Some(node_id),
                iter,
            });
            return Ok(StepKind::Entered);
        }

        let mut scope = self.context.node_scope(&scope_path);
        node.operate(&mut scope)
            .map_err(|source| ExecutionError::NodeFailed {
                node: node_id,
                name: node.name.clone(),
                source,
            })?;
        tracing::trace!("Executed {} ({})", node.name, node_id);
        propagate(graph, path, node_id, &mut self.context);
        Ok(StepKind::Executed)
    }

    fn apply_defaults(&mut self, node: &OperationNode, scope_path: &ScopePath) {
        let missing: Vec<(String, Value)> = node
            .inputs()
            .filter(|field| self.context.lookup(scope_path, &field.key).is_none())
            .filter_map(|field| Some((field.key.clone(), field.default_value.clone()?)))
            .collect();
        if missing.is_empty() {
            return;
        }
        let scope = self.context.scope_at(scope_path);
        for (key, value) in missing {
            scope.put(key, value);
        }
    }

    fn check_inputs(
        &self,
        graph: &OperationGraph,
        node: &OperationNode,
        scope_path: &ScopePath,
    ) -> Result<(), ExecutionError> {
        for field in node.inputs() {
            match self.context.lookup(scope_path, &field.key) {
                None if !field.optional && !graph.is_linked(node.id(), &field.key) => {
                    return Err(ExecutionError::RequiredInputMissing {
                        node: node.id(),
                        name: node.name.clone(),
                        field: field.key.clone(),
                    });
                }
                Some(value)
                    if self.settings.check_input_types && !field.validator.accepts(value) =>
                {
                    return Err(ExecutionError::InvalidInput {
                        node: node.id(),
                        name: node.name.clone(),
                        field: field.key.clone(),
                        expected: field.validator.to_string(),
                        found: value.value_type(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Pop every exhausted frame, finishing each one
    fn unwind(&mut self) -> Result<(), ExecutionError> {
        while let Some(frame) = self.stack.last() {
            if frame.iter.has_next() {
                return Ok(());
            }
            let Some(mut frame) = self.stack.pop() else {
                break;
            };
            frame.iter.terminate(&mut self.context)?;

            if let (Some(owner), Some(parent)) = (frame.owner, self.stack.last()) {
                tracing::debug!("Stepping out of {} (depth {})", owner, self.stack.len());
                propagate(parent.graph, &parent.path, owner, &mut self.context);
            }
        }

        self.state = ProcessorState::Complete;
        tracing::info!("Run of graph {} complete", self.graph.name);
        Ok(())
    }

    fn halt(&mut self, err: ExecutionError) {
        tracing::warn!("Run of graph {} halted: {}", self.graph.name, err);
        if self.error.is_none() {
            self.error = Some(err);
        }
        self.state = ProcessorState::Halted;
    }
}

fn is_enabled(value: Option<&Value>) -> bool {
    !matches!(value, Some(Value::Bool(false)))
}

/// Copy the written outputs of `node` into the scopes of its link targets
fn propagate(
    graph: &OperationGraph,
    path: &ScopePath,
    node: NodeId,
    context: &mut ExecutionContext,
) {
    let source = path.child(node);
    for link in graph.outgoing_links(node) {
        let value = context
            .find_scope_at(&source)
            .and_then(|scope| scope.get(&link.from_field))
            .cloned();
        if let Some(value) = value {
            tracing::trace!("{}.{} -> {}.{} = {}", node, link.from_field, link.to_node, link.to_field, value);
            context
                .scope_at(&path.child(link.to_node))
                .put(link.to_field.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeScope;
    use crate::field::{Field, Validator};
    use crate::nodes::math::{add, constant, divide, multiply};
    use crate::operation::Operation;

    /// Records whether its optional input was present
    #[derive(Debug)]
    struct Probe;

    impl Operation for Probe {
        fn operate(&self, scope: &mut NodeScope<'_>) -> Result<(), OperationError> {
            let seen = scope.contains("x");
            scope.put("seen", seen);
            Ok(())
        }
    }

    fn probe() -> OperationNode {
        OperationNode::new("probe", "Probe", Probe)
            .with_field(Field::input("x", Validator::Any).optional())
            .with_field(Field::output("seen", ValueType::Bool))
    }

    /// (1 + 2) * 10
    fn arithmetic() -> (OperationGraph, [NodeId; 5]) {
        let mut graph = OperationGraph::new("arithmetic");
        let one = graph.add_node(constant(Value::Float(1.0))).unwrap();
        let two = graph.add_node(constant(Value::Float(2.0))).unwrap();
        let sum = graph.add_node(add()).unwrap();
        let ten = graph.add_node(constant(Value::Float(10.0))).unwrap();
        let product = graph.add_node(multiply()).unwrap();
        graph.connect(one, "value", sum, "a").unwrap();
        graph.connect(two, "value", sum, "b").unwrap();
        graph.connect(sum, "result", product, "a").unwrap();
        graph.connect(ten, "value", product, "b").unwrap();
        (graph, [one, two, sum, ten, product])
    }

    fn output(ctx: &ExecutionContext, node: NodeId, key: &str) -> Option<Value> {
        ctx.find_scope(node).and_then(|s| s.get(key)).cloned()
    }

    #[test]
    fn test_end_to_end_arithmetic() {
        let (graph, [.., product]) = arithmetic();
        let mut processor = Processor::new(&graph);
        assert_eq!(processor.state(), ProcessorState::Idle);
        assert!(!processor.has_next());

        processor.reset(ExecutionContext::new());
        assert_eq!(processor.step_all(), 5);
        assert!(processor.error().is_none());
        assert_eq!(processor.state(), ProcessorState::Complete);
        assert_eq!(output(processor.context(), product, "result"), Some(Value::Float(30.0)));
    }

    #[test]
    fn test_stepping_matches_running() {
        let (graph, ids) = arithmetic();
        let mut processor = Processor::new(&graph);
        processor.reset(ExecutionContext::new());

        let mut visited = Vec::new();
        while processor.has_next() {
            let next = processor.peek().unwrap();
            let event = processor.step().unwrap();
            assert_eq!(event.node, next);
            assert_eq!(event.kind, StepKind::Executed);
            assert_eq!(event.depth, 1);
            visited.push(event.node);
        }
        assert_eq!(visited, graph.topological_order());
        assert_eq!(visited.len(), ids.len());
        assert!(processor.step().is_none());

        let stepped = processor.into_context();
        let ran = Processor::run(&graph, ExecutionContext::new()).unwrap();
        assert_eq!(stepped, ran);
    }

    #[test]
    fn test_required_input_halts() {
        let mut graph = OperationGraph::new("missing");
        let sum = graph.add_node(add()).unwrap();
        let one = graph.add_node(constant(Value::Float(1.0))).unwrap();
        graph.connect(one, "value", sum, "a").unwrap();

        let mut processor = Processor::new(&graph);
        processor.reset(ExecutionContext::new());
        processor.step_all();

        match processor.error() {
            Some(ExecutionError::RequiredInputMissing { node, field, .. }) => {
                assert_eq!(*node, sum);
                assert_eq!(field, "b");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(processor.state(), ProcessorState::Halted);
        assert!(!processor.has_next());
        assert!(processor.step().is_none());
    }

    #[test]
    fn test_context_value_satisfies_required_input() {
        let mut graph = OperationGraph::new("prefilled");
        let sum = graph.add_node(add()).unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.scope(sum).put("a", 4.0);
        ctx.global_scope_mut().put("b", 5.0);
        let ctx = Processor::run(&graph, ctx).unwrap();
        assert_eq!(output(&ctx, sum, "result"), Some(Value::Float(9.0)));
    }

    #[test]
    fn test_field_default_fills_gap() {
        let mut graph = OperationGraph::new("defaults");
        let node = add().with_field(
            Field::input("b", Validator::of(ValueType::Float)).with_default(Value::Float(0.5)),
        );
        let sum = graph.add_node(node).unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.scope(sum).put("a", 1.0);
        let ctx = Processor::run(&graph, ctx).unwrap();
        assert_eq!(output(&ctx, sum, "result"), Some(Value::Float(1.5)));
    }

    #[test]
    fn test_disabled_node_outputs_are_absent() {
        let mut graph = OperationGraph::new("disabled");
        let source = graph.add_node(constant(Value::Float(3.0))).unwrap();
        let seen = graph.add_node(probe()).unwrap();
        graph.connect(source, "value", seen, "x").unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.scope(source).put(ENABLED_FIELD, false);

        let mut processor = Processor::new(&graph);
        processor.reset(ctx);
        assert_eq!(processor.step().unwrap().kind, StepKind::Skipped);
        assert_eq!(processor.step().unwrap().kind, StepKind::Executed);
        assert!(processor.error().is_none());

        let ctx = processor.into_context();
        assert_eq!(output(&ctx, source, "value"), None);
        assert_eq!(output(&ctx, seen, "x"), None);
        assert_eq!(output(&ctx, seen, "seen"), Some(Value::Bool(false)));
    }

    #[test]
    fn test_downstream_of_disabled_sees_absence() {
        let (graph, [one, .., product]) = arithmetic();
        let mut ctx = ExecutionContext::new();
        ctx.scope(one).put(ENABLED_FIELD, false);

        let err = Processor::run(&graph, ctx).unwrap_err();
        // The add node is linked, so it runs and finds no value rather than zero
        match err {
            ExecutionError::NodeFailed { source: OperationError::MissingValue(field), .. } => {
                assert_eq!(field, "a");
            }
            other => panic!("unexpected: {other}"),
        }

        let mut processor = Processor::new(&graph);
        let mut ctx = ExecutionContext::new();
        ctx.scope(product).put(ENABLED_FIELD, false);
        processor.reset(ctx);
        processor.step_all();
        assert!(processor.error().is_none());
        assert_eq!(output(processor.context(), product, "result"), None);
    }

    #[test]
    fn test_node_failure_is_wrapped_and_first_error_wins() {
        let mut graph = OperationGraph::new("divide");
        let zero = graph.add_node(constant(Value::Float(0.0))).unwrap();
        let quotient = graph.add_node(divide()).unwrap();
        let later = graph.add_node(add()).unwrap();
        graph.connect(zero, "value", quotient, "b").unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.scope(quotient).put("a", 1.0);

        let mut processor = Processor::new(&graph);
        processor.reset(ctx);
        assert_eq!(processor.step().unwrap().kind, StepKind::Executed);
        let failed = processor.step().unwrap();
        assert_eq!(failed.kind, StepKind::Failed);
        assert_eq!(failed.node, quotient);

        let err = processor.error().unwrap();
        assert_eq!(err.node(), Some(quotient));
        assert!(std::error::Error::source(err).is_some());
        assert!(err.to_string().contains("Divide"));

        // Stepping is disabled after the halt; `later` never runs
        assert_eq!(processor.step_all(), 0);
        assert!(processor.context().find_scope(later).is_none());
        // Partial results written before the failure stay readable
        assert_eq!(output(processor.context(), zero, "value"), Some(Value::Float(0.0)));
    }

    #[test]
    fn test_invalid_input_value_halts() {
        let mut graph = OperationGraph::new("invalid");
        let sum = graph.add_node(add()).unwrap();
        let mut ctx = ExecutionContext::new();
        ctx.scope(sum).put("a", "text");
        ctx.scope(sum).put("b", 1.0);

        let err = Processor::run(&graph, ctx.clone()).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidInput { ref field, .. } if field == "a"));

        // With checks off the operation reports the problem itself
        let mut processor = Processor::with_settings(
            &graph,
            ProcessorSettings {
                check_input_types: false,
                ..ProcessorSettings::default()
            },
        );
        processor.reset(ctx);
        processor.step_all();
        assert!(matches!(
            processor.error(),
            Some(ExecutionError::NodeFailed { source: OperationError::InvalidValue { .. }, .. })
        ));
    }

    #[test]
    fn test_reset_discards_error() {
        let mut graph = OperationGraph::new("retry");
        let sum = graph.add_node(add()).unwrap();

        let mut processor = Processor::new(&graph);
        processor.reset(ExecutionContext::new());
        processor.step_all();
        assert!(processor.error().is_some());

        let mut ctx = ExecutionContext::new();
        ctx.scope(sum).put("a", 1.0);
        ctx.scope(sum).put("b", 1.0);
        processor.reset(ctx);
        assert!(processor.error().is_none());
        processor.step_all();
        assert_eq!(processor.state(), ProcessorState::Complete);
        assert_eq!(output(processor.context(), sum, "result"), Some(Value::Float(2.0)));
    }

    #[test]
    fn test_empty_graph_completes_immediately() {
        let graph = OperationGraph::new("empty");
        let mut processor = Processor::new(&graph);
        processor.reset(ExecutionContext::new());
        assert_eq!(processor.state(), ProcessorState::Complete);
        assert!(!processor.has_next());
        assert_eq!(processor.step_out(), 0);
    }

    #[test]
    fn test_settings_from_ron() {
        let settings = ProcessorSettings::from_ron("(max_depth: 4)").unwrap();
        assert_eq!(settings.max_depth, 4);
        assert!(settings.check_input_types);

        let text = settings.to_ron().unwrap();
        assert_eq!(ProcessorSettings::from_ron(&text).unwrap(), settings);
    }
}
