// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debugger commands and the session they drive.

use crate::config::DebuggerConfig;
use flowstep_graph::{
    CompositeNode, ExecutionContext, ExecutionError, NodeId, OperationGraph, OperationNode,
    Processor, ProcessorState, Scope, StepEvent, StepKind, Value,
};
use indexmap::IndexMap;
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// A debugger command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Evaluate one node, entering composite nodes
    Step,
    /// Evaluate one node, running composite nodes to their exit
    Over,
    /// Run until the current composite node is left
    Out,
    /// Run to the end
    Run,
    /// Show the next node
    Peek,
    /// Show the frame stack
    Stack,
    /// Show the context by node name
    Context,
    /// Print the context as JSON
    Dump,
    /// Start over
    Reset,
    /// List commands
    Help,
    /// Leave the debugger
    Quit,
}

/// Error parsing or executing a command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Input was blank
    #[error("Empty command")]
    Empty,

    /// Input named no known command
    #[error("Unknown command `{0}`, type `help` for a list")]
    Unknown(String),

    /// The context could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Output could not be rendered
    #[error("Format error: {0}")]
    Format(#[from] fmt::Error),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.split_whitespace().next().ok_or(CommandError::Empty)?;
        Ok(match word {
            "s" | "step" | "i" | "into" => Self::Step,
            "n" | "o" | "over" => Self::Over,
            "out" | "finish" => Self::Out,
            "r" | "run" | "c" | "continue" => Self::Run,
            "p" | "peek" => Self::Peek,
            "bt" | "stack" => Self::Stack,
            "ctx" | "context" => Self::Context,
            "dump" => Self::Dump,
            "reset" => Self::Reset,
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        })
    }
}

const HELP: &str = "\
step (s, into)   evaluate the next node, entering composite nodes
over (n)         evaluate the next node, running composite nodes through
out              run until the current composite node is left
run (r)          run to the end
peek (p)         show the next node
stack (bt)       show the frame stack
context (ctx)    show field values by node
dump             print the context as JSON
reset            start over
quit (q)         leave";

/// One debugging session over one graph
pub struct Session<'g> {
    processor: Processor<'g>,
    globals: IndexMap<String, Value>,
    trace_steps: bool,
}

impl<'g> Session<'g> {
    /// Create a session and reset it
    pub fn new(graph: &'g OperationGraph, config: &DebuggerConfig) -> Self {
        let mut session = Self {
            processor: Processor::with_settings(graph, config.processor.clone()),
            globals: config.globals.clone(),
            trace_steps: config.trace_steps,
        };
        session.reset();
        session
    }

    /// Start a fresh run with the configured globals
    pub fn reset(&mut self) {
        let mut context = ExecutionContext::new();
        for (key, value) in &self.globals {
            context.global_scope_mut().put(key.clone(), value.clone());
        }
        self.processor.reset(context);
    }

    /// The underlying processor
    pub fn processor(&self) -> &Processor<'g> {
        &self.processor
    }

    /// Execute a command and render its output
    pub fn execute(&mut self, command: Command) -> Result<String, CommandError> {
        let graph = self.processor.graph();
        let mut out = String::new();
        match command {
            Command::Step => report(self.processor.step_into(), &mut out)?,
            Command::Over => report(self.processor.step_over(), &mut out)?,
            Command::Out => {
                let steps = self.processor.step_out();
                writeln!(out, "{steps} steps")?;
            }
            Command::Run => {
                let mut steps = 0;
                while self.processor.has_next() {
                    let event = self.processor.step();
                    if let Some(event) = event.filter(|_| self.trace_steps) {
                        writeln!(out, "{}", describe_event(&event))?;
                    }
                    steps += 1;
                }
                writeln!(out, "{steps} steps")?;
            }
            Command::Peek => match self.processor.peek() {
                Some(next) => writeln!(out, "next: {}", node_label(graph, next))?,
                None => out.push_str("nothing pending\n"),
            },
            Command::Stack => {
                for (depth, frame) in self.processor.frames().iter().enumerate() {
                    let owner = frame
                        .owner
                        .map_or_else(|| "<root>".to_string(), |id| node_label(graph, id));
                    let next = frame
                        .next
                        .map_or_else(|| "-".to_string(), |id| node_label(graph, id));
                    writeln!(out, "#{depth} {owner} in {} next: {next}", frame.graph)?;
                }
            }
            Command::Context => {
                let context = self.processor.context();
                write_scope(&mut out, "<global>", context.global_scope(), None, 0)?;
                render_scopes(&mut out, graph, context, 0)?;
            }
            Command::Dump => {
                out = serde_json::to_string_pretty(self.processor.context())?;
                out.push('\n');
            }
            Command::Reset => {
                self.reset();
                out.push_str("reset\n");
            }
            Command::Help => {
                out.push_str(HELP);
                out.push('\n');
            }
            Command::Quit => {}
        }
        write_status(&mut out, self.processor.state(), self.processor.error())?;
        Ok(out)
    }
}

fn report(event: Option<StepEvent>, out: &mut String) -> fmt::Result {
    match event {
        Some(event) => writeln!(out, "{}", describe_event(&event)),
        None => out.write_str("nothing pending\n"),
    }
}

fn describe_event(event: &StepEvent) -> String {
    let kind = match event.kind {
        StepKind::Executed => "executed",
        StepKind::Skipped => "skipped",
        StepKind::Entered => "entered",
        StepKind::Failed => "failed",
    };
    format!("[{}] {kind:<8} {}", event.depth, event.name)
}

fn write_status(out: &mut String, state: ProcessorState, error: Option<&ExecutionError>) -> fmt::Result {
    match (state, error) {
        (ProcessorState::Halted, Some(err)) => writeln!(out, "halted: {err}"),
        (ProcessorState::Complete, _) => out.write_str("complete\n"),
        _ => Ok(()),
    }
}

/// Find a node anywhere in a graph, including inside composite nodes
fn find_node(graph: &OperationGraph, id: NodeId) -> Option<&OperationNode> {
    graph.node(id).or_else(|| {
        graph
            .nodes()
            .filter_map(|node| node.capability::<CompositeNode>())
            .find_map(|composite| find_node(composite.graph(), id))
    })
}

fn node_label(graph: &OperationGraph, id: NodeId) -> String {
    find_node(graph, id).map_or_else(|| id.to_string(), |node| node.name.clone())
}

fn render_scopes(
    out: &mut String,
    graph: &OperationGraph,
    context: &ExecutionContext,
    indent: usize,
) -> fmt::Result {
    for node in graph.nodes() {
        if let Some(scope) = context.find_scope(node.id()) {
            render_node(out, node, scope, indent)?;
        }
    }
    Ok(())
}

fn render_node(out: &mut String, node: &OperationNode, scope: &Scope, indent: usize) -> fmt::Result {
    write_scope(out, &node.name, scope, Some(node.node_type()), indent)?;
    if let Some(composite) = node.capability::<CompositeNode>() {
        for inner in composite.graph().nodes() {
            if let Some(child) = scope.find_scope(inner.id()) {
                render_node(out, inner, child, indent + 1)?;
            }
        }
    }
    Ok(())
}

fn write_scope(
    out: &mut String,
    label: &str,
    scope: &Scope,
    node_type: Option<&str>,
    indent: usize,
) -> fmt::Result {
    let pad = "  ".repeat(indent);
    match node_type {
        Some(node_type) => writeln!(out, "{pad}{label} ({node_type})")?,
        None => writeln!(out, "{pad}{label}")?,
    }
    for (key, value) in scope.values() {
        writeln!(out, "{pad}  {key} = {value}")?;
    }
    Ok(())
}
