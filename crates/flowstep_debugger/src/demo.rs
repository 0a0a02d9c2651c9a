// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo graphs the debugger can load.

use flowstep_graph::composite::{for_each_node, macro_node};
use flowstep_graph::nodes::math::{add, constant, min, multiply, passthrough};
use flowstep_graph::{ExecutionContext, FieldRef, GraphError, NodeId, OperationGraph, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Available demo graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Demo {
    /// (1 + 2) * 10
    #[default]
    Arithmetic,
    /// min(4, 9) computed by a macro node
    Macro,
    /// Element-wise product of two lists by a for-each node
    #[value(name = "for_each")]
    ForEach,
}

impl Demo {
    /// Name used on the command line and in config files
    pub fn name(self) -> &'static str {
        match self {
            Self::Arithmetic => "arithmetic",
            Self::Macro => "macro",
            Self::ForEach => "for_each",
        }
    }

    /// Build the demo graph
    pub fn build(self) -> Result<DemoGraph, GraphError> {
        match self {
            Self::Arithmetic => arithmetic(),
            Self::Macro => macro_min(),
            Self::ForEach => for_each_product(),
        }
    }
}

impl fmt::Display for Demo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A demo graph with the field holding its answer
#[derive(Debug)]
pub struct DemoGraph {
    /// The graph
    pub graph: OperationGraph,
    /// Node holding the result
    pub result_node: NodeId,
    /// Field holding the result
    pub result_field: &'static str,
}

impl DemoGraph {
    /// Read the result from a finished run
    pub fn result<'c>(&self, context: &'c ExecutionContext) -> Option<&'c Value> {
        context
            .find_scope(self.result_node)
            .and_then(|scope| scope.get(self.result_field))
    }
}

fn arithmetic() -> Result<DemoGraph, GraphError> {
    let mut graph = OperationGraph::new("arithmetic");
    let one = graph.add_node(constant(Value::Float(1.0)))?;
    let two = graph.add_node(constant(Value::Float(2.0)))?;
    let sum = graph.add_node(add())?;
    let ten = graph.add_node(constant(Value::Float(10.0)))?;
    let product = graph.add_node(multiply())?;

    graph.connect(one, "value", sum, "a")?;
    graph.connect(two, "value", sum, "b")?;
    graph.connect(sum, "result", product, "a")?;
    graph.connect(ten, "value", product, "b")?;

    Ok(DemoGraph {
        graph,
        result_node: product,
        result_field: "result",
    })
}

fn macro_min() -> Result<DemoGraph, GraphError> {
    let mut inner = OperationGraph::new("min of two");
    let smaller = inner.add_node(min())?;
    let out = inner.add_node(passthrough())?;
    inner.connect(smaller, "result", out, "value")?;

    let mut node = macro_node("Min", inner);
    node.publish("x", FieldRef::input(smaller, "a"))?;
    node.publish("y", FieldRef::input(smaller, "b"))?;
    node.publish("result", FieldRef::output(out, "value"))?;

    let mut graph = OperationGraph::new("macro");
    let four = graph.add_node(constant(Value::Float(4.0)))?;
    let nine = graph.add_node(constant(Value::Float(9.0)))?;
    let wrapped = graph.add_node(node)?;
    let answer = graph.add_node(passthrough())?;
    graph.connect(four, "value", wrapped, "x")?;
    graph.connect(nine, "value", wrapped, "y")?;
    graph.connect(wrapped, "result", answer, "value")?;

    Ok(DemoGraph {
        graph,
        result_node: answer,
        result_field: "value",
    })
}

fn for_each_product() -> Result<DemoGraph, GraphError> {
    let mut inner = OperationGraph::new("product");
    let product = inner.add_node(multiply())?;

    let mut node = for_each_node("Products", inner);
    node.publish("a", FieldRef::input(product, "a"))?;
    node.publish("b", FieldRef::input(product, "b"))?;
    node.publish("result", FieldRef::output(product, "result"))?;

    let mut graph = OperationGraph::new("for_each");
    let left = graph.add_node(constant(Value::from(vec![1.0, 2.0, 3.0])))?;
    let right = graph.add_node(constant(Value::from(vec![4.0, 5.0, 6.0])))?;
    let each = graph.add_node(node)?;
    graph.connect(left, "value", each, "a")?;
    graph.connect(right, "value", each, "b")?;

    Ok(DemoGraph {
        graph,
        result_node: each,
        result_field: "result",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;
    use flowstep_graph::Processor;

    fn run(demo: Demo) -> Value {
        let demo_graph = demo.build().unwrap();
        let ctx = Processor::run(&demo_graph.graph, ExecutionContext::new()).unwrap();
        demo_graph.result(&ctx).cloned().unwrap()
    }

    #[test]
    fn test_demo_results() {
        assert_eq!(run(Demo::Arithmetic), Value::Float(30.0));
        assert_eq!(run(Demo::Macro), Value::Float(4.0));
        assert_eq!(run(Demo::ForEach), Value::from(vec![4.0, 10.0, 18.0]));
    }

    #[test]
    fn test_demo_names() {
        for demo in Demo::value_variants() {
            assert_eq!(Demo::from_str(demo.name(), false).unwrap(), *demo);
        }
        assert!(Demo::from_str("nope", false).is_err());
    }
}
