mod common;

use common::Half;
use easywork::graphs::{AssemblyError, ExecutionGraph, ValidationIssue};
use easywork::node::Node;
use easywork::nodes::{Counter, Multiply, Record, ToText};
use easywork::typesys::ConverterRegistry;
use std::sync::Arc;

fn linear_pipeline() -> (ExecutionGraph, Vec<Arc<Node>>) {
    let counter = Node::create(Counter::new(0, 3, 1));
    let gain = Node::create(Multiply::new(10));
    let text = Node::create(ToText);
    let sink = Node::create(Record::new());
    gain.add_upstream(&counter, "forward");
    text.add_upstream(&gain, "forward");
    sink.add_upstream(&text, "forward");

    let nodes = vec![counter, gain, text, sink];
    let mut graph = ExecutionGraph::new();
    for node in &nodes {
        graph.add_node(node);
    }
    (graph, nodes)
}

#[test]
fn connect_requires_build_first() {
    let (mut graph, _nodes) = linear_pipeline();
    assert!(matches!(
        graph.connect(),
        Err(AssemblyError::ConnectBeforeBuild)
    ));
    graph.build();
    graph.connect().unwrap();
}

#[test]
fn plan_orders_levels_by_precedence() {
    let (mut graph, _nodes) = linear_pipeline();
    graph.assemble().unwrap();
    let levels = graph.plan().unwrap().levels();
    assert_eq!(levels, &[vec![0], vec![1], vec![2], vec![3]]);
}

#[test]
fn reassembly_yields_an_equivalent_topology() {
    let (mut graph, _nodes) = linear_pipeline();
    graph.assemble().unwrap();
    let first = graph.plan().unwrap().clone();

    graph.reset();
    assert!(graph.plan().is_none());
    graph.build();
    graph.connect().unwrap();
    let second = graph.plan().unwrap().clone();

    assert_eq!(first, second);
}

#[test]
fn stop_flag_rearms_on_reset() {
    let (mut graph, _nodes) = linear_pipeline();
    graph.assemble().unwrap();
    graph.request_stop();
    assert!(!graph.keep_running());
    graph.reset();
    assert!(graph.keep_running());
}

#[test]
fn foreign_upstream_without_a_task_fails_connect() {
    let outside = Node::create(Counter::new(0, 1, 1));
    let gain = Node::create(Multiply::new(2));
    gain.add_upstream(&outside, "forward");

    let mut graph = ExecutionGraph::new();
    graph.add_node(&gain);
    graph.build();
    match graph.connect() {
        Err(AssemblyError::UpstreamNotBuilt { node, upstream }) => {
            assert_eq!(node, "Multiply");
            assert_eq!(upstream, "Counter");
        }
        other => panic!("expected UpstreamNotBuilt, got {other:?}"),
    }
}

#[test]
fn validation_accepts_matching_connections() {
    let (graph, _nodes) = linear_pipeline();
    graph.validate().unwrap();
}

#[test]
fn validation_tracks_the_converter_registry() {
    // Counter produces i64; Half declares f64. With the built-in numeric
    // widening registered the connection validates and the call sees the
    // exact double value; with the converter removed, validation fails
    // naming the port.
    let counter = Node::create(Counter::new(0, 2, 1));
    let half = Node::create(Half);
    half.add_upstream(&counter, "forward");

    let mut graph = ExecutionGraph::new();
    graph.add_node(&counter).add_node(&half);
    graph.validate().unwrap();

    // The running engine performs the coercion end to end.
    counter.open(&[]).unwrap();
    half.open(&[]).unwrap();
    counter.dispatch();
    half.dispatch();
    assert_eq!(half.output().cast::<f64>().unwrap(), 0.0);
    counter.dispatch();
    half.dispatch();
    assert_eq!(half.output().cast::<f64>().unwrap(), 0.5);

    let registry = ConverterRegistry::global();
    assert!(registry.unregister::<i64, f64>());
    let err = graph.validate().unwrap_err();
    assert_eq!(err.issues.len(), 1);
    match &err.issues[0] {
        ValidationIssue::TypeMismatch {
            node,
            port,
            expected,
            actual,
            ..
        } => {
            assert_eq!(node, "Half");
            assert_eq!(*port, 0);
            assert_eq!(expected, "f64");
            assert_eq!(actual, "i64");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }

    // Restore the built-in widening for the rest of the suite.
    registry.register(|v: &i64| *v as f64);
    graph.validate().unwrap();
}
