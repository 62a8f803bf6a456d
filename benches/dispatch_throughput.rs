//! Benchmarks for the dispatch hot path and graph assembly.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use easywork::graphs::ExecutionGraph;
use easywork::node::Node;
use easywork::nodes::{Multiply, ToText};
use easywork::typesys::Packet;
use std::sync::Arc;

/// Build a linear chain: stub source -> N Multiply stages.
fn build_chain(length: usize) -> (Vec<Arc<Node>>, Arc<Node>) {
    let source = Node::create(Multiply::new(1));
    let mut nodes = vec![Arc::clone(&source)];
    let mut tail = source;
    for _ in 0..length {
        let stage = Node::create(Multiply::new(1));
        stage.add_upstream(&tail, "forward");
        nodes.push(Arc::clone(&stage));
        tail = stage;
    }
    (nodes, tail)
}

fn bench_dispatch_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_pass");

    for length in [1usize, 8, 32] {
        let (nodes, _tail) = build_chain(length);
        for node in &nodes {
            node.open(&[]).unwrap();
        }
        // Prime the head so every stage has data flowing.
        nodes[0].set_output(Packet::from(1_i64, 1));

        group.bench_with_input(BenchmarkId::new("chain", length), &nodes, |b, nodes| {
            b.iter(|| {
                for node in nodes.iter().skip(1) {
                    node.dispatch();
                }
            });
        });
    }

    group.finish();
}

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke");

    let gain = Node::create(Multiply::new(3));
    group.bench_function("exact_types", |b| {
        b.iter(|| gain.invoke("forward", &[Packet::carrying(7_i64)]).unwrap());
    });

    let text = Node::create(ToText);
    group.bench_function("coerced_argument", |b| {
        b.iter(|| text.invoke("forward", &[Packet::carrying(7_i32)]).unwrap());
    });

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for length in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("chain", length), &length, |b, &length| {
            let (nodes, _tail) = build_chain(length);
            let mut graph = ExecutionGraph::new();
            for node in &nodes {
                graph.add_node(node);
            }
            b.iter(|| {
                graph.assemble().unwrap();
                graph.plan().unwrap().task_count()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch_pass, bench_invoke, bench_assemble);
criterion_main!(benches);
