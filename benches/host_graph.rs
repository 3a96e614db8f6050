//! Benchmarks for the host-graph engines.
//!
//! Measures the cost of arena churn, class-indexed lookup, snapshot
//! round-trips, and bucket reindexing, establishing a baseline for the
//! structures the rule engine leans on hardest.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hostgraph::prelude::*;

/// Builds a chain graph with `n` nodes and `n - 1` edges.
fn chain(n: usize) -> (Graph, Vec<NodeId>, Vec<EdgeId>) {
    let mut graph = Graph::new();
    let nodes: Vec<_> = (0..n)
        .map(|i| graph.add_node(Label::blank(), i == 0))
        .collect();
    let edges: Vec<_> = nodes
        .windows(2)
        .map(|w| graph.add_edge(Label::blank(), false, w[0], w[1]).unwrap())
        .collect();
    (graph, nodes, edges)
}

/// Add/remove churn through the free lists: the steady-state shape of a
/// long rule-application run.
fn bench_arena_churn(c: &mut Criterion) {
    c.bench_function("arena_churn_1000", |b| {
        let (mut graph, _, _) = chain(1_000);
        b.iter(|| {
            let a = graph.add_node(Label::blank(), false);
            let z = graph.add_node(Label::blank(), false);
            let e = graph.add_edge(Label::blank(), false, a, z).unwrap();
            graph.remove_edge(black_box(e)).unwrap();
            graph.remove_node(black_box(z)).unwrap();
            graph.remove_node(black_box(a)).unwrap();
        });
    });
}

/// Class-bucket lookup, the matcher's candidate enumeration entry point.
fn bench_class_lookup(c: &mut Criterion) {
    let mut graph = Graph::new();
    for i in 0..10_000 {
        let label = if i % 2 == 0 {
            Label::blank()
        } else {
            Label::new(Mark::None, vec![Atom::Integer(i)])
        };
        graph.add_node(label, false);
    }
    c.bench_function("class_lookup_10k", |b| {
        b.iter(|| {
            let ints = graph.nodes_by_class(black_box(LabelClass::Int));
            black_box(ints.len())
        });
    });
}

/// Snapshot then restore of a mid-size graph: the cost of one failed
/// rule application.
fn bench_snapshot_restore(c: &mut Criterion) {
    let (graph, _, _) = chain(1_000);
    c.bench_function("snapshot_restore_1000", |b| {
        b.iter(|| {
            let mut snapshots = SnapshotStack::new();
            snapshots.snapshot(black_box(&graph));
            black_box(snapshots.restore())
        });
    });
}

/// Edge add/delete in the bucketed engine: two unindex/reindex pairs per
/// operation.
fn bench_bucketed_reindex(c: &mut Criterion) {
    let mut graph = BucketedGraph::new();
    let nodes: Vec<_> = (0..1_000).map(|_| graph.add_node(false)).collect();
    c.bench_function("bucketed_edge_churn_1000", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let src = nodes[i % nodes.len()];
            let tgt = nodes[(i + 1) % nodes.len()];
            i += 1;
            let e = graph.add_edge(black_box(src), black_box(tgt));
            graph.delete_edge(e);
        });
    });
}

criterion_group!(
    benches,
    bench_arena_churn,
    bench_class_lookup,
    bench_snapshot_restore,
    bench_bucketed_reindex
);
criterion_main!(benches);
