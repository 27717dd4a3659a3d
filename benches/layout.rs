use cloudviz_layout::config::Config;
use cloudviz_layout::decoration::{GraphTopology, IamDisplay};
use cloudviz_layout::layout::{
    ForceOptions, HierarchicalOptions, Viewport, layout_flat_layered, layout_force_directed,
    layout_hierarchical,
};
use cloudviz_layout::{Graph, GraphEdge, GraphNode, ViewState};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use std::hint::black_box;

/// `vpcs` VPCs, each with `subnets` subnets of `resources` resources, chained
/// by resource edges plus a few cross-VPC links.
fn nested_graph(vpcs: usize, subnets: usize, resources: usize) -> Graph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut previous: Option<String> = None;
    for v in 0..vpcs {
        let vpc = format!("vpc{v}");
        nodes.push(GraphNode::new(&vpc).with_kind("vpc"));
        for s in 0..subnets {
            let subnet = format!("{vpc}.subnet{s}");
            nodes.push(GraphNode::new(&subnet).with_kind("subnet").with_parent(&vpc));
            for r in 0..resources {
                let id = format!("{subnet}.res{r}");
                nodes.push(GraphNode::new(&id).with_kind("resource").with_parent(&subnet));
                if let Some(prev) = previous.as_deref() {
                    edges.push(GraphEdge::new(prev, &id).with_type("other-res-res"));
                }
                previous = Some(id);
            }
        }
        if v > 0 {
            edges.push(
                GraphEdge::new(format!("vpc{}.subnet0.res0", v - 1), format!("{vpc}.subnet0.res0"))
                    .with_type("iam-res-res"),
            );
        }
    }
    Graph::new(nodes, edges)
}

fn flat_graph(nodes: usize, extra_edges: usize) -> Graph {
    let graph_nodes = (0..nodes)
        .map(|i| GraphNode::new(format!("n{i}")).with_kind("resource"))
        .collect();
    let mut edges: Vec<_> = (1..nodes)
        .map(|i| GraphEdge::new(format!("n{}", i - 1), format!("n{i}")))
        .collect();
    for i in 0..extra_edges.min(nodes.saturating_sub(2)) {
        edges.push(GraphEdge::new(format!("n{i}"), format!("n{}", i + 2)));
    }
    Graph::new(graph_nodes, edges)
}

fn bench_hierarchical(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchical");
    let options = HierarchicalOptions::default();
    for (vpcs, subnets, resources) in [(1, 2, 4), (3, 3, 6), (6, 4, 8)] {
        let graph = nested_graph(vpcs, subnets, resources);
        group.bench_with_input(
            BenchmarkId::from_parameter(graph.nodes.len()),
            &graph,
            |b, graph| {
                b.iter(|| {
                    let out = block_on(layout_hierarchical(black_box(graph), &options));
                    black_box(out.map(|graph| graph.nodes.len()).unwrap_or_default());
                });
            },
        );
    }
    group.finish();
}

fn bench_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat");
    let config = Config::default();
    let viewport = Viewport::new(1200.0, 800.0);
    let force = ForceOptions {
        seed: Some(42),
        ..ForceOptions::default()
    };
    for size in [20usize, 80, 200] {
        let graph = flat_graph(size, size / 2);
        group.bench_with_input(BenchmarkId::new("force", size), &graph, |b, graph| {
            b.iter(|| {
                let out = block_on(layout_force_directed(&graph.nodes, &graph.edges, &viewport, &force));
                black_box(out.map(|nodes| nodes.len()).unwrap_or_default());
            });
        });
        group.bench_with_input(BenchmarkId::new("layered", size), &graph, |b, graph| {
            b.iter(|| {
                let out = block_on(layout_flat_layered(
                    &graph.nodes,
                    &graph.edges,
                    &viewport,
                    &config.flat.options(),
                ));
                black_box(out.map(|nodes| nodes.len()).unwrap_or_default());
            });
        });
    }
    group.finish();
}

fn bench_handles(c: &mut Criterion) {
    let mut group = c.benchmark_group("handles");
    let graph = nested_graph(6, 4, 8);
    let mut state = ViewState::new(IamDisplay::ResRes, GraphTopology::Hierarchical);
    let ticket = state.set_graph(graph);
    let options = HierarchicalOptions::default();
    let Ok(laid_out) = block_on(layout_hierarchical(&ticket.graph, &options)) else {
        return;
    };
    state.commit_layout(ticket.generation, laid_out);
    group.bench_function("refresh_edges", |b| {
        b.iter(|| {
            state.refresh_edges();
            black_box(state.laid_out().edges.len());
        });
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_hierarchical, bench_flat, bench_handles
);
criterion_main!(benches);
