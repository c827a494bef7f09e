use petgraph::stable_graph::NodeIndex;
use rustc_hash::FxHashMap;

use crate::prelude::*;

/// x (GM) -> ld -> abs -> st (GM), plus `mystery` hanging off `abs`
fn kernel() -> (AscGraph, [NodeIndex; 5]) {
    let mut g = AscGraph::new();
    let dims = vec![Expr::symbol("s"), Expr::int(128)];
    let x = g.add_node("x", "Data", vec![TensorAttr::new("float16", dims.clone()).in_global()]);
    let ld = g.add_node("ld", "Load", vec![TensorAttr::new("float16", dims.clone())]);
    let abs = g.add_node("abs", "Abs", vec![TensorAttr::new("float16", dims.clone())]);
    let mystery = g.add_node(
        "mystery",
        "Frobnicate",
        vec![TensorAttr::new("float16", dims.clone())],
    );
    let st = g.add_node("st", "Store", vec![TensorAttr::new("float16", dims).in_global()]);
    g.connect(x, 0, ld, 0);
    g.connect(ld, 0, abs, 0);
    g.connect(abs, 0, mystery, 0);
    g.connect(abs, 0, st, 0);
    (g, [x, ld, abs, mystery, st])
}

#[test]
fn test_graph_totals() {
    let (g, [_, ld, abs, _, st]) = kernel();
    let model = PerfModel::default();
    let perf = model.evaluate_graph(&g).unwrap();

    let costed = perf.nodes.iter().map(|(id, _)| *id).collect::<Vec<_>>();
    assert_eq!(costed, [ld, abs, st]);
    assert_eq!(perf.unmodeled, ["mystery"]);
    assert_eq!(
        perf.total.pipes.keys().copied().collect::<Vec<_>>(),
        [PipeType::AivVec, PipeType::AivMte2, PipeType::AivMte3]
    );

    let values: FxHashMap<String, Expr> = [("s", 64), ("block_dim", 4)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Expr::int(v)))
        .collect();
    let total = perf.total.evaluate(&values).unwrap();
    for (_, node) in &perf.nodes {
        for (pipe, v) in node.evaluate(&values).unwrap() {
            assert!(v > 0.0);
            assert!((total[&pipe] - v).abs() < 1e-9, "{pipe} is only costed by one node");
        }
    }
}

#[test]
fn test_boundary_routing() {
    let (g, [x, ld, abs, _, st]) = kernel();
    let model = PerfModel::default();
    assert!(model.evaluate_node(&g, x).unwrap().is_none());
    let load = model.evaluate_node(&g, ld).unwrap().unwrap();
    assert!(load.get(PipeType::AivMte2).is_some());
    let compute = model.evaluate_node(&g, abs).unwrap().unwrap();
    assert!(compute.get(PipeType::AivVec).is_some());
    let store = model.evaluate_node(&g, st).unwrap().unwrap();
    assert!(store.get(PipeType::AivMte3).is_some());
    assert_eq!(model.cost_kind("DataCopy", BoundaryKind::Load), "Load");
    assert_eq!(model.cost_kind("Abs", BoundaryKind::Compute), "Abs");
}

#[test]
fn test_node_failure_names_the_node() {
    let mut g = AscGraph::new();
    let a = TensorAttr::new("float16", vec![Expr::int(32), Expr::int(32)]);
    let x = g.add_node("x", "Data", vec![a.clone().in_global()]);
    let ld = g.add_node("ld", "Load", vec![a.clone()]);
    let mm = g.add_node("mm", "MatMul", vec![a]);
    g.connect(x, 0, ld, 0);
    g.connect(ld, 0, mm, 0);

    let err = PerfModel::default().evaluate_graph(&g).unwrap_err();
    assert_eq!(
        err,
        ModelError::Cost {
            node: "mm".into(),
            source: CostError::InputCount {
                op: "MatMul".into(),
                expected: 2,
                got: 1
            }
        }
    );
}

#[test]
fn test_cycles_are_rejected() {
    let mut g = AscGraph::new();
    let t = TensorAttr::new("float32", vec![Expr::int(4)]);
    let a = g.add_node("a", "Abs", vec![t.clone()]);
    let b = g.add_node("b", "Neg", vec![t]);
    g.connect(a, 0, b, 0);
    g.connect(b, 0, a, 0);
    assert!(matches!(
        PerfModel::default().evaluate_graph(&g),
        Err(ModelError::Cycle { .. })
    ));
}

#[test]
fn test_missing_node() {
    let (mut g, [.., st]) = kernel();
    g.graph.remove_node(st);
    assert_eq!(
        PerfModel::default().evaluate_node(&g, st).unwrap_err(),
        ModelError::NodeNotFound(st.index())
    );
}

#[test]
fn test_unnamed_nodes_keep_their_own_branches() {
    // Both loads label their placeholders after the op type
    let z = Expr::symbol("z");
    let attr = |rows: i64| {
        TensorAttr::new("float16", vec![Expr::int(rows), &z * 2])
            .with_gm_strides(vec![&z * 4, Expr::one()])
    };
    let mut g = AscGraph::new();
    let x = g.add_node("x", "Data", vec![attr(16).in_global()]);
    let y = g.add_node("y", "Data", vec![attr(64).in_global()]);
    let ld_x = g.add_node("", "Load", vec![attr(16)]);
    let ld_y = g.add_node("", "Load", vec![attr(64)]);
    g.connect(x, 0, ld_x, 0);
    g.connect(y, 0, ld_y, 0);

    let perf = PerfModel::default().evaluate_graph(&g).unwrap();
    assert_eq!(perf.nodes.len(), 2);
    assert_eq!(perf.total.tenary_ops.len(), 2);

    let values: FxHashMap<String, Expr> = [("z", 16), ("block_dim", 1)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Expr::int(v)))
        .collect();
    let per_node = perf
        .nodes
        .iter()
        .map(|(_, r)| r.evaluate(&values).unwrap()[&PipeType::AivMte2])
        .collect::<Vec<_>>();
    assert!((per_node[0] - per_node[1]).abs() > 1e-9);
    let total = perf.total.evaluate(&values).unwrap()[&PipeType::AivMte2];
    assert!((total - per_node.iter().sum::<f64>()).abs() < 1e-9);
}
