mod graph;

use rustc_hash::FxHashMap;
use tileperf_symbolic::{ExprKind, SymbolicError};

use crate::{perf::registered_ops, prelude::*};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn tensor(data_type: DataType, dims: &[i64]) -> TensorShapeDescriptor {
    TensorShapeDescriptor::new(data_type, dims.iter().map(|&d| Expr::int(d)).collect())
}

fn cost(
    op: &str,
    ctx: &NodeContext,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
) -> Result<PerfResult, CostError> {
    let f = lookup(op).unwrap();
    f(inputs, outputs, ctx)
}

fn assignments(pairs: &[(&str, i64)]) -> FxHashMap<String, Expr> {
    pairs
        .iter()
        .map(|(name, v)| (name.to_string(), Expr::int(*v)))
        .collect()
}

#[test]
fn test_unary_closed_form() {
    let t = tensor(DataType::Float16, &[64, 128]);
    let result = cost("Abs", &NodeContext::new("abs0", "Abs"), &[t.clone()], &[t]).unwrap();
    let vec = result.get(PipeType::AivVec).unwrap();
    let expected = 0.0147f64 * 8192.0 + 20.0592;
    assert_eq!(vec.as_number(), Some(Number::float(expected)));
    assert_eq!(vec.to_string(), expected.to_string());
    assert!(result.tenary_ops.is_empty());
    assert_eq!(result.pipes.len(), 1);
}

#[test]
fn test_aligned_load() {
    let src = tensor(DataType::Float16, &[16, 32]).with_location(HardwareLocation::Gm);
    let dst = tensor(DataType::Float16, &[16, 32]);
    let result = cost("Load", &NodeContext::new("ld0", "Load"), &[src], &[dst]).unwrap();
    assert!(result.tenary_ops.is_empty());

    let mte2 = result.get(PipeType::AivMte2).unwrap();
    let (base, per_core, fixed) = (7.9052, 7.30999994277954, 27.01000022888178);
    assert_eq!(
        mte2.to_string(),
        format!("({fixed} + ({} / ({base} + ({per_core} / block_dim))))", 16 * 32 * 2)
    );

    let numbers = result.evaluate(&assignments(&[("block_dim", 1)])).unwrap();
    let expected = fixed + 1024.0 / (base + per_core / 1.0);
    assert!((numbers[&PipeType::AivMte2] - expected).abs() < 1e-9);
}

#[test]
fn test_strided_load_defers_block_mode() {
    let z = Expr::symbol("z0t_size");
    let src = TensorShapeDescriptor::new(DataType::Float16, vec![Expr::int(16), &z * 2])
        .with_location(HardwareLocation::Gm);
    let dst = TensorShapeDescriptor::new(DataType::Float16, vec![Expr::int(16), &z * 2])
        .with_gm_strides(vec![&z * 4, Expr::one()]);
    let result = cost("Load", &NodeContext::new("ld1", "Load"), &[src], &[dst]).unwrap();
    assert_eq!(result.tenary_ops.len(), 1);

    let resolved = result.resolve().unwrap();
    let ExprKind::Ternary(cond, small, large) = resolved[&PipeType::AivMte2].kind() else {
        panic!("expected a ternary, got {}", resolved[&PipeType::AivMte2]);
    };
    assert_eq!(cond.to_string(), "((4 * z0t_size) < 25000)");
    assert_ne!(small, large);

    // Short rows take the small-block branch, long rows the large-block one
    let short = result.substitute("z0t_size", &Expr::int(16)).unwrap().resolve().unwrap();
    let long = result.substitute("z0t_size", &Expr::int(10000)).unwrap().resolve().unwrap();
    assert_eq!(short[&PipeType::AivMte2], small.substitute("z0t_size", &Expr::int(16)).unwrap());
    assert_eq!(long[&PipeType::AivMte2], large.substitute("z0t_size", &Expr::int(10000)).unwrap());
}

#[test]
fn test_select_marker() {
    let t = tensor(DataType::Float32, &[32, 64]);
    let result = cost(
        "Select",
        &NodeContext::new("sel0", "Select"),
        &[t.clone(), t.clone()],
        &[t],
    )
    .unwrap();
    let marker = result.get(PipeType::AivVec).unwrap();
    assert_eq!(marker.to_string(), "sel0_select_cost");
    assert!(marker.has_placeholder());
    assert_eq!(result.tenary_ops.len(), 1);

    let definitions = result.tenary_ops.resolved_definitions().unwrap();
    let (placeholder, flat) = &definitions[0];
    assert_eq!(placeholder, marker);
    let ExprKind::Ternary(cond, then_branch, else_branch) = flat.kind() else {
        panic!("expected a ternary, got {flat}");
    };
    assert_eq!(cond.to_string(), "((8192 / block_dim) < 8192)");
    assert!(then_branch.is_literal() && else_branch.is_literal());
    assert_eq!(
        flat.to_string(),
        format!("TenaryOp({cond}, {then_branch}, {else_branch})")
    );
}

#[test]
fn test_matmul_needs_two_inputs() {
    let a = tensor(DataType::Float16, &[64, 128]);
    let out = tensor(DataType::Float16, &[64, 32]);
    let err = cost("MatMul", &NodeContext::new("mm0", "MatMul"), &[a], &[out]).unwrap_err();
    assert_eq!(
        err,
        CostError::InputCount {
            op: "MatMul".into(),
            expected: 2,
            got: 1
        }
    );
}

#[test]
fn test_every_op_validates_first() {
    let t = tensor(DataType::Float16, &[8, 8]);
    let shapeless = TensorShapeDescriptor::new(DataType::Float16, vec![]);
    let ops = registered_ops();
    assert!(ops.len() > 30);
    for op in ops {
        let ctx = NodeContext::new("n", op);
        assert_eq!(cost(op, &ctx, &[], &[t.clone()]).unwrap_err(), CostError::EmptyInput, "{op}");
        assert_eq!(cost(op, &ctx, &[t.clone()], &[]).unwrap_err(), CostError::EmptyOutput, "{op}");
        assert_eq!(
            cost(op, &ctx, &[t.clone(), t.clone()], &[t.clone(), shapeless.clone()]).unwrap_err(),
            CostError::EmptyDims { index: 1 },
            "{op}"
        );
    }
}

#[test]
fn test_unknown_op() {
    assert!(lookup("NotARealOp").is_none());
    assert!(lookup("").is_none());
}

#[test]
fn test_unknown_dtype_falls_back() {
    init_tracing();
    let t = tensor(DataType::from_name("float8_e5m2"), &[4, 4]);
    for op in ["Abs", "Add", "Cast", "ReduceSum", "MatMul", "Select"] {
        let result = cost(op, &NodeContext::new("n", op), &[t.clone(), t.clone()], &[t.clone()]);
        assert!(result.is_ok(), "{op}: {result:?}");
    }
}

#[test]
fn test_evaluate_needs_every_symbol() {
    let src = tensor(DataType::Float32, &[8, 8]).with_location(HardwareLocation::Gm);
    let dst = tensor(DataType::Float32, &[8, 8]);
    let result = cost("Load", &NodeContext::new("ld", "Load"), &[src], &[dst]).unwrap();
    let err = result.evaluate(&FxHashMap::default()).unwrap_err();
    assert!(matches!(err, CostError::Unevaluated { pipe: PipeType::AivMte2, .. }));
}

#[test]
fn test_zero_fractal_is_division_by_zero() {
    let hardware = HardwareConfig::from_json(r#"{ "cube_fractal": 0 }"#).unwrap();
    let ctx = NodeContext::new("mm", "MatMul").with_hardware(hardware);
    let a = tensor(DataType::Float16, &[16, 16]);
    let err = cost("MatMul", &ctx, &[a.clone(), a.clone()], &[a]).unwrap_err();
    assert_eq!(err, CostError::Symbolic(SymbolicError::DivisionByZero));
}

fn strided_store() -> PerfResult {
    let z = Expr::symbol("z0t_size");
    let dst = TensorShapeDescriptor::new(DataType::Float16, vec![Expr::int(16), &z * 2])
        .with_gm_strides(vec![&z * 4, Expr::one()]);
    cost("Store", &NodeContext::new("st", "Store"), &[dst.clone()], &[dst]).unwrap()
}

#[test]
fn test_threshold_edges() {
    let result = strided_store();
    assert_eq!(result.tenary_ops.len(), 1);
    let at = |size| {
        result
            .substitute("z0t_size", &Expr::int(size))
            .unwrap()
            .resolve()
            .unwrap()[&PipeType::AivMte3]
            .clone()
    };
    let resolved = result.resolve().unwrap();
    let ExprKind::Ternary(_, small, large) = resolved[&PipeType::AivMte3].kind() else {
        panic!("expected a ternary");
    };
    let branch = |e: &Expr, size| e.substitute("z0t_size", &Expr::int(size)).unwrap();
    // 4 * 6249 bytes is still a small burst, 4 * 6250 is not
    assert_eq!(at(6249), branch(small, 6249));
    assert_eq!(at(6250), branch(large, 6250));
    assert_eq!(at(6251), branch(large, 6251));
}

proptest::proptest! {
    #[test]
    fn test_substitute_then_resolve_matches_resolve_then_substitute(
        size in 1i64..50_000,
        cores in 1i64..64,
    ) {
        let result = strided_store();
        let values = assignments(&[("z0t_size", size), ("block_dim", cores)]);
        let first = result.evaluate(&values).unwrap();
        for (pipe, expr) in result.resolve().unwrap() {
            let second = expr.substitute_all(&values).unwrap().to_f64().unwrap();
            proptest::prop_assert_eq!(first[&pipe], second);
        }
    }
}
