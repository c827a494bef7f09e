use tileperf_symbolic::Expr;

use super::{
    broadcast::{broadcast_cost, classify_broadcast},
    calibration::{vector_law, REDUCE_ROW, REDUCE_SCALAR_FIXED, REDUCE_SCALAR_ROW},
    register_ops, validate, CostTable, PerfResult,
};
use crate::{
    shape::{NodeContext, TensorShapeDescriptor},
    CostError, PipeType,
};

/// `k * elements + h` on the vector unit, elements counted on the output.
/// The law is keyed by the input type, which for `Cast` is the source type.
fn unary(
    op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    let mut result = PerfResult::new(ctx.label());
    let law = vector_law(op, &inputs[0].data_type);
    result.set(PipeType::AivVec, law.apply(outputs[0].element_count()));
    Ok(result)
}

/// Like [`unary`], plus whatever it costs to broadcast each input that does
/// not already have the output's shape.
fn binary(
    op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    let out = &outputs[0];
    let elems = out.element_count();
    let mut result = PerfResult::new(ctx.label());
    result.set(
        PipeType::AivVec,
        vector_law(op, &inputs[0].data_type).apply(&elems),
    );
    for input in inputs {
        let pattern = classify_broadcast(input, out);
        result.add(PipeType::AivVec, broadcast_cost(&pattern, &elems));
    }
    Ok(result)
}

/// Affine in the input element count plus a term per output row. The
/// scalar unit pays the loop overhead of walking the rows.
fn reduce(
    op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    let rows = outputs[0].element_count();
    let mut result = PerfResult::new(ctx.label());
    let law = vector_law(op, &inputs[0].data_type);
    result.set(
        PipeType::AivVec,
        law.apply(inputs[0].element_count()) + Expr::float(REDUCE_ROW) * &rows,
    );
    result.set(
        PipeType::AivScalar,
        Expr::float(REDUCE_SCALAR_ROW) * &rows + Expr::float(REDUCE_SCALAR_FIXED),
    );
    Ok(result)
}

pub(super) fn register(table: &mut CostTable) {
    register_ops!(
        table,
        unary,
        [
            "Abs",
            "Exp",
            "Ln",
            "Sqrt",
            "Rsqrt",
            "Relu",
            "Neg",
            "Reciprocal",
            "Tanh",
            "Sigmoid",
            "Erf",
            "Cast",
        ]
    );
    register_ops!(table, binary, ["Add", "Sub", "Mul", "Div", "Max", "Min", "Pow"]);
    register_ops!(
        table,
        reduce,
        ["ReduceSum", "ReduceMax", "ReduceMin", "ReduceMean", "ReduceProd"]
    );
}
