use tileperf_symbolic::Expr;

use super::{
    calibration::{SELECT_BUFFERED, SELECT_STREAMING},
    register_ops, validate, CostTable, PerfResult,
};
use crate::{
    shape::{NodeContext, TensorShapeDescriptor},
    CostError, PipeType,
};

/// Compare-and-choose ops stage their operands in UB when each core's share
/// fits, and stream them otherwise. Which one happens depends on `block_dim`,
/// so the vector cost is a named marker whose definition holds both laws.
fn select(
    _op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    let out = &outputs[0];
    let elems = out.element_count();
    // The last input is the widest operand for select/where (the values)
    // and the only shape that matters for plain compares.
    let volume = &elems * inputs[inputs.len() - 1].data_type_size;
    let per_core = (&elems * out.data_type_size).try_div(ctx.hardware.block_dim())?;
    let fits = per_core.lt(ctx.hardware.select_stream_threshold);

    let mut result = PerfResult::new(ctx.label());
    let marker = result.tenary_ops.define(
        format!("{}_select_cost", ctx.label()),
        fits,
        SELECT_BUFFERED.apply(&volume),
        SELECT_STREAMING.apply(&volume),
    )?;
    result.set(PipeType::AivVec, marker);
    Ok(result)
}

pub(super) fn register(table: &mut CostTable) {
    register_ops!(
        table,
        select,
        ["Select", "Where", "Gt", "Ge", "Lt", "Le", "Eq", "Ne"]
    );
}
