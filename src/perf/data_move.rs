use tileperf_symbolic::Expr;

use super::{
    calibration::{DmaLaw, LOAD_LARGE, LOAD_SMALL, STORE_LARGE, STORE_SMALL},
    register_ops, validate, CostTable, PerfResult,
};
use crate::{
    shape::{NodeContext, TensorShapeDescriptor},
    CostError, PipeType,
};

/// How a tensor is laid out in global memory, from the DMA engine's view.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPattern {
    /// Elements moved by one burst
    pub burst_elems: Expr,
    /// Number of bursts
    pub burst_count: Expr,
    /// The whole tensor is one burst
    pub contiguous: bool,
}

/// Find the longest contiguous run of inner axes in `tensor`'s global-memory
/// layout. Size-1 axes are ignored; an axis joins the run when its stride
/// equals the run's stride times its extent, however either product was
/// associated. Missing strides mean dense.
pub fn analyze_transfer(tensor: &TensorShapeDescriptor) -> TransferPattern {
    let strides = &tensor.gm_strides;
    if strides.len() != tensor.rank() {
        return TransferPattern {
            burst_elems: tensor.element_count(),
            burst_count: Expr::one(),
            contiguous: true,
        };
    }

    let axes = (0..tensor.rank())
        .rev()
        .filter(|&i| tensor.dims[i].as_number().map_or(true, |n| n.to_f64() != 1.0))
        .collect::<Vec<_>>();
    let mut burst_elems = Expr::one();
    let mut burst_count = Expr::one();
    // Stride the next axis needs to extend the run, None once the run is broken
    let mut next_stride = Some(Expr::one());
    for i in axes {
        let dim = &tensor.dims[i];
        match &next_stride {
            Some(expected) if expected.product_eq(&strides[i]) => {
                burst_elems = burst_elems * dim;
                next_stride = Some(&strides[i] * dim);
            }
            _ => {
                burst_count = burst_count * dim;
                next_stride = None;
            }
        }
    }
    TransferPattern {
        contiguous: burst_count == Expr::one(),
        burst_elems,
        burst_count,
    }
}

/// 1 when `bytes` is known to be a multiple of the UB block, the configured
/// penalty when it is known not to be. Symbolic sizes are assumed aligned.
fn alignment_factor(bytes: &Expr, ctx: &NodeContext) -> i64 {
    let align = ctx.hardware.ub_align_bytes;
    match bytes.to_f64() {
        Some(b) if align > 0 && b.fract() == 0.0 && (b as i64) % align != 0 => {
            ctx.hardware.unaligned_penalty
        }
        _ => 1,
    }
}

fn transfer(
    tensor: &TensorShapeDescriptor,
    large: &DmaLaw,
    small: &DmaLaw,
    ctx: &NodeContext,
    result: &mut PerfResult,
) -> Result<Expr, CostError> {
    let block_dim = ctx.hardware.block_dim();
    let pattern = analyze_transfer(tensor);
    let burst_bytes = &pattern.burst_elems * tensor.data_type_size;
    let bytes = tensor.total_bytes() * alignment_factor(&burst_bytes, ctx);

    let large_cost = large.apply(&bytes, &block_dim)?;
    if pattern.contiguous {
        return Ok(large_cost);
    }
    let small_cost = small.apply_bursts(&bytes, &pattern.burst_count, &block_dim)?;
    let small_block = burst_bytes.lt(ctx.hardware.dma_small_block_threshold);
    Ok(result
        .tenary_ops
        .make_ternary(small_block, small_cost, large_cost)?)
}

/// GM -> UB. The moved tensor is the first output; its `gm_strides` give
/// the source layout.
fn load(
    _op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    let mut result = PerfResult::new(ctx.label());
    let cost = transfer(&outputs[0], &LOAD_LARGE, &LOAD_SMALL, ctx, &mut result)?;
    result.set(PipeType::AivMte2, cost);
    Ok(result)
}

/// UB -> GM, costed against the destination layout
fn store(
    _op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    let mut result = PerfResult::new(ctx.label());
    let cost = transfer(&outputs[0], &STORE_LARGE, &STORE_SMALL, ctx, &mut result)?;
    result.set(PipeType::AivMte3, cost);
    Ok(result)
}

pub(super) fn register(table: &mut CostTable) {
    register_ops!(table, load, ["Load"]);
    register_ops!(table, store, ["Store"]);
}
