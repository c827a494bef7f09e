use tileperf_symbolic::Expr;

use super::{
    calibration::{
        vector_law, BROADCAST_GENERAL, BROADCAST_GENERAL_GROUP, BROADCAST_INNER,
        BROADCAST_INNER_ROW, BROADCAST_MIDDLE, BROADCAST_OUTER, BROADCAST_SCALAR,
    },
    register_ops, validate, CostTable, PerfResult,
};
use crate::{
    shape::{NodeContext, TensorShapeDescriptor},
    CostError, PipeType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Output extent is 1, nothing to do
    Skip,
    /// Input extent 1, output extent N
    Broadcast,
    Keep,
}

/// Shape of a broadcast after size-1 axes are dropped and neighbouring axes
/// of the same kind are merged. Extents are output element counts.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastPattern {
    NoBroadcast,
    /// Every kept axis is broadcast: one value fills the output
    Scalar { repeat: Expr },
    /// `[1, K] -> [B, K]`
    Outer { repeat: Expr, inner: Expr },
    /// `[K, 1] -> [K, B]`
    Inner { outer: Expr, repeat: Expr },
    /// `[A, 1, C] -> [A, B, C]`
    Middle { outer: Expr, repeat: Expr, inner: Expr },
    /// Any other merged layout, such as `[B, K, B]` or four or more groups
    General { groups: usize },
}

fn is_one(e: &Expr) -> bool {
    e.as_number().is_some_and(|n| n.to_f64() == 1.0)
}

/// Classify how `input` is broadcast into `output`. The input is left-padded
/// with size-1 axes up to the output rank. Kept axes only merge when the
/// input strides say the two axes form one contiguous run.
pub fn classify_broadcast(
    input: &TensorShapeDescriptor,
    output: &TensorShapeDescriptor,
) -> BroadcastPattern {
    let rank = output.rank();
    let pad = rank.saturating_sub(input.rank());
    let strides_known = input.strides.len() == input.rank();

    let mut groups: Vec<(Axis, Expr, Option<usize>)> = vec![];
    for (i, out_dim) in output.dims.iter().enumerate() {
        // Index of this axis in the unpadded input, if it exists there
        let in_axis = i.checked_sub(pad).filter(|&j| j < input.rank());
        let in_dim = in_axis.map(|j| &input.dims[j]);
        let class = if is_one(out_dim) {
            Axis::Skip
        } else if in_dim.map_or(true, is_one) {
            Axis::Broadcast
        } else {
            Axis::Keep
        };
        if class == Axis::Skip {
            continue;
        }
        let merged = match groups.last_mut() {
            Some((Axis::Broadcast, extent, _)) if class == Axis::Broadcast => {
                *extent = &*extent * out_dim;
                true
            }
            Some((Axis::Keep, extent, Some(prev))) if class == Axis::Keep => {
                let j = in_axis.unwrap_or(*prev);
                let contiguous = !strides_known
                    || input.strides[*prev].product_eq(&(&input.strides[j] * &input.dims[j]));
                if contiguous {
                    *extent = &*extent * out_dim;
                    *prev = j;
                }
                contiguous
            }
            _ => false,
        };
        if !merged {
            groups.push((class, out_dim.clone(), in_axis));
        }
    }

    let kinds = groups.iter().map(|(a, _, _)| *a).collect::<Vec<_>>();
    let extent = |i: usize| groups[i].1.clone();
    match kinds.as_slice() {
        k if !k.contains(&Axis::Broadcast) => BroadcastPattern::NoBroadcast,
        k if !k.contains(&Axis::Keep) => BroadcastPattern::Scalar {
            repeat: groups.iter().map(|(_, e, _)| e.clone()).product(),
        },
        [Axis::Broadcast, Axis::Keep] => BroadcastPattern::Outer {
            repeat: extent(0),
            inner: extent(1),
        },
        [Axis::Keep, Axis::Broadcast] => BroadcastPattern::Inner {
            outer: extent(0),
            repeat: extent(1),
        },
        [Axis::Keep, Axis::Broadcast, Axis::Keep] => BroadcastPattern::Middle {
            outer: extent(0),
            repeat: extent(1),
            inner: extent(2),
        },
        k => BroadcastPattern::General { groups: k.len() },
    }
}

/// Vector cost of materializing `pattern` into `out_elems` elements
pub(crate) fn broadcast_cost(pattern: &BroadcastPattern, out_elems: &Expr) -> Expr {
    match pattern {
        BroadcastPattern::NoBroadcast => Expr::zero(),
        BroadcastPattern::Scalar { .. } => BROADCAST_SCALAR.apply(out_elems),
        BroadcastPattern::Outer { .. } => BROADCAST_OUTER.apply(out_elems),
        BroadcastPattern::Inner { outer, .. } => {
            BROADCAST_INNER.apply(out_elems) + Expr::float(BROADCAST_INNER_ROW) * outer
        }
        BroadcastPattern::Middle {
            outer,
            repeat,
            inner,
        } => outer * BROADCAST_MIDDLE.apply(repeat * inner),
        BroadcastPattern::General { groups } => {
            BROADCAST_GENERAL.apply(out_elems) + Expr::float(BROADCAST_GENERAL_GROUP) * *groups
        }
    }
}

fn broadcast(
    op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    let out = &outputs[0];
    let pattern = classify_broadcast(&inputs[0], out);
    let mut result = PerfResult::new(ctx.label());
    let cost = match pattern {
        // A broadcast that repeats nothing is a plain copy through UB
        BroadcastPattern::NoBroadcast => {
            vector_law(op, &inputs[0].data_type).apply(out.element_count())
        }
        ref p => broadcast_cost(p, &out.element_count()),
    };
    result.set(PipeType::AivVec, cost);
    Ok(result)
}

pub(super) fn register(table: &mut CostTable) {
    register_ops!(table, broadcast, ["Broadcast"]);
}
