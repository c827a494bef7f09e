use tileperf_symbolic::Expr;

use super::{
    calibration::{cube_rate, CUBE_DEFAULT_RATE, CUBE_FIXED, CUBE_FIXPIPE, CUBE_MTE1, LOAD_LARGE},
    register_ops, validate, CostTable, PerfResult,
};
use crate::{
    shape::{NodeContext, TensorShapeDescriptor},
    CostError, PipeType,
};

/// `[.., m, k] x [.., k, n] -> [.., m, n]`. Leading output axes are batch.
fn matmul(
    op: &str,
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
    ctx: &NodeContext,
) -> Result<PerfResult, CostError> {
    validate(inputs, outputs)?;
    if inputs.len() < 2 {
        return Err(CostError::InputCount {
            op: op.to_string(),
            expected: 2,
            got: inputs.len(),
        });
    }
    let (a, b) = (&inputs[0], &inputs[1]);
    for (index, t) in [a, b].into_iter().enumerate() {
        if t.rank() < 2 {
            return Err(CostError::RankTooSmall {
                op: op.to_string(),
                index,
                expected: 2,
                got: t.rank(),
            });
        }
    }
    let m = &a.dims[a.rank() - 2];
    let k = &a.dims[a.rank() - 1];
    let k_rhs = &b.dims[b.rank() - 2];
    let n = &b.dims[b.rank() - 1];
    // Only sizes known on both sides can be shown to disagree
    if k != k_rhs && k.is_literal() && k_rhs.is_literal() {
        return Err(CostError::ContractionMismatch {
            lhs: k.to_string(),
            rhs: k_rhs.to_string(),
        });
    }

    let out = &outputs[0];
    let batch: Expr = out.dims[..out.rank().saturating_sub(2)]
        .iter()
        .cloned()
        .product();

    let rate = if a.data_type != b.data_type {
        tracing::debug!(
            op,
            lhs = %a.data_type,
            rhs = %b.data_type,
            "mixed precision, using default cube rate"
        );
        CUBE_DEFAULT_RATE
    } else {
        cube_rate(&a.data_type).unwrap_or_else(|| {
            tracing::debug!(op, data_type = %a.data_type, "no cube rate, using default");
            CUBE_DEFAULT_RATE
        })
    };

    let block_dim = ctx.hardware.block_dim();
    let fractal = ctx.hardware.cube_fractal * ctx.hardware.cube_fractal;
    let operand_bytes = a.total_bytes() + b.total_bytes();

    let mut result = PerfResult::new(ctx.label());
    let macs = &batch * m * n * k;
    result.set(
        PipeType::AicCube,
        Expr::float(CUBE_FIXED) + macs.try_div(rate)?,
    );
    result.set(PipeType::AicMte2, LOAD_LARGE.apply(&operand_bytes, &block_dim)?);
    result.set(PipeType::AicMte1, CUBE_MTE1.apply(&operand_bytes));
    result.set(
        PipeType::AicFixpipe,
        CUBE_FIXPIPE.apply(out.element_count().try_div(fractal)?),
    );
    Ok(result)
}

pub(super) fn register(table: &mut CostTable) {
    register_ops!(table, matmul, ["MatMul", "BatchMatMul"]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::DataType;

    fn t(data_type: DataType, dims: &[i64]) -> TensorShapeDescriptor {
        TensorShapeDescriptor::new(data_type, dims.iter().map(|&d| Expr::int(d)).collect())
    }

    #[test]
    fn test_shape_checks() {
        let ctx = NodeContext::new("mm", "MatMul");
        let err = matmul(
            "MatMul",
            &[t(DataType::Float16, &[16]), t(DataType::Float16, &[16, 8])],
            &[t(DataType::Float16, &[8])],
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, CostError::RankTooSmall { index: 0, got: 1, .. }));

        let err = matmul(
            "MatMul",
            &[t(DataType::Float16, &[4, 16]), t(DataType::Float16, &[32, 8])],
            &[t(DataType::Float16, &[4, 8])],
            &ctx,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CostError::ContractionMismatch {
                lhs: "16".into(),
                rhs: "32".into()
            }
        );
    }

    #[test]
    fn test_symbolic_contraction_is_trusted() {
        let ctx = NodeContext::new("mm", "MatMul");
        let a = TensorShapeDescriptor::new(
            DataType::Float16,
            vec![Expr::int(64), Expr::symbol("k")],
        );
        let b = t(DataType::Float16, &[128, 32]);
        let out = t(DataType::Float16, &[64, 32]);
        assert!(matmul("MatMul", &[a, b], &[out], &ctx).is_ok());
    }

    #[test]
    fn test_mixed_precision_falls_back() {
        let ctx = NodeContext::new("mm", "BatchMatMul");
        let a = t(DataType::Float16, &[2, 64, 128]);
        let b = t(DataType::Float32, &[2, 128, 32]);
        let out = t(DataType::Float32, &[2, 64, 32]);
        let result = matmul("BatchMatMul", &[a, b], &[out], &ctx).unwrap();
        let cube = result.get(PipeType::AicCube).unwrap().to_f64().unwrap();
        let macs = 2.0 * 64.0 * 32.0 * 128.0;
        assert!((cube - (CUBE_FIXED + macs / CUBE_DEFAULT_RATE as f64)).abs() < 1e-9);
        assert_eq!(result.pipes.len(), 4);
    }
}
