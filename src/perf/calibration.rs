//! Calibrated constants behind every cost law. All values are in abstract
//! cycles and were fitted against profiled kernels; they are only meaningful
//! relative to each other.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use tileperf_symbolic::{Expr, SymbolicError};

use crate::shape::DataType;

/// `k * count + h`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineLaw {
    pub k: f64,
    pub h: f64,
}

impl AffineLaw {
    pub const fn new(k: f64, h: f64) -> Self {
        Self { k, h }
    }

    pub fn apply(&self, count: impl Into<Expr>) -> Expr {
        Expr::float(self.k) * count + Expr::float(self.h)
    }
}

/// `fixed + bytes / (base + per_core / block_dim)`, plus `per_burst` for
/// every separate burst the DMA engine has to issue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DmaLaw {
    pub base: f64,
    pub per_core: f64,
    pub fixed: f64,
    pub per_burst: f64,
}

impl DmaLaw {
    pub fn apply(&self, bytes: impl Into<Expr>, block_dim: &Expr) -> Result<Expr, SymbolicError> {
        let bytes: Expr = bytes.into();
        let bandwidth = Expr::float(self.base) + Expr::float(self.per_core).try_div(block_dim)?;
        Ok(Expr::float(self.fixed) + bytes.try_div(bandwidth)?)
    }

    pub fn apply_bursts(
        &self,
        bytes: impl Into<Expr>,
        bursts: impl Into<Expr>,
        block_dim: &Expr,
    ) -> Result<Expr, SymbolicError> {
        Ok(self.apply(bytes, block_dim)? + Expr::float(self.per_burst) * bursts)
    }
}

pub(crate) const LOAD_LARGE: DmaLaw = DmaLaw {
    base: 7.9052,
    per_core: 7.30999994277954,
    fixed: 27.01000022888178,
    per_burst: 0.0,
};

pub(crate) const LOAD_SMALL: DmaLaw = DmaLaw {
    base: 3.2518,
    per_core: 10.8871,
    fixed: 31.0488,
    per_burst: 0.4512,
};

pub(crate) const STORE_LARGE: DmaLaw = DmaLaw {
    base: 9.9643,
    per_core: 3.7925,
    fixed: 12.0912,
    per_burst: 0.0,
};

pub(crate) const STORE_SMALL: DmaLaw = DmaLaw {
    base: 4.0087,
    per_core: 6.1235,
    fixed: 14.3352,
    per_burst: 0.3106,
};

// Broadcast, per merged pattern
pub(crate) const BROADCAST_SCALAR: AffineLaw = AffineLaw::new(0.0081, 11.2745);
pub(crate) const BROADCAST_OUTER: AffineLaw = AffineLaw::new(0.0094, 13.5311);
pub(crate) const BROADCAST_INNER: AffineLaw = AffineLaw::new(0.0213, 15.0786);
pub(crate) const BROADCAST_INNER_ROW: f64 = 1.8344;
pub(crate) const BROADCAST_MIDDLE: AffineLaw = AffineLaw::new(0.0102, 9.6628);
pub(crate) const BROADCAST_GENERAL: AffineLaw = AffineLaw::new(0.0347, 18.4410);
pub(crate) const BROADCAST_GENERAL_GROUP: f64 = 6.5023;

// Reductions
pub(crate) const REDUCE_ROW: f64 = 2.1375;
pub(crate) const REDUCE_SCALAR_ROW: f64 = 0.6250;
pub(crate) const REDUCE_SCALAR_FIXED: f64 = 4.0;

// Select: streaming pays per byte more but needs no staging buffer
pub(crate) const SELECT_BUFFERED: AffineLaw = AffineLaw::new(0.0049, 24.7305);
pub(crate) const SELECT_STREAMING: AffineLaw = AffineLaw::new(0.0076, 39.1182);

// Cube unit
pub(crate) const CUBE_FIXED: f64 = 33.6872;
pub(crate) const CUBE_MTE1: AffineLaw = AffineLaw::new(0.0039, 18.2207);
pub(crate) const CUBE_FIXPIPE: AffineLaw = AffineLaw::new(1.0625, 21.5134);

/// Multiply-accumulates per cycle on the cube unit, by operand type
pub(crate) fn cube_rate(data_type: &DataType) -> Option<i64> {
    match data_type {
        DataType::Float16 | DataType::BFloat16 => Some(4096),
        DataType::Float32 => Some(1024),
        DataType::Int8 => Some(8192),
        _ => None,
    }
}

pub(crate) const CUBE_DEFAULT_RATE: i64 = 4096;

/// Used for any (op, type) pair nothing better is known for
pub(crate) const GENERIC: AffineLaw = AffineLaw::new(0.0250, 25.0);

/// Matches any data type
const ANY: &str = "*";

#[rustfmt::skip]
const VECTOR_LAWS: &[(&str, &str, AffineLaw)] = &[
    ("Abs", "float16", AffineLaw::new(0.0147, 20.0592)),
    ("Abs", "float32", AffineLaw::new(0.0289, 20.3316)),
    ("Neg", "float16", AffineLaw::new(0.0149, 19.8841)),
    ("Neg", "float32", AffineLaw::new(0.0291, 20.0127)),
    ("Relu", "float16", AffineLaw::new(0.0151, 20.7723)),
    ("Relu", "float32", AffineLaw::new(0.0294, 21.0452)),
    ("Exp", "float16", AffineLaw::new(0.0301, 27.4315)),
    ("Exp", "float32", AffineLaw::new(0.0586, 28.1069)),
    ("Ln", "float16", AffineLaw::new(0.0322, 28.9040)),
    ("Ln", "float32", AffineLaw::new(0.0617, 29.5561)),
    ("Sqrt", "float16", AffineLaw::new(0.0276, 24.1183)),
    ("Sqrt", "float32", AffineLaw::new(0.0541, 24.9206)),
    ("Rsqrt", "float16", AffineLaw::new(0.0298, 25.6637)),
    ("Rsqrt", "float32", AffineLaw::new(0.0583, 26.3378)),
    ("Reciprocal", "float16", AffineLaw::new(0.0280, 24.4850)),
    ("Reciprocal", "float32", AffineLaw::new(0.0552, 25.0914)),
    ("Tanh", ANY, AffineLaw::new(0.0913, 41.2276)),
    ("Sigmoid", ANY, AffineLaw::new(0.0874, 38.9921)),
    ("Erf", ANY, AffineLaw::new(0.1062, 44.7053)),
    ("Add", "float16", AffineLaw::new(0.0152, 21.3309)),
    ("Add", "float32", AffineLaw::new(0.0297, 21.7745)),
    ("Add", "int32", AffineLaw::new(0.0299, 21.9180)),
    ("Sub", "float16", AffineLaw::new(0.0152, 21.3512)),
    ("Sub", "float32", AffineLaw::new(0.0298, 21.8016)),
    ("Mul", "float16", AffineLaw::new(0.0155, 21.6108)),
    ("Mul", "float32", AffineLaw::new(0.0303, 22.0464)),
    ("Div", "float16", AffineLaw::new(0.0329, 29.1847)),
    ("Div", "float32", AffineLaw::new(0.0640, 30.0221)),
    ("Max", ANY, AffineLaw::new(0.0231, 21.5570)),
    ("Min", ANY, AffineLaw::new(0.0231, 21.5570)),
    ("Pow", ANY, AffineLaw::new(0.1180, 47.3391)),
    ("Cast", "float16", AffineLaw::new(0.0188, 22.6027)),
    ("Cast", "float32", AffineLaw::new(0.0205, 22.8815)),
    ("Cast", "bfloat16", AffineLaw::new(0.0191, 22.7140)),
    ("Cast", "int32", AffineLaw::new(0.0226, 23.4408)),
    ("Cast", "int8", AffineLaw::new(0.0243, 24.0019)),
    ("ReduceSum", "float16", AffineLaw::new(0.0173, 30.6132)),
    ("ReduceSum", "float32", AffineLaw::new(0.0335, 31.2960)),
    ("ReduceMax", ANY, AffineLaw::new(0.0262, 30.9847)),
    ("ReduceMin", ANY, AffineLaw::new(0.0262, 30.9847)),
    ("ReduceMean", "float16", AffineLaw::new(0.0181, 34.0213)),
    ("ReduceMean", "float32", AffineLaw::new(0.0349, 34.7710)),
    ("ReduceProd", ANY, AffineLaw::new(0.0391, 33.2068)),
];

/// op name -> data type name -> law
type LawTable = FxHashMap<&'static str, FxHashMap<&'static str, AffineLaw>>;

static LAWS: OnceLock<LawTable> = OnceLock::new();

fn laws() -> &'static LawTable {
    LAWS.get_or_init(|| {
        let mut table = LawTable::default();
        for &(op, dtype, law) in VECTOR_LAWS {
            table.entry(op).or_default().insert(dtype, law);
        }
        table
    })
}

/// Vector-unit law for `op` over elements of `data_type`. Falls back to the
/// op's type-agnostic law, then to [`GENERIC`].
pub(crate) fn vector_law(op: &str, data_type: &DataType) -> AffineLaw {
    let by_type = laws().get(op);
    let name = data_type.to_string();
    let found = by_type.and_then(|t| t.get(name.as_str()).or_else(|| t.get(ANY)));
    match found {
        Some(law) => *law,
        None => {
            tracing::debug!(op, %data_type, "no calibration, using generic vector law");
            GENERIC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_law_fallbacks() {
        assert_eq!(
            vector_law("Abs", &DataType::Float16),
            AffineLaw::new(0.0147, 20.0592)
        );
        assert_eq!(
            vector_law("Tanh", &DataType::Int8),
            AffineLaw::new(0.0913, 41.2276)
        );
        assert_eq!(vector_law("Abs", &DataType::from_name("float8_e4m3")), GENERIC);
        assert_eq!(vector_law("Frobnicate", &DataType::Float32), GENERIC);
    }

    #[test]
    fn test_dma_law_shape() {
        let cost = LOAD_LARGE.apply(1024, &Expr::symbol("block_dim")).unwrap();
        assert_eq!(
            cost.to_string(),
            "(27.01000022888178 + (1024 / (7.9052 + (7.30999994277954 / block_dim))))"
        );
    }
}
