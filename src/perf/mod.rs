//! Per-operation cost functions and the table that dispatches to them.

mod broadcast;
pub use broadcast::{classify_broadcast, BroadcastPattern};
mod calibration;
pub use calibration::{AffineLaw, DmaLaw};
mod data_move;
pub use data_move::{analyze_transfer, TransferPattern};
mod elementwise;
mod matmul;
mod select;

use std::{collections::BTreeMap, sync::OnceLock};

use itertools::Itertools;
use rustc_hash::FxHashMap;
use tileperf_symbolic::{Expr, SymbolicError, TernaryRegistry};

use crate::{
    shape::{NodeContext, TensorShapeDescriptor},
    CostError, PipeType,
};

/// Signature shared by every registered cost function.
pub type CostFn = fn(
    &[TensorShapeDescriptor],
    &[TensorShapeDescriptor],
    &NodeContext,
) -> Result<PerfResult, CostError>;

/// Predicted cost of one op instance, per pipeline, together with the
/// ternaries its expressions reference.
#[derive(Debug, Clone, Default)]
pub struct PerfResult {
    pub pipes: BTreeMap<PipeType, Expr>,
    pub tenary_ops: TernaryRegistry,
}

impl PerfResult {
    /// An empty result whose generated placeholders are named after `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            pipes: BTreeMap::new(),
            tenary_ops: TernaryRegistry::with_prefix(prefix),
        }
    }

    pub fn get(&self, pipe: PipeType) -> Option<&Expr> {
        self.pipes.get(&pipe)
    }

    pub fn set(&mut self, pipe: PipeType, cost: Expr) {
        self.pipes.insert(pipe, cost);
    }

    /// Add `cost` to whatever `pipe` already holds
    pub fn add(&mut self, pipe: PipeType, cost: Expr) {
        let total = match self.pipes.remove(&pipe) {
            Some(prev) => prev + cost,
            None => cost,
        };
        self.pipes.insert(pipe, total);
    }

    /// Sum another result into this one, pipe by pipe, absorbing its table.
    /// Placeholders of `other` that clash with a different entry here are
    /// renamed in both its table and its costs.
    pub fn merge(&mut self, other: PerfResult) -> Result<(), SymbolicError> {
        let renames = self.tenary_ops.merge(other.tenary_ops)?;
        for (pipe, cost) in other.pipes {
            self.add(pipe, cost.rename_placeholders(&renames)?);
        }
        Ok(())
    }

    /// Every pipe cost with all placeholders inlined.
    pub fn resolve(&self) -> Result<BTreeMap<PipeType, Expr>, SymbolicError> {
        let resolved = self.tenary_ops.resolve_all(self.pipes.values())?;
        Ok(self
            .pipes
            .iter()
            .map(|(pipe, cost)| {
                let flat = resolved.get(cost).cloned().unwrap_or_else(|| cost.clone());
                (*pipe, flat)
            })
            .collect())
    }

    pub fn substitute(&self, var: &str, value: &Expr) -> Result<PerfResult, SymbolicError> {
        let mut values = FxHashMap::default();
        values.insert(var.to_string(), value.clone());
        self.substitute_all(&values)
    }

    /// Substitute into the pipe costs and into every table entry, so the
    /// result can still be resolved afterwards.
    pub fn substitute_all(
        &self,
        values: &FxHashMap<String, Expr>,
    ) -> Result<PerfResult, SymbolicError> {
        Ok(PerfResult {
            pipes: self
                .pipes
                .iter()
                .map(|(pipe, cost)| cost.substitute_all(values).map(|c| (*pipe, c)))
                .collect::<Result<_, SymbolicError>>()?,
            tenary_ops: self.tenary_ops.substitute_all(values)?,
        })
    }

    /// Substitute, resolve and read every pipe back as a number. Fails with
    /// `Unevaluated` if any symbol is left unassigned.
    pub fn evaluate(
        &self,
        values: &FxHashMap<String, Expr>,
    ) -> Result<BTreeMap<PipeType, f64>, CostError> {
        self.substitute_all(values)?
            .resolve()?
            .into_iter()
            .map(|(pipe, cost)| match cost.to_f64() {
                Some(v) => Ok((pipe, v)),
                None => Err(CostError::Unevaluated {
                    pipe,
                    expr: cost.to_string(),
                }),
            })
            .collect()
    }
}

impl std::fmt::Display for PerfResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (pipe, cost) in &self.pipes {
            writeln!(f, "{pipe}: {cost}")?;
        }
        for (placeholder, op) in self.tenary_ops.iter() {
            writeln!(f, "{placeholder} = {op}")?;
        }
        Ok(())
    }
}

/// Shared preamble of every cost function: nothing is built unless there is
/// at least one input, one output, and every output has a shape.
pub(crate) fn validate(
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
) -> Result<(), CostError> {
    if inputs.is_empty() {
        return Err(CostError::EmptyInput);
    }
    if outputs.is_empty() {
        return Err(CostError::EmptyOutput);
    }
    if let Some(index) = outputs.iter().position(|o| o.dims.is_empty()) {
        return Err(CostError::EmptyDims { index });
    }
    Ok(())
}

pub(crate) type CostTable = FxHashMap<&'static str, CostFn>;

// Registers one closure per op name, each forwarding to a family law with
// its name baked in.
macro_rules! register_ops {
    ($table:expr, $law:path, [$($op:literal),* $(,)?]) => {
        $(
            let f: $crate::perf::CostFn = |inputs, outputs, ctx| $law($op, inputs, outputs, ctx);
            $table.insert($op, f);
        )*
    };
}
pub(crate) use register_ops;

static REGISTRY: OnceLock<CostTable> = OnceLock::new();

fn registry() -> &'static CostTable {
    REGISTRY.get_or_init(|| {
        let mut table = CostTable::default();
        elementwise::register(&mut table);
        broadcast::register(&mut table);
        data_move::register(&mut table);
        matmul::register(&mut table);
        select::register(&mut table);
        table
    })
}

/// Find the cost function for an op kind. Unknown kinds give `None`.
pub fn lookup(op_kind: &str) -> Option<CostFn> {
    let found = registry().get(op_kind).copied();
    tracing::debug!(op_kind, found = found.is_some(), "cost registry lookup");
    found
}

/// All registered op kinds, sorted
pub fn registered_ops() -> Vec<&'static str> {
    registry().keys().copied().sorted().collect()
}
