use tileperf_symbolic::SymbolicError;

use crate::PipeType;

/// Failures of a single cost query.
///
/// Validation variants are raised before any expression is built, so a
/// failed query never yields a partial result. An unregistered op kind is
/// not an error: `perf::lookup` simply returns `None`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CostError {
    #[error("cost function called without input tensors")]
    EmptyInput,

    #[error("cost function called without output tensors")]
    EmptyOutput,

    #[error("output {index} declares no dimensions")]
    EmptyDims { index: usize },

    #[error("{op} expects at least {expected} inputs, got {got}")]
    InputCount {
        op: String,
        expected: usize,
        got: usize,
    },

    #[error("{op} input {index} needs at least {expected} dimensions, got {got}")]
    RankTooSmall {
        op: String,
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("contraction dimensions differ: {lhs} vs {rhs}")]
    ContractionMismatch { lhs: String, rhs: String },

    #[error("{pipe} cost did not reduce to a number: {expr}")]
    Unevaluated { pipe: PipeType, expr: String },

    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid hardware config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures while costing a whole graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("node {0} is not in the graph")]
    NodeNotFound(usize),

    #[error("graph has a cycle through {node}")]
    Cycle { node: String },

    #[error("costing {node} failed")]
    Cost {
        node: String,
        #[source]
        source: CostError,
    },
}
