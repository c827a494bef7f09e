mod config;
pub use config::HardwareConfig;
mod error;
pub use error::{ConfigError, CostError, ModelError};
mod model;
pub use model::{GraphPerf, PerfModel};
pub mod perf;
mod pipeline;
pub use pipeline::PipeType;
pub mod shape;

pub use tileperf_symbolic as symbolic;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::model::*;
    pub use crate::perf::{lookup, CostFn, PerfResult};
    pub use crate::pipeline::*;
    pub use crate::shape::*;
    pub use tileperf_symbolic::{Expr, Number, TernaryRegistry};
}
