// Minimal symbolic algebra for cost formulas: exact rationals, comparisons and deferred branches

mod error;
pub use error::{Result, SymbolicError};
mod term;
pub use term::{BinaryOp, CmpOp, Number};
mod expression;
pub use expression::*;
mod simplify;
mod ternary;
pub use ternary::{resolve_all_branches, TernaryOp, TernaryRegistry};
