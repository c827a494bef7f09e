/// Failures raised while building or flattening expressions.
///
/// Construction errors are raised eagerly: an expression that would divide a
/// literal by zero, or a ternary with a non-boolean condition, never exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolicError {
    /// A literal (or literal-folded) divisor was exactly zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A ternary condition was neither a comparison nor another branch.
    #[error("ternary condition must be a comparison or another ternary, got `{cond}`")]
    InvalidCondition { cond: String },

    /// Placeholders reference each other in a loop.
    #[error("placeholder `{placeholder}` refers back to itself while being resolved")]
    UnresolvableCycle { placeholder: String },

    /// A placeholder was referenced that no registry entry defines.
    #[error("placeholder `{placeholder}` has no registered definition")]
    UnregisteredPlaceholder { placeholder: String },
}

pub type Result<T> = std::result::Result<T, SymbolicError>;
