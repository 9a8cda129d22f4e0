use std::ops::Range;
use thiserror::Error;

/// Schema-processing failure. Fatal for the option or union it names;
/// surfaces synchronously while the node is being compiled.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// Raw expression text failed to lex or parse.
    #[error(
        "failed to compile computed option `{field}`: {reason}\n  expression: {expression}\n  generated:  {generated}"
    )]
    Expression {
        /// Option (or union condition field) the expression belongs to.
        field: String,
        /// Raw schema-authored expression.
        expression: String,
        /// Generated body after path substitution, fed to the parser.
        generated: String,
        /// Byte range of the failure inside `generated`, when known.
        span: Option<Range<usize>>,
        reason: String,
    },

    /// One or more branch conditions of a union failed to compile.
    #[error("failed to compile `{field}` branch conditions: {reason}\n  branches: {expressions:?}")]
    Branch {
        field: String,
        /// Condition expression of every branch, in branch order.
        expressions: Vec<String>,
        reason: String,
    },
}

impl CompileError {
    /// Wrap an expression error into a branch error carrying every
    /// branch's condition text.
    pub(crate) fn into_branch(self, field: &str, expressions: Vec<String>) -> CompileError {
        let reason = match &self {
            CompileError::Expression { reason, expression, .. } => {
                format!("branch condition `{expression}`: {reason}")
            }
            CompileError::Branch { reason, .. } => reason.clone(),
        };
        CompileError::Branch {
            field: field.to_string(),
            expressions,
            reason,
        }
    }
}

/// A reactive cycle failed to settle within the batch ceiling.
///
/// The only runtime error class: raised from `flush`, terminating that
/// update chain while leaving unrelated nodes untouched.
#[derive(Debug, Clone, Error)]
#[error(
    "computed options for `{node_path}` did not settle after {batches} update batches \
     (dependencies: {dependency_paths:?})"
)]
pub struct DivergenceError {
    pub node_path: String,
    pub dependency_paths: Vec<String>,
    pub batches: u32,
}
