//! Reactive computed-property engine for schema-driven node trees.
//!
//! Schema nodes declare computed options (boolean gates, derived values,
//! watch lists) and union branch conditions as small expressions over
//! other nodes. Expressions are compiled once: path tokens are extracted
//! into a per-node catalog and substituted with indexed accessors, the
//! result is parsed into an AST and interpreted against a positional
//! dependency-values array. At runtime the [`engine::Engine`] commits
//! external writes immediately, batches dependent re-evaluation,
//! suppresses no-op commits by deep equality and caps runaway cycles.

pub mod engine;
pub mod error;
pub mod expr;
pub mod schema;
pub mod value;

pub use engine::{BranchSelection, ChangeEvent, DEFAULT_BATCH_CEILING, Engine};
pub use error::{CompileError, DivergenceError};
pub use value::Value;
