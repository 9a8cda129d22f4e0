//! Schema-level compilation: computed options and union branch
//! conditions, read from `serde_json` schema nodes.

pub mod branch;
pub mod options;

pub use branch::{BranchCond, CompiledUnion, compile_union};
pub use options::{
    Derived, GATE_OPTIONS, Gate, Watch, compile_gate, compile_value, compile_watch,
};
