//! Update propagation: the value tree, path anchoring and the batched
//! evaluation engine.

pub mod propagator;
pub mod tree;

pub use propagator::{
    BranchSelection, ChangeEvent, DEFAULT_BATCH_CEILING, Engine, NodeId, OptionKey,
};
pub use tree::{Target, Tree, resolve};
