//! Merge engine for partial record updates

pub mod engine;
pub mod patch;
pub mod types;

pub use engine::{merge, MergeEngine};
pub use patch::parse_patch;
pub use types::{MergeError, MergeOutcome, MergePolicy, DEFAULT_MAX_DEPTH};
