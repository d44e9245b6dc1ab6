//! Profiling lifecycle orchestrator: mode resolution, container path
//! mapping, two-stage signal handling, process-tree walking, and host/
//! container execution (spec.md §4.3, §5).

pub mod error;
pub mod exec;
pub mod lifecycle;
pub mod path_mapping;
pub mod process_tree;
pub mod signal;

pub use error::{ErrorKind, RecordError};
pub use lifecycle::{run, RecordOutcome, RecordRequest};
