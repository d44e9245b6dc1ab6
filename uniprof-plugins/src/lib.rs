//! Platform plugin contract, registry, and the built-in language/runtime
//! profiler plugins (spec.md §4). A plugin turns a user's target command
//! into a profiler invocation and turns that profiler's raw output back into
//! a canonical `uniprof_schema::SpeedscopeFile` (spec.md §3, §4.1).

pub mod binary_validator;
pub mod container;
pub mod context;
pub mod error;
pub mod plugin;
pub mod plugins;
pub mod quota;
pub mod registry;

pub use context::{ModeSelector, OutputFormat, ProfileContext, ProfilerRunMode, RecordOptions};
pub use error::PluginError;
pub use plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};
pub use registry::PluginRegistry;
