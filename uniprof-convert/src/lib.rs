//! Raw-to-canonical converters (spec.md §4.5): perf-script, V8 ticks, folded
//! stacks, and Instruments XML, all producing `uniprof_schema::SpeedscopeFile`
//! documents. Converters intentionally have no dependency on
//! `uniprof-plugins` (spec.md §9 "Cyclic dependencies").

pub mod error;
pub mod folded_stack;
pub mod instruments_xml;
pub mod perf_event;
pub mod perf_script;
pub mod v8_ticks;

pub use error::ConvertError;
pub use perf_event::{PerfEvent, PerfStackFrame};
