//! Story Of Your Compile: reports explaining what ended up in compiled output
//!
//! Given the compiler's program graph and the emitted JavaScript, the crate
//! writes the dependency, story, size, split point and member documents that
//! a report dashboard renders.

pub mod compile_output;
pub mod config;
pub mod members;
pub mod pipeline;
pub mod program;
pub mod reachability;
pub mod recorders;
pub mod snapshot;
pub mod story;
pub mod writer;

pub use config::Config;
pub use pipeline::{ReportOutcome, run_manifest, run_report_pipeline};
