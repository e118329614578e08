//! Writers for the individual report documents
//!
//! Each recorder streams one document through a [`FlushingWriter`] and hands
//! the underlying sink back from `finish`, so callers decide how the file is
//! closed.
//!
//! [`FlushingWriter`]: crate::writer::FlushingWriter

mod dependency;
mod manifest;
mod members;
mod size_map;
mod split_points;
mod story;

pub use dependency::{DependencyRecorder, record_dependencies};
pub use manifest::{ManifestEntry, write_manifest};
pub use members::write_members;
pub use size_map::{SizeClass, classify, record_size_maps};
pub use split_points::write_split_points;
pub use story::{StoryRecorder, record_stories};

/// Prolog every report document starts with
pub(crate) const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
