//! Multiplexing
//!
//! - `TrackWriter` gates and routes samples into per-track queues
//! - a single worker thread writes them into the container file
//! - `container` defines the on-disk format and a reader for it

pub mod container;
pub mod track;
pub mod writer;

pub use container::{read_summary, ContainerReader, ContainerSummary, FILE_EXTENSION};
pub use track::{DropReason, IngestOutcome, TrackState};
pub use writer::{PreviewArtifact, TrackReport, TrackWriter, WriterOptions, WriterState};
