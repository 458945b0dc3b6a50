//! End-to-end ingest: package pair → compound object in the repository.

mod builder;
mod pipeline;

pub use builder::{
    CompoundSources, DipLayout, build_compound, build_part, build_parts, derive_label,
    match_accession,
};
pub use pipeline::{IngestSummary, Ingestor, ProgressReporter, SilentProgress};
