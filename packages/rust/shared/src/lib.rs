//! Shared types, error model, and configuration for Ushanka.
//!
//! This crate is the foundation depended on by all other Ushanka crates.
//! It provides:
//! - [`UshankaError`] — the unified error type
//! - Domain types ([`Pid`], [`PackageType`], [`DescriptiveRecord`], [`JobId`])
//! - Configuration ([`AppConfig`] and section structs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArchivematicaConfig, ArchivesSpaceConfig, FedoraConfig, IngestConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_secret,
};
pub use error::{Result, UshankaError};
pub use types::{DescriptiveRecord, JobId, PackageType, Pid};
