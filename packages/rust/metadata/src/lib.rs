//! Datastream content builders: MODS, Dublin Core, rights, technical pairs.
//!
//! Everything a compound object or DIP part carries besides its payloads is
//! generated here from a [`DescriptiveRecord`](ushanka_shared::DescriptiveRecord):
//! - [`build_mods`] / [`build_dc`] — descriptive datastream bodies
//! - [`lookup_rights`] — rightsstatements.org vocabulary resolution
//! - [`TechPairs`] — EXIF/file-system style key-value technical metadata

mod dc;
mod mods;
mod rights;
mod tech;

pub use dc::build_dc;
pub use mods::{ModsOptions, build_mods};
pub use rights::{DEFAULT_RIGHTS, lookup_rights};
pub use tech::TechPairs;
