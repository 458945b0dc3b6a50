//! Core domain types shared across the Ushanka workspace.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UshankaError;

/// URI scheme prefix used by Fedora 3.x for all object references.
pub const FEDORA_URI_PREFIX: &str = "info:fedora/";

// ---------------------------------------------------------------------------
// Pid
// ---------------------------------------------------------------------------

/// A validated Fedora persistent identifier of the form `namespace:id`
/// (e.g. `islandora:test`, `test:27`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    /// Validate and wrap a `namespace:id` string.
    pub fn new(pid: impl Into<String>) -> Result<Self, UshankaError> {
        let pid = pid.into();
        let Some((ns, id)) = pid.split_once(':') else {
            return Err(UshankaError::validation(format!(
                "pid `{pid}` is not of the form namespace:id"
            )));
        };
        if ns.is_empty() || id.is_empty() {
            return Err(UshankaError::validation(format!(
                "pid `{pid}` has an empty namespace or id"
            )));
        }
        let ok = |s: &str| {
            s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '%'))
        };
        if !ok(ns) || !ok(id) {
            return Err(UshankaError::validation(format!(
                "pid `{pid}` contains characters outside the Fedora pid syntax"
            )));
        }
        Ok(Self(pid))
    }

    /// Parse a pid out of an `info:fedora/<pid>` URI.
    pub fn from_uri(uri: &str) -> Result<Self, UshankaError> {
        let stripped = uri.strip_prefix(FEDORA_URI_PREFIX).ok_or_else(|| {
            UshankaError::validation(format!("`{uri}` is not an info:fedora/ URI"))
        })?;
        Self::new(stripped)
    }

    /// The namespace part (before the colon).
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map(|(ns, _)| ns).unwrap_or("")
    }

    /// Render as an `info:fedora/<pid>` URI, as used in RELS-EXT triples.
    pub fn uri(&self) -> String {
        format!("{FEDORA_URI_PREFIX}{}", self.0)
    }

    /// The bare `namespace:id` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Pid {
    type Err = UshankaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// PackageType
// ---------------------------------------------------------------------------

/// The kind of package held by the Archivematica Storage Service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    /// Archival Information Package — preservation copy, stored compressed.
    #[serde(rename = "AIP")]
    Aip,
    /// Dissemination Information Package — access derivatives, stored loose.
    #[serde(rename = "DIP")]
    Dip,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aip => "AIP",
            Self::Dip => "DIP",
        }
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for ingest job identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DescriptiveRecord
// ---------------------------------------------------------------------------

/// Descriptive metadata for one compound object, mapped out of an
/// ArchivesSpace accession and consumed by the MODS/DC builders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptiveRecord {
    /// Title; when empty the object label is used instead.
    #[serde(default)]
    pub title: String,
    /// Abstract / scope-and-content note.
    #[serde(default)]
    pub r#abstract: String,
    /// Creation date (expression or ISO string, as ArchivesSpace provides it).
    #[serde(default)]
    pub date: String,
    /// Publisher name.
    #[serde(default)]
    pub publisher: String,
    /// Language term (iso639-2b text form, e.g. `English`).
    #[serde(default)]
    pub language: String,
    /// Rights statement label (rightsstatements.org vocabulary).
    #[serde(default)]
    pub rights: String,
    /// Local identifier (accession number).
    #[serde(default)]
    pub identifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_roundtrip() {
        let pid = Pid::new("islandora:test").expect("valid pid");
        assert_eq!(pid.namespace(), "islandora");
        assert_eq!(pid.uri(), "info:fedora/islandora:test");
        assert_eq!(Pid::from_uri(&pid.uri()).expect("from uri"), pid);
    }

    #[test]
    fn pid_rejects_malformed() {
        assert!(Pid::new("no-colon").is_err());
        assert!(Pid::new(":27").is_err());
        assert!(Pid::new("test:").is_err());
        assert!(Pid::new("te st:27").is_err());
    }

    #[test]
    fn pid_from_uri_rejects_other_schemes() {
        assert!(Pid::from_uri("https://example.com/test:27").is_err());
        assert!(Pid::from_uri("info:fedora/test:27").is_ok());
    }

    #[test]
    fn package_type_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&PackageType::Aip).unwrap(), "\"AIP\"");
        let dip: PackageType = serde_json::from_str("\"DIP\"").unwrap();
        assert_eq!(dip, PackageType::Dip);
    }

    #[test]
    fn job_id_roundtrip() {
        let id = JobId::new();
        let s = id.to_string();
        let parsed = JobId(s.parse().expect("uuid"));
        assert_eq!(id, parsed);
    }
}
