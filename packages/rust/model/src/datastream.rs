//! Datastream identifiers and payloads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ushanka_shared::UshankaError;

// ---------------------------------------------------------------------------
// DatastreamId
// ---------------------------------------------------------------------------

/// The closed set of datastream names used by the Ushanka object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatastreamId {
    /// Descriptive metadata (MODS 3.5).
    Mods,
    /// Fedora external relationships (RDF).
    RelsExt,
    /// Dublin Core descriptive metadata.
    Dc,
    /// The compressed Archival Information Package.
    Aip,
    /// The Dissemination Information Package bundle.
    Dip,
    /// Archivematica-produced METS structural metadata.
    Mets,
    /// XACML access policy.
    Policy,
    /// PREMIS preservation/provenance metadata.
    Premis,
    /// The access payload itself.
    Obj,
    /// Thumbnail derivative (image-like OBJ only).
    Tn,
    /// Extracted text (text-searchable OBJ only).
    Ocr,
}

impl DatastreamId {
    /// Canonical Fedora dsid, as it appears on the object.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mods => "MODS",
            Self::RelsExt => "RELS-EXT",
            Self::Dc => "DC",
            Self::Aip => "AIP",
            Self::Dip => "DIP",
            Self::Mets => "METS",
            Self::Policy => "POLICY",
            Self::Premis => "PREMIS",
            Self::Obj => "OBJ",
            Self::Tn => "TN",
            Self::Ocr => "OCR",
        }
    }

    /// Default human-readable label for the datastream.
    pub fn default_label(&self) -> &'static str {
        match self {
            Self::Mods => "MODS Record",
            Self::RelsExt => "Fedora Object to Object Relationship Metadata",
            Self::Dc => "Dublin Core Record",
            Self::Aip => "Archival Information Package",
            Self::Dip => "Dissemination Information Package",
            Self::Mets => "Archivematica METS File",
            Self::Policy => "XACML Policy Stream",
            Self::Premis => "PREMIS Preservation Metadata",
            Self::Obj => "Access Object",
            Self::Tn => "Thumbnail",
            Self::Ocr => "Extracted Text",
        }
    }

    /// Which Fedora control group the datastream is deposited under.
    pub fn control_group(&self) -> ControlGroup {
        match self {
            Self::Mods | Self::RelsExt | Self::Dc | Self::Policy | Self::Premis => {
                ControlGroup::InlineXml
            }
            Self::Aip | Self::Dip | Self::Mets | Self::Obj | Self::Tn | Self::Ocr => {
                ControlGroup::Managed
            }
        }
    }
}

impl std::fmt::Display for DatastreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DatastreamId {
    type Err = UshankaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MODS" => Ok(Self::Mods),
            "RELS-EXT" => Ok(Self::RelsExt),
            "DC" => Ok(Self::Dc),
            "AIP" => Ok(Self::Aip),
            "DIP" => Ok(Self::Dip),
            "METS" => Ok(Self::Mets),
            "POLICY" => Ok(Self::Policy),
            "PREMIS" => Ok(Self::Premis),
            "OBJ" => Ok(Self::Obj),
            "TN" => Ok(Self::Tn),
            "OCR" => Ok(Self::Ocr),
            other => Err(UshankaError::validation(format!(
                "unknown datastream id `{other}`"
            ))),
        }
    }
}

/// Fedora 3.x datastream control group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlGroup {
    /// `X` — inline XML, stored in FOXML.
    InlineXml,
    /// `M` — managed content, stored by the repository.
    Managed,
}

impl ControlGroup {
    /// The single-letter code the REST API expects.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InlineXml => "X",
            Self::Managed => "M",
        }
    }
}

// ---------------------------------------------------------------------------
// Datastream
// ---------------------------------------------------------------------------

/// Where a datastream's bytes live prior to deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatastreamContent {
    /// Small payloads (metadata records) held in memory.
    Inline(Vec<u8>),
    /// Large payloads (packages, access objects) referenced on disk.
    File(PathBuf),
}

/// A named, typed payload attached to exactly one object.
///
/// Datastreams are owned by value by their parent [`CompoundObject`] or
/// [`DipPart`]; they are never shared between entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datastream {
    /// Which of the fixed datastream slots this fills.
    pub id: DatastreamId,
    /// Human-readable label.
    pub label: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// The payload itself.
    pub content: DatastreamContent,
    /// SHA-256 of the payload, when computed at download time.
    pub checksum: Option<String>,
}

impl Datastream {
    /// Build an in-memory datastream with the id's default label.
    pub fn inline(id: DatastreamId, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id,
            label: id.default_label().to_string(),
            mime_type: mime_type.into(),
            content: DatastreamContent::Inline(bytes),
            checksum: None,
        }
    }

    /// Build a file-backed datastream with the id's default label.
    pub fn from_file(id: DatastreamId, mime_type: impl Into<String>, path: PathBuf) -> Self {
        Self {
            id,
            label: id.default_label().to_string(),
            mime_type: mime_type.into(),
            content: DatastreamContent::File(path),
            checksum: None,
        }
    }

    /// Override the label, keeping everything else.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Record a SHA-256 checksum for the payload.
    pub fn with_checksum(mut self, sha256: impl Into<String>) -> Self {
        self.checksum = Some(sha256.into());
        self
    }

    /// Whether the payload is an image (drives TN presence on DIP parts).
    pub fn is_image_like(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsid_name_roundtrip() {
        for id in [
            DatastreamId::Mods,
            DatastreamId::RelsExt,
            DatastreamId::Dc,
            DatastreamId::Aip,
            DatastreamId::Dip,
            DatastreamId::Mets,
            DatastreamId::Policy,
            DatastreamId::Premis,
            DatastreamId::Obj,
            DatastreamId::Tn,
            DatastreamId::Ocr,
        ] {
            let parsed: DatastreamId = id.as_str().parse().expect("canonical name parses");
            assert_eq!(parsed, id);
        }
        assert_eq!(DatastreamId::RelsExt.as_str(), "RELS-EXT");
    }

    #[test]
    fn dsid_rejects_unknown() {
        assert!("RELS_EXT".parse::<DatastreamId>().is_err());
        assert!("FULL_TEXT".parse::<DatastreamId>().is_err());
    }

    #[test]
    fn control_groups() {
        assert_eq!(DatastreamId::Mods.control_group().code(), "X");
        assert_eq!(DatastreamId::Obj.control_group().code(), "M");
        assert_eq!(DatastreamId::Aip.control_group().code(), "M");
    }

    #[test]
    fn image_detection() {
        let tiff = Datastream::from_file(DatastreamId::Obj, "image/tiff", "scan.tiff".into());
        assert!(tiff.is_image_like());

        let pdf = Datastream::from_file(DatastreamId::Obj, "application/pdf", "doc.pdf".into());
        assert!(!pdf.is_image_like());
    }
}
