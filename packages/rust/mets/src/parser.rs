//! Pull parser for Archivematica METS documents.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, BytesText, Event};
use tracing::debug;

use ushanka_shared::{Result, UshankaError};

use crate::size::pretty_bytes;

/// PREMIS v3 namespace, declared on captured fragments so they stand alone.
const PREMIS_NS: &str = "http://www.loc.gov/premis/v3";

/// Archivematica prefixes original names with the transfer directory.
const TRANSFER_PREFIX: &str = "%transferDirectory%objects/";

// ---------------------------------------------------------------------------
// Parsed structures
// ---------------------------------------------------------------------------

/// PREMIS fixity: message digest algorithm and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixity {
    pub algorithm: String,
    pub digest: String,
}

/// PREMIS format designation: name and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDesignation {
    pub name: String,
    pub version: String,
}

/// PREMIS format registry reference (e.g. PRONOM key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRegistry {
    pub name: String,
    pub key: String,
}

/// One `amdSec`'s technical metadata, flattened out of its PREMIS object.
#[derive(Debug, Clone, Default)]
pub struct AdminMetadata {
    /// The `amdSec` @ID referenced by file @ADMID.
    pub id: String,
    /// PREMIS object identifier (UUID).
    pub object_uuid: Option<String>,
    /// PREMIS originalName with the transfer-directory prefix stripped.
    pub original_name: Option<String>,
    /// File size in bytes.
    pub size: u64,
    /// Message digest recorded at transfer time.
    pub fixity: Option<Fixity>,
    /// Identified format name/version.
    pub format: Option<FormatDesignation>,
    /// Format registry reference.
    pub registry: Option<FormatRegistry>,
    /// `dateCreatedByApplication` from the creating application block.
    pub last_modified: Option<String>,
    /// The raw `premis:object` fragment, reusable as a PREMIS datastream.
    pub premis_xml: Vec<u8>,
}

impl AdminMetadata {
    /// PRONOM URL for the format, when the registry is PRONOM.
    pub fn pronom_link(&self) -> Option<String> {
        let registry = self.registry.as_ref()?;
        if registry.name == "PRONOM" {
            Some(format!(
                "http://nationalarchives.gov.uk/PRONOM/{}",
                registry.key
            ))
        } else {
            None
        }
    }

    /// Size formatted with the best binary prefix.
    pub fn pretty_size(&self) -> String {
        pretty_bytes(self.size)
    }
}

/// An entry from the `USE="original"` file group, joined with its
/// administrative metadata.
#[derive(Debug, Clone)]
pub struct OriginalFile {
    /// File name (last path segment of the xlink href).
    pub name: String,
    /// Path within the package (the xlink href).
    pub path: String,
    /// The file's technical metadata.
    pub admin: AdminMetadata,
}

/// A parsed Archivematica METS document.
#[derive(Debug, Clone)]
pub struct MetsFile {
    original_files: Vec<OriginalFile>,
    sections: Vec<AdminMetadata>,
}

impl MetsFile {
    /// Parse a METS document.
    pub fn parse(xml: &str) -> Result<Self> {
        let raw = RawMets::parse(xml)?;

        // Join original-file entries to their amdSec by ADMID; entries
        // without a resolvable ADMID are dropped, matching the file list
        // Archivematica actually described.
        let mut original_files = Vec::new();
        for entry in &raw.files {
            let admin = raw
                .sections
                .iter()
                .find(|s| entry.admid.split_whitespace().any(|id| id == s.id));
            match admin {
                Some(admin) => original_files.push(OriginalFile {
                    name: entry.name.clone(),
                    path: entry.path.clone(),
                    admin: admin.clone(),
                }),
                None => {
                    debug!(name = %entry.name, admid = %entry.admid, "original file has no amdSec, skipping");
                }
            }
        }

        Ok(Self {
            original_files,
            sections: raw.sections,
        })
    }

    /// The original files described by the `USE="original"` file group.
    pub fn original_files(&self) -> &[OriginalFile] {
        &self.original_files
    }

    /// Total size of the original files, in bytes.
    pub fn total_size(&self) -> u64 {
        self.original_files.iter().map(|f| f.admin.size).sum()
    }

    /// Total size formatted with the best binary prefix.
    pub fn pretty_total_size(&self) -> String {
        pretty_bytes(self.total_size())
    }

    /// Look up technical metadata by PREMIS object identifier (UUID).
    pub fn technical_metadata(&self, object_uuid: &str) -> Option<&AdminMetadata> {
        self.sections
            .iter()
            .find(|s| s.object_uuid.as_deref() == Some(object_uuid))
    }
}

// ---------------------------------------------------------------------------
// Raw pull-parse pass
// ---------------------------------------------------------------------------

/// A `mets:file` entry before joining to its metadata.
struct FileEntry {
    admid: String,
    name: String,
    path: String,
}

#[derive(Default)]
struct RawMets {
    sections: Vec<AdminMetadata>,
    files: Vec<FileEntry>,
}

impl RawMets {
    fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut raw = Self::default();

        // Element path (local names, prefixes stripped).
        let mut path: Vec<String> = Vec::new();

        let mut section: Option<AdminMetadata> = None;
        let mut in_techmd = false;
        let mut in_original_group = false;
        let mut file_admid: Option<String> = None;

        // Active premis:object capture, with its element depth.
        let mut capture: Option<(Writer<Vec<u8>>, usize)> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let local = local_name(&e);
                    path.push(local.clone());

                    match local.as_str() {
                        "amdSec" => {
                            section = Some(AdminMetadata {
                                id: attr(&e, "ID").unwrap_or_default(),
                                ..AdminMetadata::default()
                            });
                        }
                        "techMD" if section.is_some() => in_techmd = true,
                        "fileGrp" => {
                            in_original_group = attr(&e, "USE").as_deref() == Some("original");
                        }
                        "file" if in_original_group => {
                            file_admid = attr(&e, "ADMID");
                        }
                        // Some writers emit FLocat as start/end rather than
                        // self-closing.
                        "FLocat" if in_original_group && file_admid.is_some() => {
                            if let Some(href) = attr_local(&e, "href") {
                                let name = href.rsplit('/').next().unwrap_or(&href).to_string();
                                raw.files.push(FileEntry {
                                    admid: file_admid.clone().unwrap_or_default(),
                                    name,
                                    path: href,
                                });
                            }
                        }
                        "object" if in_techmd && capture.is_none() => {
                            let mut writer = Writer::new(Vec::new());
                            let mut root = e.to_owned();
                            if attr(&e, "xmlns:premis").is_none() {
                                root.push_attribute(("xmlns:premis", PREMIS_NS));
                            }
                            writer
                                .write_event(Event::Start(root))
                                .map_err(|err| UshankaError::parse(format!("premis capture: {err}")))?;
                            capture = Some((writer, 1));
                            continue;
                        }
                        _ => {}
                    }

                    if let Some((writer, depth)) = capture.as_mut() {
                        writer
                            .write_event(Event::Start(e.to_owned()))
                            .map_err(|err| UshankaError::parse(format!("premis capture: {err}")))?;
                        *depth += 1;
                    }
                }
                Ok(Event::Empty(e)) => {
                    let local = local_name(&e);

                    if local == "FLocat" && in_original_group && file_admid.is_some() {
                        if let Some(href) = attr_local(&e, "href") {
                            let name = href.rsplit('/').next().unwrap_or(&href).to_string();
                            raw.files.push(FileEntry {
                                admid: file_admid.clone().unwrap_or_default(),
                                name,
                                path: href,
                            });
                        }
                    }

                    if let Some((writer, _)) = capture.as_mut() {
                        writer
                            .write_event(Event::Empty(e.to_owned()))
                            .map_err(|err| UshankaError::parse(format!("premis capture: {err}")))?;
                    }
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|err| UshankaError::parse(format!("METS text: {err}")))?
                        .into_owned();

                    if let Some((writer, _)) = capture.as_mut() {
                        writer
                            .write_event(Event::Text(BytesText::new(&text)))
                            .map_err(|err| UshankaError::parse(format!("premis capture: {err}")))?;
                    }

                    if in_techmd {
                        if let (Some(sec), Some(leaf)) = (section.as_mut(), path.last()) {
                            assign_leaf(sec, leaf, &text);
                        }
                    }
                }
                Ok(Event::End(e)) => {
                    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

                    if let Some((writer, depth)) = capture.as_mut() {
                        writer
                            .write_event(Event::End(e.to_owned()))
                            .map_err(|err| UshankaError::parse(format!("premis capture: {err}")))?;
                        *depth -= 1;
                        if *depth == 0
                            && let Some((writer, _)) = capture.take()
                            && let Some(sec) = section.as_mut()
                        {
                            sec.premis_xml = writer.into_inner();
                        }
                    }

                    match local.as_str() {
                        "amdSec" => {
                            if let Some(sec) = section.take() {
                                raw.sections.push(sec);
                            }
                        }
                        "techMD" => in_techmd = false,
                        "fileGrp" => in_original_group = false,
                        "file" => file_admid = None,
                        _ => {}
                    }

                    path.pop();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(UshankaError::parse(format!(
                        "METS parse error at byte {}: {err}",
                        reader.buffer_position()
                    )));
                }
            }
        }

        Ok(raw)
    }
}

/// Assign a leaf text value into the section being built. First value wins,
/// so later digiprov/event noise never overwrites the techMD object.
fn assign_leaf(sec: &mut AdminMetadata, leaf: &str, text: &str) {
    match leaf {
        "objectIdentifierValue" => {
            if sec.object_uuid.is_none() {
                sec.object_uuid = Some(text.to_string());
            }
        }
        "originalName" => {
            if sec.original_name.is_none() {
                sec.original_name =
                    Some(text.strip_prefix(TRANSFER_PREFIX).unwrap_or(text).to_string());
            }
        }
        "size" => {
            if sec.size == 0 {
                sec.size = text.parse().unwrap_or(0);
            }
        }
        "messageDigestAlgorithm" => {
            let fixity = sec.fixity.get_or_insert_with(|| Fixity {
                algorithm: String::new(),
                digest: String::new(),
            });
            if fixity.algorithm.is_empty() {
                fixity.algorithm = text.to_string();
            }
        }
        "messageDigest" => {
            let fixity = sec.fixity.get_or_insert_with(|| Fixity {
                algorithm: String::new(),
                digest: String::new(),
            });
            if fixity.digest.is_empty() {
                fixity.digest = text.to_string();
            }
        }
        "formatName" => {
            let format = sec.format.get_or_insert_with(|| FormatDesignation {
                name: String::new(),
                version: String::new(),
            });
            if format.name.is_empty() {
                format.name = text.to_string();
            }
        }
        "formatVersion" => {
            let format = sec.format.get_or_insert_with(|| FormatDesignation {
                name: String::new(),
                version: String::new(),
            });
            if format.version.is_empty() {
                format.version = text.to_string();
            }
        }
        "formatRegistryName" => {
            let registry = sec.registry.get_or_insert_with(|| FormatRegistry {
                name: String::new(),
                key: String::new(),
            });
            if registry.name.is_empty() {
                registry.name = text.to_string();
            }
        }
        "formatRegistryKey" => {
            let registry = sec.registry.get_or_insert_with(|| FormatRegistry {
                name: String::new(),
                key: String::new(),
            });
            if registry.key.is_empty() {
                registry.key = text.to_string();
            }
        }
        "dateCreatedByApplication" => {
            if sec.last_modified.is_none() {
                sec.last_modified = Some(text.to_string());
            }
        }
        _ => {}
    }
}

/// Local element name with any prefix stripped.
fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Attribute value by full qualified name.
fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Attribute value by local name (for namespaced attributes like xlink:href).
fn attr_local(e: &BytesStart<'_>, local: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == local.as_bytes() {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}
