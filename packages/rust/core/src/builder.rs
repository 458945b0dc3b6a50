//! Assembly of compound objects and DIP parts from unpacked packages.
//!
//! Everything here is filesystem-and-METS work with no network: the pipeline
//! mints pids first, then these builders put together the datastream sets the
//! validator enforces.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use ushanka_archivesspace::Accession;
use ushanka_metadata::{ModsOptions, build_dc, build_mods};
use ushanka_mets::{MetsFile, OriginalFile};
use ushanka_model::{CompoundObject, Datastream, DatastreamId, DipPart};
use ushanka_shared::{DescriptiveRecord, Pid, Result, UshankaError};

/// Trailing `-<timestamp>Z-NNN-<uuid>` that Archivematica appends to
/// transfer names.
static TRANSFER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-\d{8}T\d{6}Z(-\d+)*-[0-9a-fA-F]{8}(-[0-9a-fA-F]{4}){3}-[0-9a-fA-F]{12}$")
        .unwrap_or_else(|e| panic!("transfer suffix regex: {e}"))
});

static UUID_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-[0-9a-fA-F]{8}(-[0-9a-fA-F]{4}){3}-[0-9a-fA-F]{12}$")
        .unwrap_or_else(|e| panic!("uuid suffix regex: {e}"))
});

// ---------------------------------------------------------------------------
// Labels and accession matching
// ---------------------------------------------------------------------------

/// Derive an object label from a stored package file name.
///
/// `Chronicling_COVID-19-20210215T185151Z-001-2aaa349a-...-df3fa.7z`
/// becomes `Chronicling_COVID-19`.
pub fn derive_label(file_name: &str) -> String {
    let stem = file_name
        .split_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let stripped = TRANSFER_SUFFIX.replace(stem, "");
    UUID_SUFFIX.replace(&stripped, "").into_owned()
}

fn slugify(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Find the accession whose title matches a transfer label.
///
/// Transfer names are slugged titles, so the comparison is done on the
/// slugged form, case-insensitively.
pub fn match_accession<'a>(accessions: &'a [Accession], label: &str) -> Option<&'a Accession> {
    let label = slugify(label).to_ascii_lowercase();
    accessions.iter().find(|accession| {
        let slug = slugify(&accession.title).to_ascii_lowercase();
        !slug.is_empty() && (label == slug || label.starts_with(&slug))
    })
}

// ---------------------------------------------------------------------------
// DIP layout
// ---------------------------------------------------------------------------

/// The directories and METS file of an unpacked DIP.
#[derive(Debug, Clone)]
pub struct DipLayout {
    pub root: PathBuf,
    pub mets_path: PathBuf,
    pub objects_dir: PathBuf,
    pub thumbnails_dir: Option<PathBuf>,
}

impl DipLayout {
    /// Locate the METS document and payload directories under a DIP root.
    pub fn scan(root: &Path) -> Result<Self> {
        let mets_path = read_dir(root)?
            .into_iter()
            .find(|p| {
                file_name(p).starts_with("METS.") && p.extension().is_some_and(|e| e == "xml")
            })
            .ok_or_else(|| {
                UshankaError::parse(format!("no METS document in DIP at {}", root.display()))
            })?;

        let objects_dir = root.join("objects");
        if !objects_dir.is_dir() {
            return Err(UshankaError::parse(format!(
                "no objects directory in DIP at {}",
                root.display()
            )));
        }

        let thumbnails_dir = Some(root.join("thumbnails")).filter(|p| p.is_dir());

        Ok(Self {
            root: root.to_path_buf(),
            mets_path,
            objects_dir,
            thumbnails_dir,
        })
    }

    /// The DIP payload for an original file: `objects/<uuid>-<name>`.
    pub fn payload_for(&self, object_uuid: &str) -> Result<PathBuf> {
        let prefix = format!("{object_uuid}-");
        read_dir(&self.objects_dir)?
            .into_iter()
            .find(|p| file_name(p).starts_with(&prefix))
            .ok_or_else(|| {
                UshankaError::parse(format!("no DIP payload for object {object_uuid}"))
            })
    }

    /// The generated thumbnail for an original file, if present.
    pub fn thumbnail_for(&self, object_uuid: &str) -> Option<PathBuf> {
        let dir = self.thumbnails_dir.as_ref()?;
        let path = dir.join(format!("{object_uuid}.jpg"));
        path.is_file().then_some(path)
    }

    /// Extracted text for a payload: a `.txt` sidecar next to it.
    pub fn extracted_text_for(&self, payload: &Path) -> Option<PathBuf> {
        if payload.extension().is_some_and(|e| e == "txt") {
            return None;
        }
        let sidecar = payload.with_extension("txt");
        sidecar.is_file().then_some(sidecar)
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| UshankaError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| UshankaError::io(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Local inputs for a compound object's datastreams.
pub struct CompoundSources<'a> {
    pub aip_path: &'a Path,
    pub aip_checksum: &'a str,
    pub dip_path: &'a Path,
    pub dip_checksum: &'a str,
    pub mets_path: &'a Path,
    pub policy: &'a [u8],
}

/// Assemble a compound object with its full datastream set.
pub fn build_compound(
    pid: Pid,
    label: &str,
    collection: Pid,
    content_model: Pid,
    record: &DescriptiveRecord,
    sources: &CompoundSources<'_>,
) -> Result<CompoundObject> {
    let mut compound = CompoundObject::new(pid, label, vec![collection], content_model);

    let mods = build_mods(record, label, &compound.pid, &ModsOptions::default())?;
    compound.attach(Datastream::inline(DatastreamId::Mods, "application/xml", mods));

    let rels = compound.rels_ext().to_rdf_xml()?;
    compound.attach(Datastream::inline(
        DatastreamId::RelsExt,
        "application/rdf+xml",
        rels,
    ));

    let dc = build_dc(record, label, &compound.pid)?;
    compound.attach(Datastream::inline(DatastreamId::Dc, "application/xml", dc));

    compound.attach(
        Datastream::from_file(
            DatastreamId::Aip,
            guess_mime(sources.aip_path),
            sources.aip_path.to_path_buf(),
        )
        .with_label(file_name(sources.aip_path))
        .with_checksum(sources.aip_checksum),
    );
    compound.attach(
        Datastream::from_file(
            DatastreamId::Dip,
            "application/x-tar",
            sources.dip_path.to_path_buf(),
        )
        .with_label(file_name(sources.dip_path))
        .with_checksum(sources.dip_checksum),
    );
    compound.attach(Datastream::from_file(
        DatastreamId::Mets,
        "application/xml",
        sources.mets_path.to_path_buf(),
    ));
    compound.attach(Datastream::inline(
        DatastreamId::Policy,
        "application/xml",
        sources.policy.to_vec(),
    ));

    Ok(compound)
}

/// Assemble one DIP part for an original file.
///
/// TN is attached when the payload is an image and the DIP generated a
/// thumbnail; OCR when extraction left a text sidecar next to the payload.
pub fn build_part(
    pid: Pid,
    parent: Pid,
    content_model: Pid,
    original: &OriginalFile,
    layout: &DipLayout,
    record: &DescriptiveRecord,
    policy: &[u8],
) -> Result<DipPart> {
    let uuid = original.admin.object_uuid.as_deref().ok_or_else(|| {
        UshankaError::parse(format!("original file {} has no object UUID", original.name))
    })?;

    let payload = layout.payload_for(uuid)?;
    let mime = guess_mime(&payload);
    debug!(file = %original.name, %mime, "assembling part");

    let mut part = DipPart::new(pid, original.name.clone(), parent, content_model);

    let mut part_record = record.clone();
    part_record.title = original.name.clone();

    let opts = ModsOptions {
        original_name: original.admin.original_name.clone(),
    };
    let mods = build_mods(&part_record, &original.name, &part.pid, &opts)?;
    part.attach(Datastream::inline(DatastreamId::Mods, "application/xml", mods));

    let rels = part.rels_ext().to_rdf_xml()?;
    part.attach(Datastream::inline(
        DatastreamId::RelsExt,
        "application/rdf+xml",
        rels,
    ));

    let dc = build_dc(&part_record, &original.name, &part.pid)?;
    part.attach(Datastream::inline(DatastreamId::Dc, "application/xml", dc));

    if original.admin.premis_xml.is_empty() {
        return Err(UshankaError::parse(format!(
            "original file {} has no PREMIS fragment",
            original.name
        )));
    }
    part.attach(Datastream::inline(
        DatastreamId::Premis,
        "application/xml",
        original.admin.premis_xml.clone(),
    ));

    part.attach(Datastream::inline(
        DatastreamId::Policy,
        "application/xml",
        policy.to_vec(),
    ));

    let mut obj = Datastream::from_file(DatastreamId::Obj, mime, payload.clone())
        .with_label(&original.name);
    if let Some(fixity) = &original.admin.fixity {
        if fixity.algorithm.eq_ignore_ascii_case("sha256") {
            obj = obj.with_checksum(&fixity.digest);
        }
    }
    let image_like = obj.is_image_like();
    part.attach(obj);

    if image_like {
        if let Some(thumbnail) = layout.thumbnail_for(uuid) {
            part.attach(Datastream::from_file(DatastreamId::Tn, "image/jpeg", thumbnail));
        }
    }

    if let Some(text) = layout.extracted_text_for(&payload) {
        part.attach(Datastream::from_file(DatastreamId::Ocr, "text/plain", text));
        part.has_extracted_text = true;
    }

    Ok(part)
}

/// Assemble every part of a compound from the parsed METS.
pub fn build_parts(
    pids: Vec<Pid>,
    parent: &Pid,
    content_model: &Pid,
    mets: &MetsFile,
    layout: &DipLayout,
    record: &DescriptiveRecord,
    policy: &[u8],
) -> Result<Vec<DipPart>> {
    let originals = mets.original_files();
    if pids.len() != originals.len() {
        return Err(UshankaError::validation(format!(
            "minted {} pids for {} original files",
            pids.len(),
            originals.len()
        )));
    }

    pids.into_iter()
        .zip(originals)
        .map(|(pid, original)| {
            build_part(
                pid,
                parent.clone(),
                content_model.clone(),
                original,
                layout,
                record,
                policy,
            )
        })
        .collect()
}
