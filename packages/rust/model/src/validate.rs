//! Structural validation of the object graph, run before any deposit.

use std::collections::BTreeSet;

use tracing::instrument;

use ushanka_shared::{Result, UshankaError};

use crate::datastream::DatastreamId;
use crate::object::{CompoundObject, DipPart};

/// The exact datastream set every compound object carries.
pub const COMPOUND_DATASTREAMS: [DatastreamId; 7] = [
    DatastreamId::Mods,
    DatastreamId::RelsExt,
    DatastreamId::Dc,
    DatastreamId::Aip,
    DatastreamId::Dip,
    DatastreamId::Mets,
    DatastreamId::Policy,
];

/// The mandatory datastream set every DIP part carries.
/// TN and OCR are conditional on the OBJ payload.
pub const PART_REQUIRED_DATASTREAMS: [DatastreamId; 6] = [
    DatastreamId::Mods,
    DatastreamId::RelsExt,
    DatastreamId::Dc,
    DatastreamId::Premis,
    DatastreamId::Policy,
    DatastreamId::Obj,
];

/// Validate a compound object and all of its parts.
///
/// Checks, per the data-model contract:
/// - the datastream set equals exactly {MODS, RELS-EXT, DC, AIP, DIP, METS,
///   POLICY}, with no duplicates
/// - the RELS-EXT declares at least one collection membership
/// - every part names this compound as its parent (one-to-many)
#[instrument(skip_all, fields(pid = %compound.pid))]
pub fn validate_compound(compound: &CompoundObject) -> Result<()> {
    check_no_duplicates(&compound.pid.to_string(), compound.datastreams.iter().map(|d| d.id))?;

    let present: BTreeSet<DatastreamId> = compound.datastreams.iter().map(|d| d.id).collect();
    let expected: BTreeSet<DatastreamId> = COMPOUND_DATASTREAMS.into_iter().collect();

    for missing in expected.difference(&present) {
        return Err(UshankaError::validation(format!(
            "CompoundObject {} is missing the {missing} datastream",
            compound.pid
        )));
    }
    for extra in present.difference(&expected) {
        return Err(UshankaError::validation(format!(
            "CompoundObject {} carries an unexpected {extra} datastream",
            compound.pid
        )));
    }

    compound.rels_ext().check_compound_shape()?;

    for part in &compound.parts {
        if part.parent != compound.pid {
            return Err(UshankaError::validation(format!(
                "DipPart {} names {} as parent but is attached to {}",
                part.pid, part.parent, compound.pid
            )));
        }
        validate_part(part)?;
    }

    Ok(())
}

/// Validate a single DIP part.
///
/// Checks, per the data-model contract:
/// - the mandatory set {MODS, RELS-EXT, DC, PREMIS, POLICY, OBJ} is present
/// - TN is only present when OBJ's media type is image-like (a DIP may ship
///   an image without a thumbnail, so TN itself is optional)
/// - OCR is present iff text extraction produced output for OBJ
/// - nothing outside the permitted set is attached
#[instrument(skip_all, fields(pid = %part.pid))]
pub fn validate_part(part: &DipPart) -> Result<()> {
    check_no_duplicates(&part.pid.to_string(), part.datastreams.iter().map(|d| d.id))?;

    let present: BTreeSet<DatastreamId> = part.datastreams.iter().map(|d| d.id).collect();

    for required in PART_REQUIRED_DATASTREAMS {
        if !present.contains(&required) {
            return Err(UshankaError::validation(format!(
                "DipPart {} is missing the {required} datastream",
                part.pid
            )));
        }
    }

    let Some(obj) = part.datastream(DatastreamId::Obj) else {
        return Err(UshankaError::validation(format!(
            "DipPart {} is missing the OBJ datastream",
            part.pid
        )));
    };

    if present.contains(&DatastreamId::Tn) && !obj.is_image_like() {
        return Err(UshankaError::validation(format!(
            "DipPart {} has a TN datastream but OBJ ({}) is not image-like",
            part.pid, obj.mime_type
        )));
    }

    let has_ocr = present.contains(&DatastreamId::Ocr);
    if part.has_extracted_text != has_ocr {
        return Err(UshankaError::validation(if has_ocr {
            format!(
                "DipPart {} has an OCR datastream but no extracted text was recorded",
                part.pid
            )
        } else {
            format!(
                "DipPart {} has extracted text but no OCR datastream",
                part.pid
            )
        }));
    }

    let permitted: BTreeSet<DatastreamId> = PART_REQUIRED_DATASTREAMS
        .into_iter()
        .chain([DatastreamId::Tn, DatastreamId::Ocr])
        .collect();
    for extra in present.difference(&permitted) {
        return Err(UshankaError::validation(format!(
            "DipPart {} carries an unexpected {extra} datastream",
            part.pid
        )));
    }

    part.rels_ext().check_part_shape()?;

    Ok(())
}

fn check_no_duplicates(pid: &str, ids: impl Iterator<Item = DatastreamId>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(UshankaError::validation(format!(
                "object {pid} has more than one {id} datastream"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastream::Datastream;
    use ushanka_shared::Pid;

    fn pid(s: &str) -> Pid {
        Pid::new(s).expect("test pid")
    }

    fn full_compound() -> CompoundObject {
        let mut compound = CompoundObject::new(
            pid("test:27"),
            "Chronicling COVID-19",
            vec![pid("islandora:test")],
            pid("islandora:compoundCModel"),
        );
        compound.attach(Datastream::inline(DatastreamId::Mods, "application/xml", vec![]));
        compound.attach(Datastream::inline(DatastreamId::RelsExt, "application/rdf+xml", vec![]));
        compound.attach(Datastream::inline(DatastreamId::Dc, "application/xml", vec![]));
        compound.attach(Datastream::from_file(DatastreamId::Aip, "application/x-7z-compressed", "aip.7z".into()));
        compound.attach(Datastream::from_file(DatastreamId::Dip, "application/x-tar", "dip.tar".into()));
        compound.attach(Datastream::from_file(DatastreamId::Mets, "application/xml", "METS.xml".into()));
        compound.attach(Datastream::inline(DatastreamId::Policy, "application/xml", vec![]));
        compound
    }

    fn full_part(obj_mime: &str) -> DipPart {
        let mut part = DipPart::new(
            pid("test:28"),
            "photo.tiff",
            pid("test:27"),
            pid("islandora:binaryObjectCModel"),
        );
        part.attach(Datastream::inline(DatastreamId::Mods, "application/xml", vec![]));
        part.attach(Datastream::inline(DatastreamId::RelsExt, "application/rdf+xml", vec![]));
        part.attach(Datastream::inline(DatastreamId::Dc, "application/xml", vec![]));
        part.attach(Datastream::inline(DatastreamId::Premis, "application/xml", vec![]));
        part.attach(Datastream::inline(DatastreamId::Policy, "application/xml", vec![]));
        part.attach(Datastream::from_file(DatastreamId::Obj, obj_mime, "obj".into()));
        part
    }

    #[test]
    fn complete_compound_validates() {
        validate_compound(&full_compound()).expect("complete set validates");
    }

    #[test]
    fn missing_datastream_rejected() {
        let mut compound = full_compound();
        compound.datastreams.retain(|ds| ds.id != DatastreamId::Mets);
        let err = validate_compound(&compound).unwrap_err();
        assert!(err.to_string().contains("missing the METS"));
    }

    #[test]
    fn extra_datastream_rejected() {
        let mut compound = full_compound();
        compound.attach(Datastream::from_file(DatastreamId::Obj, "image/tiff", "x".into()));
        let err = validate_compound(&compound).unwrap_err();
        assert!(err.to_string().contains("unexpected OBJ"));
    }

    #[test]
    fn duplicate_datastream_rejected() {
        let mut compound = full_compound();
        compound.attach(Datastream::inline(DatastreamId::Dc, "application/xml", vec![]));
        let err = validate_compound(&compound).unwrap_err();
        assert!(err.to_string().contains("more than one DC"));
    }

    #[test]
    fn compound_without_collection_rejected() {
        let mut compound = full_compound();
        compound.collections.clear();
        let err = validate_compound(&compound).unwrap_err();
        assert!(err.to_string().contains("isMemberOfCollection"));
    }

    #[test]
    fn non_image_part_validates_without_tn() {
        validate_part(&full_part("application/pdf")).expect("pdf part without TN");
    }

    #[test]
    fn image_part_validates_with_or_without_tn() {
        // a DIP is free to ship an image without a thumbnail
        validate_part(&full_part("image/tiff")).expect("image part without TN");

        let mut part = full_part("image/tiff");
        part.attach(Datastream::from_file(DatastreamId::Tn, "image/jpeg", "tn.jpg".into()));
        validate_part(&part).expect("image part with TN validates");
    }

    #[test]
    fn tn_on_non_image_rejected() {
        let mut part = full_part("application/pdf");
        part.attach(Datastream::from_file(DatastreamId::Tn, "image/jpeg", "tn.jpg".into()));
        let err = validate_part(&part).unwrap_err();
        assert!(err.to_string().contains("not image-like"));
    }

    #[test]
    fn ocr_iff_extracted_text() {
        let mut part = full_part("application/pdf");
        part.has_extracted_text = true;
        let err = validate_part(&part).unwrap_err();
        assert!(err.to_string().contains("no OCR datastream"));

        part.attach(Datastream::inline(DatastreamId::Ocr, "text/plain", b"text".to_vec()));
        validate_part(&part).expect("pdf with extracted text and OCR validates");

        let mut part = full_part("application/pdf");
        part.attach(Datastream::inline(DatastreamId::Ocr, "text/plain", b"text".to_vec()));
        assert!(validate_part(&part).is_err());
    }

    #[test]
    fn part_with_wrong_parent_rejected() {
        let mut compound = full_compound();
        let mut part = full_part("application/pdf");
        part.parent = pid("test:99");
        compound.parts.push(part);
        let err = validate_compound(&compound).unwrap_err();
        assert!(err.to_string().contains("names test:99 as parent"));
    }
}
