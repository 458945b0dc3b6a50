//! Compound objects and DIP parts.

use ushanka_shared::Pid;

use crate::datastream::{Datastream, DatastreamId};
use crate::rels_ext::RelsExt;

// ---------------------------------------------------------------------------
// CompoundObject
// ---------------------------------------------------------------------------

/// Top-level entity representing one ingested SIP/AIP/DIP bundle.
///
/// Created once at ingest time from an Archivematica-produced package pair;
/// never updated or deleted afterwards.
#[derive(Debug, Clone)]
pub struct CompoundObject {
    /// Fedora pid minted at ingest.
    pub pid: Pid,
    /// Object label (transfer name).
    pub label: String,
    /// Collections the object is a member of (at least one).
    pub collections: Vec<Pid>,
    /// Content model designation.
    pub content_model: Pid,
    /// Exclusively-owned datastreams.
    pub datastreams: Vec<Datastream>,
    /// Constituent access objects derived from the DIP.
    pub parts: Vec<DipPart>,
}

impl CompoundObject {
    pub fn new(pid: Pid, label: impl Into<String>, collections: Vec<Pid>, content_model: Pid) -> Self {
        Self {
            pid,
            label: label.into(),
            collections,
            content_model,
            datastreams: Vec::new(),
            parts: Vec::new(),
        }
    }

    /// Attach a datastream, taking ownership of it.
    pub fn attach(&mut self, ds: Datastream) {
        self.datastreams.push(ds);
    }

    /// Look up a datastream by id.
    pub fn datastream(&self, id: DatastreamId) -> Option<&Datastream> {
        self.datastreams.iter().find(|ds| ds.id == id)
    }

    /// The object's relationship set: membership in every collection plus
    /// the content-model triple.
    pub fn rels_ext(&self) -> RelsExt {
        RelsExt::compound(
            self.pid.clone(),
            self.content_model.clone(),
            self.collections.clone(),
        )
    }
}

// ---------------------------------------------------------------------------
// DipPart
// ---------------------------------------------------------------------------

/// A constituent access object derived from a compound object's DIP.
///
/// Each part belongs to exactly one compound (the relation is one-to-many,
/// expressed as an `isConstituentOf` triple).
#[derive(Debug, Clone)]
pub struct DipPart {
    /// Fedora pid minted at ingest.
    pub pid: Pid,
    /// Object label (original file name).
    pub label: String,
    /// Pid of the owning compound object.
    pub parent: Pid,
    /// Content model designation.
    pub content_model: Pid,
    /// Exclusively-owned datastreams.
    pub datastreams: Vec<Datastream>,
    /// Whether text extraction produced output for OBJ (drives OCR presence).
    pub has_extracted_text: bool,
}

impl DipPart {
    pub fn new(pid: Pid, label: impl Into<String>, parent: Pid, content_model: Pid) -> Self {
        Self {
            pid,
            label: label.into(),
            parent,
            content_model,
            datastreams: Vec::new(),
            has_extracted_text: false,
        }
    }

    /// Attach a datastream, taking ownership of it.
    pub fn attach(&mut self, ds: Datastream) {
        self.datastreams.push(ds);
    }

    /// Look up a datastream by id.
    pub fn datastream(&self, id: DatastreamId) -> Option<&Datastream> {
        self.datastreams.iter().find(|ds| ds.id == id)
    }

    /// The part's relationship set: constituency plus the content-model triple.
    pub fn rels_ext(&self) -> RelsExt {
        RelsExt::part(
            self.pid.clone(),
            self.content_model.clone(),
            self.parent.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> Pid {
        Pid::new(s).expect("test pid")
    }

    #[test]
    fn compound_rels_ext_shape() {
        let compound = CompoundObject::new(
            pid("test:27"),
            "Chronicling COVID-19",
            vec![pid("islandora:test")],
            pid("islandora:binaryObjectCModel"),
        );
        let rels = compound.rels_ext();
        rels.check_compound_shape().expect("has a collection");
        assert_eq!(rels.subject, pid("test:27"));
        assert_eq!(rels.model, pid("islandora:binaryObjectCModel"));
    }

    #[test]
    fn part_rels_ext_names_parent() {
        let part = DipPart::new(
            pid("test:28"),
            "interview.wav",
            pid("test:27"),
            pid("islandora:binaryObjectCModel"),
        );
        let rels = part.rels_ext();
        rels.check_part_shape().expect("has a parent");
        assert_eq!(rels.constituent_of, Some(pid("test:27")));
    }

    #[test]
    fn datastream_lookup() {
        use crate::datastream::{Datastream, DatastreamId};

        let mut compound = CompoundObject::new(
            pid("test:27"),
            "test",
            vec![pid("islandora:test")],
            pid("islandora:compoundCModel"),
        );
        compound.attach(Datastream::inline(
            DatastreamId::Dc,
            "application/xml",
            b"<dc/>".to_vec(),
        ));

        assert!(compound.datastream(DatastreamId::Dc).is_some());
        assert!(compound.datastream(DatastreamId::Mods).is_none());
    }
}
