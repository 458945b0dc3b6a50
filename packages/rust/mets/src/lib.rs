//! Archivematica METS parsing.
//!
//! A DIP carries a `METS.<aip-uuid>.xml` describing the package: an
//! `amdSec` per file with PREMIS technical metadata, and a `fileSec`
//! whose `USE="original"` group lists the original files. This crate
//! extracts the original files with their administrative metadata,
//! package size totals, and per-file PREMIS fragments for reuse as
//! PREMIS datastreams.

mod parser;
mod size;

pub use parser::{AdminMetadata, Fixity, FormatDesignation, FormatRegistry, MetsFile, OriginalFile};
pub use size::pretty_bytes;

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture() -> MetsFile {
        let path = "../../../fixtures/xml/mets.fixture.xml";
        let content =
            std::fs::read_to_string(path).unwrap_or_else(|_| panic!("missing fixture: {path}"));
        MetsFile::parse(&content).expect("fixture METS parses")
    }

    #[test]
    fn finds_original_files() {
        let mets = load_fixture();
        assert_eq!(mets.original_files().len(), 2);

        let names: Vec<&str> = mets
            .original_files()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert!(names.contains(&"interview-01.tiff"));
        assert!(names.contains(&"fieldnotes.pdf"));
    }

    #[test]
    fn skips_files_without_admid() {
        // The fixture's third original file has no ADMID and must be dropped.
        let mets = load_fixture();
        assert!(
            !mets
                .original_files()
                .iter()
                .any(|f| f.name == "orphan.bin")
        );
    }

    #[test]
    fn sizes_and_totals() {
        let mets = load_fixture();
        let total: u64 = mets.original_files().iter().map(|f| f.admin.size).sum();
        assert_eq!(total, mets.total_size());
        assert_eq!(mets.total_size(), 5_242_880 + 1_048_576);
        assert_eq!(mets.pretty_total_size(), "6.00 MiB");
    }

    #[test]
    fn fixity_and_format() {
        let mets = load_fixture();
        let tiff = &mets.original_files()[0];

        let fixity = tiff.admin.fixity.as_ref().expect("fixity present");
        assert_eq!(fixity.algorithm, "sha256");
        assert!(fixity.digest.starts_with("e41f"));

        let format = tiff.admin.format.as_ref().expect("format present");
        assert_eq!(format.name, "TIFF");
        assert_eq!(format.version, "6.0");

        let registry = tiff.admin.registry.as_ref().expect("registry present");
        assert_eq!(registry.name, "PRONOM");
        assert_eq!(
            tiff.admin.pronom_link().as_deref(),
            Some("http://nationalarchives.gov.uk/PRONOM/fmt/353")
        );
    }

    #[test]
    fn pronom_link_absent_for_other_registries() {
        let mets = load_fixture();
        let pdf = &mets.original_files()[1];
        assert_eq!(pdf.admin.registry.as_ref().map(|r| r.name.as_str()), Some("LOCAL"));
        assert!(pdf.admin.pronom_link().is_none());
    }

    #[test]
    fn original_name_strips_transfer_prefix() {
        let mets = load_fixture();
        let tiff = &mets.original_files()[0];
        assert_eq!(
            tiff.admin.original_name.as_deref(),
            Some("photos/interview-01.tiff")
        );
    }

    #[test]
    fn premis_fragment_by_object_uuid() {
        let mets = load_fixture();
        let admin = mets
            .technical_metadata("0e65770d-c706-4067-9c55-1f9380828ca2")
            .expect("uuid resolves to a techMD section");
        assert_eq!(admin.object_uuid.as_deref(), Some("0e65770d-c706-4067-9c55-1f9380828ca2"));

        let fragment = String::from_utf8(admin.premis_xml.clone()).expect("utf8 fragment");
        assert!(fragment.contains("premis:object"));
        assert!(fragment.contains("0e65770d-c706-4067-9c55-1f9380828ca2"));
        assert!(fragment.contains("premis:originalName"));
    }

    #[test]
    fn last_modified_from_creating_application() {
        let mets = load_fixture();
        let tiff = &mets.original_files()[0];
        assert_eq!(tiff.admin.last_modified.as_deref(), Some("2021-02-15T18:51:51"));
    }
}
