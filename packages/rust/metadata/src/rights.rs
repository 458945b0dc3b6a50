//! rightsstatements.org vocabulary lookup.

/// The statement used when a record's rights value is not in the vocabulary.
pub const DEFAULT_RIGHTS: (&str, &str) = (
    "Copyright Not Evaluated",
    "http://rightsstatements.org/vocab/CNE/1.0/",
);

/// The twelve rightsstatements.org statements and their vocab URIs.
const VALID_RIGHTS: [(&str, &str); 12] = [
    (
        "Copyright Not Evaluated",
        "http://rightsstatements.org/vocab/CNE/1.0/",
    ),
    (
        "Copyright Undetermined",
        "http://rightsstatements.org/vocab/UND/1.0/",
    ),
    (
        "No Known Copyright",
        "http://rightsstatements.org/vocab/NKC/1.0/",
    ),
    (
        "No Copyright - United States",
        "http://rightsstatements.org/vocab/NoC-US/1.0/",
    ),
    (
        "No Copyright - Other Known Legal Restrictions",
        "http://rightsstatements.org/vocab/NoC-OKLR/1.0/",
    ),
    (
        "No Copyright - Non-Commercial Use Only",
        "http://rightsstatements.org/vocab/NoC-NC/1.0/",
    ),
    (
        "No Copyright - Contractual Restrictions",
        "http://rightsstatements.org/vocab/NoC-CR/1.0/",
    ),
    ("In Copyright", "http://rightsstatements.org/vocab/InC/1.0/"),
    (
        "In Copyright - EU Orphan Work",
        "http://rightsstatements.org/vocab/InC-OW-EU/1.0/",
    ),
    (
        "In Copyright - Educational Use Permitted",
        "http://rightsstatements.org/vocab/InC-EDU/1.0/",
    ),
    (
        "In Copyright - Non-Commercial Use Permitted",
        "http://rightsstatements.org/vocab/InC-NC/1.0/",
    ),
    (
        "In Copyright - Rights-holder(s) Unlocatable or Unidentifiable",
        "http://rightsstatements.org/vocab/InC-RUU/1.0/",
    ),
];

/// Resolve a rights label to `(label, vocab_uri)`.
///
/// Unknown labels fall back to Copyright Not Evaluated rather than failing
/// the ingest.
pub fn lookup_rights(rights: &str) -> (&'static str, &'static str) {
    VALID_RIGHTS
        .iter()
        .find(|(label, _)| *label == rights)
        .copied()
        .unwrap_or(DEFAULT_RIGHTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statement_resolves() {
        let (label, uri) = lookup_rights("In Copyright - EU Orphan Work");
        assert_eq!(label, "In Copyright - EU Orphan Work");
        assert_eq!(uri, "http://rightsstatements.org/vocab/InC-OW-EU/1.0/");
    }

    #[test]
    fn unknown_statement_falls_back_to_cne() {
        let (label, uri) = lookup_rights("All rights reserved, probably");
        assert_eq!(label, "Copyright Not Evaluated");
        assert_eq!(uri, "http://rightsstatements.org/vocab/CNE/1.0/");
    }

    #[test]
    fn empty_statement_falls_back_to_cne() {
        assert_eq!(lookup_rights(""), DEFAULT_RIGHTS);
    }
}
