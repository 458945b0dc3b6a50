//! RELS-EXT: the typed relationship set attached to every object.
//!
//! Fedora 3.x stores external relationships as RDF. Ushanka emits the
//! RDF/XML form as the actual datastream body and the Turtle form for
//! human inspection, and parses back the Turtle subset it emits.

use std::sync::LazyLock;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use regex::Regex;

use ushanka_shared::{Pid, Result, UshankaError};

/// Fedora external-relationship namespace (`isMemberOfCollection`, `isConstituentOf`).
pub const REL_NS: &str = "info:fedora/fedora-system:def/relations-external#";

/// Fedora content-model namespace (`hasModel`).
pub const MODEL_NS: &str = "info:fedora/fedora-system:def/model#";

/// RDF syntax namespace.
const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

// ---------------------------------------------------------------------------
// RelsExt
// ---------------------------------------------------------------------------

/// The relationship set for one object.
///
/// Every object carries exactly one `hasModel`. A compound object carries
/// one-or-more `isMemberOfCollection`; a DIP part carries exactly one
/// `isConstituentOf` pointing at its parent compound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelsExt {
    /// The object the triples describe.
    pub subject: Pid,
    /// The single content model.
    pub model: Pid,
    /// Collection memberships (compound objects).
    pub collections: Vec<Pid>,
    /// Parent compound (DIP parts).
    pub constituent_of: Option<Pid>,
}

impl RelsExt {
    /// Relationships for a compound object: model + collection memberships.
    pub fn compound(subject: Pid, model: Pid, collections: Vec<Pid>) -> Self {
        Self {
            subject,
            model,
            collections,
            constituent_of: None,
        }
    }

    /// Relationships for a DIP part: model + parent compound.
    pub fn part(subject: Pid, model: Pid, parent: Pid) -> Self {
        Self {
            subject,
            model,
            collections: Vec::new(),
            constituent_of: Some(parent),
        }
    }

    /// A compound's RELS-EXT must declare at least one collection membership.
    pub fn check_compound_shape(&self) -> Result<()> {
        if self.collections.is_empty() {
            return Err(UshankaError::validation(format!(
                "RELS-EXT for {} has no isMemberOfCollection triple",
                self.subject
            )));
        }
        Ok(())
    }

    /// A part's RELS-EXT must name its parent compound.
    pub fn check_part_shape(&self) -> Result<()> {
        if self.constituent_of.is_none() {
            return Err(UshankaError::validation(format!(
                "RELS-EXT for {} has no isConstituentOf triple",
                self.subject
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Turtle
    // -----------------------------------------------------------------------

    /// Serialize as Turtle, in the repository's conventional shape.
    pub fn to_turtle(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("@prefix ns0: <{REL_NS}> .\n"));
        out.push_str(&format!("@prefix ns1: <{MODEL_NS}> .\n\n"));
        out.push_str(&format!("<{}>\n", self.subject.uri()));

        let mut clauses: Vec<String> = Vec::new();
        for collection in &self.collections {
            clauses.push(format!(
                "  ns0:isMemberOfCollection <{}>",
                collection.uri()
            ));
        }
        if let Some(parent) = &self.constituent_of {
            clauses.push(format!("  ns0:isConstituentOf <{}>", parent.uri()));
        }
        clauses.push(format!("  ns1:hasModel <{}>", self.model.uri()));

        out.push_str(&clauses.join(" ;\n"));
        out.push_str(" .\n");
        out
    }

    /// Parse the Turtle subset [`to_turtle`](Self::to_turtle) emits.
    ///
    /// Prefix declarations are optional; predicates are matched on their
    /// local names (`isMemberOfCollection`, `isConstituentOf`, `hasModel`),
    /// as illustrated by the documented `test:27` example.
    pub fn from_turtle(input: &str) -> Result<Self> {
        static SUBJECT_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("subject regex"));
        static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?:[A-Za-z0-9_.-]+:(\w+)|<[^>]*[#/](\w+)>)\s+<([^>]+)>")
                .expect("clause regex")
        });

        // Drop prefix declarations and comments; join the statement body.
        let body: String = input
            .lines()
            .filter(|l| {
                let t = l.trim();
                !t.is_empty() && !t.starts_with("@prefix") && !t.starts_with('#')
            })
            .collect::<Vec<_>>()
            .join(" ");

        let subject_uri = SUBJECT_RE
            .captures(&body)
            .and_then(|c| c.get(1))
            .ok_or_else(|| UshankaError::parse("RELS-EXT turtle has no subject URI"))?
            .as_str();
        let subject = Pid::from_uri(subject_uri)?;

        let mut model: Vec<Pid> = Vec::new();
        let mut collections: Vec<Pid> = Vec::new();
        let mut constituent_of: Option<Pid> = None;

        // Skip past the subject before scanning predicate/object pairs.
        let rest = &body[body.find('>').map(|i| i + 1).unwrap_or(0)..];

        for caps in CLAUSE_RE.captures_iter(rest) {
            let predicate = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let object = Pid::from_uri(&caps[3])?;
            match predicate {
                "hasModel" => model.push(object),
                "isMemberOfCollection" => collections.push(object),
                "isConstituentOf" => {
                    if constituent_of.replace(object).is_some() {
                        return Err(UshankaError::validation(format!(
                            "RELS-EXT for {subject} has more than one isConstituentOf triple"
                        )));
                    }
                }
                other => {
                    return Err(UshankaError::parse(format!(
                        "RELS-EXT for {subject} uses unknown predicate `{other}`"
                    )));
                }
            }
        }

        match model.len() {
            1 => {}
            n => {
                return Err(UshankaError::validation(format!(
                    "RELS-EXT for {subject} has {n} hasModel triples, expected exactly 1"
                )));
            }
        }

        Ok(Self {
            subject,
            model: model.remove(0),
            collections,
            constituent_of,
        })
    }

    // -----------------------------------------------------------------------
    // RDF/XML (the actual datastream body)
    // -----------------------------------------------------------------------

    /// Serialize as RDF/XML, the form Fedora stores in the RELS-EXT datastream.
    pub fn to_rdf_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| UshankaError::parse(format!("rels-ext xml decl: {e}")))?;

        let mut rdf = BytesStart::new("rdf:RDF");
        rdf.push_attribute(("xmlns:rdf", RDF_NS));
        rdf.push_attribute(("xmlns:fedora", REL_NS));
        rdf.push_attribute(("xmlns:fedora-model", MODEL_NS));
        writer
            .write_event(Event::Start(rdf))
            .map_err(|e| UshankaError::parse(format!("rels-ext rdf:RDF: {e}")))?;

        let mut desc = BytesStart::new("rdf:Description");
        desc.push_attribute(("rdf:about", self.subject.uri().as_str()));
        writer
            .write_event(Event::Start(desc))
            .map_err(|e| UshankaError::parse(format!("rels-ext rdf:Description: {e}")))?;

        for collection in &self.collections {
            let mut rel = BytesStart::new("fedora:isMemberOfCollection");
            rel.push_attribute(("rdf:resource", collection.uri().as_str()));
            writer
                .write_event(Event::Empty(rel))
                .map_err(|e| UshankaError::parse(format!("rels-ext membership: {e}")))?;
        }

        if let Some(parent) = &self.constituent_of {
            let mut rel = BytesStart::new("fedora:isConstituentOf");
            rel.push_attribute(("rdf:resource", parent.uri().as_str()));
            writer
                .write_event(Event::Empty(rel))
                .map_err(|e| UshankaError::parse(format!("rels-ext constituency: {e}")))?;
        }

        let mut model = BytesStart::new("fedora-model:hasModel");
        model.push_attribute(("rdf:resource", self.model.uri().as_str()));
        writer
            .write_event(Event::Empty(model))
            .map_err(|e| UshankaError::parse(format!("rels-ext model: {e}")))?;

        writer
            .write_event(Event::End(BytesEnd::new("rdf:Description")))
            .map_err(|e| UshankaError::parse(format!("rels-ext close description: {e}")))?;
        writer
            .write_event(Event::End(BytesEnd::new("rdf:RDF")))
            .map_err(|e| UshankaError::parse(format!("rels-ext close rdf: {e}")))?;

        Ok(writer.into_inner())
    }
}
