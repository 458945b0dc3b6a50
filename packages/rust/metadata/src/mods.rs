//! MODS 3.5 record builder.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use ushanka_shared::{DescriptiveRecord, Pid, Result, UshankaError};

use crate::rights::lookup_rights;

const MODS_NS: &str = "http://www.loc.gov/mods/v3";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://www.loc.gov/mods/v3 http://www.loc.gov/standards/mods/v3/mods-3-5.xsd";

/// Optional extras for a MODS record.
#[derive(Debug, Clone, Default)]
pub struct ModsOptions {
    /// PREMIS originalName, mirrored into a `<note type="originalName">`
    /// for migration traceability.
    pub original_name: Option<String>,
}

/// Build a MODS record for an object.
///
/// The record's title falls back to the object label when empty, and the
/// rights statement is resolved against the rightsstatements.org vocabulary.
pub fn build_mods(
    record: &DescriptiveRecord,
    label: &str,
    pid: &Pid,
    opts: &ModsOptions,
) -> Result<Vec<u8>> {
    let (rights_label, rights_uri) = lookup_rights(&record.rights);
    let title = if record.title.is_empty() {
        label
    } else {
        &record.title
    };

    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(&mut w, Event::Decl(BytesDecl::new("1.0", None, None)))?;

    let mut mods = BytesStart::new("mods");
    mods.push_attribute(("xmlns", MODS_NS));
    mods.push_attribute(("xmlns:xlink", XLINK_NS));
    mods.push_attribute(("xmlns:xsi", XSI_NS));
    mods.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    write(&mut w, Event::Start(mods))?;

    write(&mut w, Event::Start(BytesStart::new("titleInfo")))?;
    text_element(&mut w, "title", title)?;
    write(&mut w, Event::End(BytesEnd::new("titleInfo")))?;

    if !record.r#abstract.is_empty() {
        text_element(&mut w, "abstract", &record.r#abstract)?;
    }

    write(&mut w, Event::Start(BytesStart::new("originInfo")))?;
    text_element(&mut w, "dateCreated", &record.date)?;
    text_element(&mut w, "publisher", &record.publisher)?;
    write(&mut w, Event::End(BytesEnd::new("originInfo")))?;

    write(&mut w, Event::Start(BytesStart::new("language")))?;
    let mut term = BytesStart::new("languageTerm");
    term.push_attribute(("authority", "iso639-2b"));
    term.push_attribute(("type", "text"));
    write(&mut w, Event::Start(term))?;
    write(&mut w, Event::Text(BytesText::new(&record.language)))?;
    write(&mut w, Event::End(BytesEnd::new("languageTerm")))?;
    write(&mut w, Event::End(BytesEnd::new("language")))?;

    let mut access = BytesStart::new("accessCondition");
    access.push_attribute(("type", "use and reproduction"));
    access.push_attribute(("xlink:href", rights_uri));
    write(&mut w, Event::Start(access))?;
    write(&mut w, Event::Text(BytesText::new(rights_label)))?;
    write(&mut w, Event::End(BytesEnd::new("accessCondition")))?;

    if let Some(original_name) = &opts.original_name {
        let mut note = BytesStart::new("note");
        note.push_attribute(("type", "originalName"));
        write(&mut w, Event::Start(note))?;
        write(&mut w, Event::Text(BytesText::new(original_name)))?;
        write(&mut w, Event::End(BytesEnd::new("note")))?;
    }

    let mut identifier = BytesStart::new("identifier");
    identifier.push_attribute(("type", "pid"));
    write(&mut w, Event::Start(identifier))?;
    write(&mut w, Event::Text(BytesText::new(pid.as_str())))?;
    write(&mut w, Event::End(BytesEnd::new("identifier")))?;

    write(&mut w, Event::End(BytesEnd::new("mods")))?;
    Ok(w.into_inner())
}

pub(crate) fn write(w: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    w.write_event(event)
        .map_err(|e| UshankaError::parse(format!("metadata write: {e}")))
}

pub(crate) fn text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    write(w, Event::Start(BytesStart::new(name)))?;
    write(w, Event::Text(BytesText::new(text)))?;
    write(w, Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DescriptiveRecord {
        DescriptiveRecord {
            title: "Chronicling COVID-19".into(),
            r#abstract: "Community-submitted materials documenting the pandemic.".into(),
            date: "2021-02-15".into(),
            publisher: "University Libraries".into(),
            language: "English".into(),
            rights: "In Copyright".into(),
            identifier: "2021.003".into(),
        }
    }

    #[test]
    fn mods_carries_descriptive_fields() {
        let pid = Pid::new("test:27").unwrap();
        let xml = String::from_utf8(
            build_mods(&record(), "fallback-label", &pid, &ModsOptions::default()).unwrap(),
        )
        .unwrap();

        assert!(xml.contains("<title>Chronicling COVID-19</title>"));
        assert!(xml.contains("<publisher>University Libraries</publisher>"));
        assert!(xml.contains(r#"authority="iso639-2b""#));
        assert!(xml.contains(r#"xlink:href="http://rightsstatements.org/vocab/InC/1.0/""#));
        assert!(xml.contains(r#"<identifier type="pid">test:27</identifier>"#));
        assert!(!xml.contains("originalName"));
    }

    #[test]
    fn empty_title_falls_back_to_label() {
        let mut rec = record();
        rec.title.clear();
        let pid = Pid::new("test:27").unwrap();
        let xml = String::from_utf8(
            build_mods(&rec, "Chronicling_COVID-19-2aaa349a", &pid, &ModsOptions::default())
                .unwrap(),
        )
        .unwrap();
        assert!(xml.contains("<title>Chronicling_COVID-19-2aaa349a</title>"));
    }

    #[test]
    fn original_name_mirrored_into_note() {
        let pid = Pid::new("test:28").unwrap();
        let opts = ModsOptions {
            original_name: Some("photos/interview-01.tiff".into()),
        };
        let xml =
            String::from_utf8(build_mods(&record(), "label", &pid, &opts).unwrap()).unwrap();
        assert!(
            xml.contains(r#"<note type="originalName">photos/interview-01.tiff</note>"#)
        );
    }

    #[test]
    fn titles_are_escaped() {
        let mut rec = record();
        rec.title = "Maps & Surveys <1900>".into();
        let pid = Pid::new("test:29").unwrap();
        let xml =
            String::from_utf8(build_mods(&rec, "label", &pid, &ModsOptions::default()).unwrap())
                .unwrap();
        assert!(xml.contains("Maps &amp; Surveys &lt;1900&gt;"));
    }
}
