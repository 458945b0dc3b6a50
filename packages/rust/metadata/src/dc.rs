//! Dublin Core (oai_dc) record builder.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use ushanka_shared::{DescriptiveRecord, Pid, Result};

use crate::mods::{text_element, write};
use crate::rights::lookup_rights;

const OAI_DC_NS: &str = "http://www.openarchives.org/OAI/2.0/oai_dc/";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Build the DC datastream for an object.
///
/// Fedora replaces the stock DC record it generates at ingest with this one,
/// so the pid goes into `dc:identifier` alongside the accession identifier.
pub fn build_dc(record: &DescriptiveRecord, label: &str, pid: &Pid) -> Result<Vec<u8>> {
    let title = if record.title.is_empty() {
        label
    } else {
        &record.title
    };

    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(&mut w, Event::Decl(BytesDecl::new("1.0", None, None)))?;

    let mut root = BytesStart::new("oai_dc:dc");
    root.push_attribute(("xmlns:oai_dc", OAI_DC_NS));
    root.push_attribute(("xmlns:dc", DC_NS));
    write(&mut w, Event::Start(root))?;

    text_element(&mut w, "dc:title", title)?;
    if !record.r#abstract.is_empty() {
        text_element(&mut w, "dc:description", &record.r#abstract)?;
    }
    if !record.date.is_empty() {
        text_element(&mut w, "dc:date", &record.date)?;
    }
    let (rights_label, _) = lookup_rights(&record.rights);
    text_element(&mut w, "dc:rights", rights_label)?;
    if !record.identifier.is_empty() {
        text_element(&mut w, "dc:identifier", &record.identifier)?;
    }
    text_element(&mut w, "dc:identifier", pid.as_str())?;

    write(&mut w, Event::End(BytesEnd::new("oai_dc:dc")))?;
    Ok(w.into_inner())
}
