//! Pure planning for the per-entry transform. Each ensure inspects current
//! state and yields either a mutation plan or nothing; applying a plan twice
//! therefore never happens, and re-running against already-processed state
//! yields no plans at all. Output modes decide how plans are applied.

use std::io::Cursor;

use anyhow::{Context, Result, bail};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::catalog::MetadataRecord;

/// Marker tag appended to the entry's tag list.
pub const MARKER_TAG: &str = "zoom";

/// Provenance tag the upstream recording importer stamps on entries it
/// creates. Used as the marketplace stream's secondary filter.
pub const MARKER_ADMIN_TAG: &str = "zoomentry";

/// Marker field inside the custom metadata document. The remote schema is
/// order dependent: when present, this element must be the first child.
pub const MARKER_FIELD: &str = "MediaType";
pub const MARKER_VALUE: &str = "Zoom Recording";

const METADATA_ROOT: &str = "metadata";

/// The document written when an entry has no metadata record yet.
pub fn marker_document() -> String {
    format!("<{METADATA_ROOT}><{MARKER_FIELD}>{MARKER_VALUE}</{MARKER_FIELD}></{METADATA_ROOT}>")
}

/// Returns the updated tag list if the marker tag is missing, None if the
/// entry already carries it. Membership is by trimmed segment, not
/// substring ("zoomentry" does not count as "zoom").
pub fn plan_tags(tags: &str) -> Option<String> {
    if tags.split(',').any(|segment| segment.trim() == MARKER_TAG) {
        return None;
    }
    let trimmed = tags.trim();
    if trimmed.is_empty() {
        Some(MARKER_TAG.to_string())
    } else {
        Some(format!("{trimmed},{MARKER_TAG}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataPlan {
    /// No record exists for (entry, profile); create one.
    Create { xml: String },
    /// A record exists but lacks the marker field; replace the whole
    /// document with the marker inserted first.
    Replace { record_id: i64, xml: String },
}

impl MetadataPlan {
    pub fn xml(&self) -> &str {
        match self {
            MetadataPlan::Create { xml } => xml,
            MetadataPlan::Replace { xml, .. } => xml,
        }
    }
}

/// Decides what, if anything, to do with the entry's metadata record.
pub fn plan_metadata(existing: Option<&MetadataRecord>) -> Result<Option<MetadataPlan>> {
    match existing {
        None => Ok(Some(MetadataPlan::Create {
            xml: marker_document(),
        })),
        Some(record) => {
            if document_has_marker(&record.xml)? {
                return Ok(None);
            }
            Ok(Some(MetadataPlan::Replace {
                record_id: record.id,
                xml: insert_marker_first(&record.xml)?,
            }))
        }
    }
}

/// True if the document contains a marker element whose text equals the
/// marker value.
pub fn document_has_marker(xml: &str) -> Result<bool> {
    let mut reader = Reader::from_str(xml);
    let mut in_marker = false;
    loop {
        match reader.read_event().context("invalid metadata document")? {
            Event::Start(ref e) if e.local_name().as_ref() == MARKER_FIELD.as_bytes() => {
                in_marker = true;
            }
            Event::End(ref e) if e.local_name().as_ref() == MARKER_FIELD.as_bytes() => {
                in_marker = false;
            }
            Event::Text(ref e) if in_marker => {
                if e.unescape().unwrap_or_default().trim() == MARKER_VALUE {
                    return Ok(true);
                }
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
    }
}

/// Re-serializes the document with the marker element inserted as the first
/// child of the root. Everything else, attributes and element order
/// included, passes through untouched; an XML prolog is dropped because the
/// catalog stores the bare fragment.
pub fn insert_marker_first(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut inserted = false;
    loop {
        match reader.read_event().context("invalid metadata document")? {
            Event::Eof => break,
            Event::Decl(_) => {}
            Event::Start(e) if !inserted => {
                writer.write_event(Event::Start(e))?;
                write_marker(&mut writer)?;
                inserted = true;
            }
            Event::Empty(e) if !inserted => {
                // An empty root still gets the marker as its first child.
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e))?;
                write_marker(&mut writer)?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                inserted = true;
            }
            event => writer.write_event(event)?,
        }
    }
    if !inserted {
        bail!("metadata document has no root element");
    }
    String::from_utf8(writer.into_inner().into_inner())
        .context("metadata document is not valid UTF-8")
}

fn write_marker(writer: &mut Writer<Cursor<Vec<u8>>>) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(MARKER_FIELD)))?;
    writer.write_event(Event::Text(BytesText::new(MARKER_VALUE)))?;
    writer.write_event(Event::End(BytesEnd::new(MARKER_FIELD)))?;
    Ok(())
}
