//! Bulk-upload XML emission: one file per consumed page, an mrss envelope
//! around one `<item>` per touched entry. The files are consumed by the
//! catalog platform's bulk importer outside this program.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quick_xml::escape::escape;

/// The full replacement tag list as a `<tags>` fragment.
pub fn tags_fragment(tags: &str) -> String {
    let mut xml = String::from("<tags>");
    for tag in tags.split(',') {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        xml.push_str("<tag>");
        xml.push_str(&escape(tag));
        xml.push_str("</tag>");
    }
    xml.push_str("</tags>");
    xml
}

/// A whole-document metadata update as a `<customDataItems>` fragment.
pub fn custom_data_fragment(profile_id: i32, profile_label: &str, document: &str) -> String {
    format!(
        "<customDataItems><action>update</action>\
         <customData metadataProfileId=\"{profile_id}\" metadataProfile=\"{label}\">\
         <xmlData>{document}</xmlData></customData></customDataItems>",
        label = escape(profile_label),
    )
}

pub fn item_fragment(entry_id: &str, tags: Option<&str>, custom_data: Option<&str>) -> String {
    let mut xml = format!(
        "<item><action>update</action><entryId>{}</entryId>",
        escape(entry_id)
    );
    if let Some(tags) = tags {
        xml.push_str(tags);
    }
    if let Some(custom_data) = custom_data {
        xml.push_str(custom_data);
    }
    xml.push_str("</item>");
    xml
}

/// Writes one page's items, named by date and page position. The page total
/// is the estimate taken from the first page's total count; when the stream
/// outgrows it the page number wins so names stay unique.
pub fn write_page_file(
    dir: &Path,
    date_stamp: &str,
    page_number: usize,
    estimated_pages: usize,
    items: &[String],
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create bulk output directory {}", dir.display()))?;
    let pages = estimated_pages.max(page_number);
    let path = dir.join(format!(
        "{date_stamp}_CustomMetadata_{page_number}of{pages}.xml"
    ));

    let mut body = String::from("<mrss version=\"1.0\"><channel>");
    for item in items {
        body.push_str(item);
    }
    body.push_str("</channel></mrss>");

    fs::write(&path, body)
        .with_context(|| format!("failed to write bulk upload file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_fragment_trims_and_escapes() {
        assert_eq!(
            tags_fragment("seminar, a&b , ,zoom"),
            "<tags><tag>seminar</tag><tag>a&amp;b</tag><tag>zoom</tag></tags>"
        );
    }

    #[test]
    fn custom_data_fragment_wraps_the_document() {
        let fragment = custom_data_fragment(
            7,
            "Campus_Custom_Metadata",
            "<metadata><MediaType>Zoom Recording</MediaType></metadata>",
        );
        assert_eq!(
            fragment,
            "<customDataItems><action>update</action>\
             <customData metadataProfileId=\"7\" metadataProfile=\"Campus_Custom_Metadata\">\
             <xmlData><metadata><MediaType>Zoom Recording</MediaType></metadata></xmlData>\
             </customData></customDataItems>"
        );
    }

    #[test]
    fn item_fragment_includes_only_generated_parts() {
        assert_eq!(
            item_fragment("0_a", Some("<tags><tag>zoom</tag></tags>"), None),
            "<item><action>update</action><entryId>0_a</entryId>\
             <tags><tag>zoom</tag></tags></item>"
        );
        assert_eq!(
            item_fragment("0_b", None, None),
            "<item><action>update</action><entryId>0_b</entryId></item>"
        );
    }

    #[test]
    fn page_file_is_named_by_date_and_position() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let items = vec![item_fragment("0_a", None, None)];

        let path = write_page_file(dir.path(), "2024-04-05", 2, 3, &items)?;
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2024-04-05_CustomMetadata_2of3.xml"
        );

        let body = fs::read_to_string(&path)?;
        assert_eq!(
            body,
            "<mrss version=\"1.0\"><channel>\
             <item><action>update</action><entryId>0_a</entryId></item>\
             </channel></mrss>"
        );
        Ok(())
    }

    #[test]
    fn page_number_beyond_the_estimate_keeps_names_unique() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let items = vec![item_fragment("0_a", None, None)];

        let path = write_page_file(dir.path(), "2024-04-05", 5, 3, &items)?;
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2024-04-05_CustomMetadata_5of5.xml"
        );
        Ok(())
    }
}
