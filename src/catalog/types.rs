use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error envelope returned by the catalog API in place of a result object.
/// Kept typed so callers can match on well-known codes.
#[derive(Debug, Clone, Deserialize, Error)]
#[error("catalog API error {code}: {message}")]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Code reported by the category-entry add call when the entry is already a
/// member of the category. Treated as success by the transform.
pub const CATEGORY_ENTRY_ALREADY_EXISTS: &str = "CATEGORY_ENTRY_ALREADY_EXISTS";

/// Sort order for entry list queries. The sync depends on ascending
/// creation time; any other order breaks checkpoint advancement.
pub const ORDER_BY_CREATED_AT_ASC: &str = "+createdAt";

/// Metadata attaches to media entries (as opposed to categories or users).
pub const METADATA_OBJECT_TYPE_ENTRY: i32 = 1;

/// A media entry as returned by the catalog list call. Only the fields the
/// sync reads are modeled; unknown response fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    pub id: String,
    /// Comma-delimited user tags.
    #[serde(default)]
    pub tags: String,
    /// Comma-delimited provenance tags set by upstream import pipelines.
    #[serde(default)]
    pub admin_tags: String,
    /// Creation time, seconds since the epoch.
    #[serde(default)]
    pub created_at: i64,
}

impl MediaEntry {
    /// Exact membership test on the trimmed comma segments. A substring
    /// match would confuse "zoomentry" with "zoom".
    pub fn has_admin_tag(&self, tag: &str) -> bool {
        self.admin_tags
            .split(',')
            .any(|segment| segment.trim() == tag)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_equal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at_greater_than_or_equal: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_full_name_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_tags_like: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    pub page_size: i32,
    pub page_index: i32,
}

/// One page of an entry list response: the entries plus the server's
/// approximate count of everything matching the filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPage {
    #[serde(default)]
    pub objects: Vec<MediaEntry>,
    #[serde(default)]
    pub total_count: i32,
}

/// A custom metadata record: one structured XML document per
/// (object, profile) pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub id: i64,
    #[serde(default)]
    pub xml: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPage {
    #[serde(default)]
    pub objects: Vec<MetadataRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataProfile {
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataProfilePage {
    #[serde(default)]
    pub objects: Vec<MetadataProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i32,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPage {
    #[serde(default)]
    pub objects: Vec<Category>,
}

/// Result of a category-entry add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryAdd {
    Added,
    AlreadyMember,
}
