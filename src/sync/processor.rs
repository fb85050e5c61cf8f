//! Output modes for the per-entry transform: apply plans through the API
//! immediately, or collect bulk-upload XML and flush it once per page.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::catalog::{CatalogApi, CategoryAdd, MediaEntry};
use crate::sync::bulk_xml;
use crate::sync::transform::{self, MetadataPlan};

/// Handles entries admitted by the sync driver. Errors returned from
/// `process` are isolated per entry by the driver; errors from `end_page`
/// abort the run.
#[async_trait]
pub trait EntryProcessor: Send {
    async fn process(&mut self, entry: &MediaEntry) -> Result<()>;

    /// Called after each fully consumed page. Batch modes flush here.
    async fn end_page(&mut self, page_number: usize, estimated_pages: usize) -> Result<()> {
        let _ = (page_number, estimated_pages);
        Ok(())
    }
}

async fn ensure_category<C: CatalogApi + ?Sized>(
    catalog: &C,
    entry_id: &str,
    category_id: i32,
) -> Result<()> {
    let added = catalog
        .add_entry_to_category(entry_id, category_id)
        .await
        .context("category add failed")?;
    if added == CategoryAdd::Added {
        info!(entry_id, "added to target category");
    }
    Ok(())
}

/// Applies each plan immediately through the catalog API.
pub struct DirectProcessor<'a, C: CatalogApi + ?Sized> {
    catalog: &'a C,
    profile_id: i32,
    /// Set on streams that must also file the entry into the target
    /// category; None on streams already scoped to it.
    category_id: Option<i32>,
}

impl<'a, C: CatalogApi + ?Sized> DirectProcessor<'a, C> {
    pub fn new(catalog: &'a C, profile_id: i32, category_id: Option<i32>) -> Self {
        DirectProcessor {
            catalog,
            profile_id,
            category_id,
        }
    }
}

#[async_trait]
impl<C: CatalogApi + ?Sized> EntryProcessor for DirectProcessor<'_, C> {
    async fn process(&mut self, entry: &MediaEntry) -> Result<()> {
        if let Some(category_id) = self.category_id {
            ensure_category(self.catalog, &entry.id, category_id).await?;
        }

        if let Some(tags) = transform::plan_tags(&entry.tags) {
            info!(entry_id = %entry.id, "adding marker tag");
            self.catalog
                .update_entry_tags(&entry.id, &tags)
                .await
                .context("tag update failed")?;
        }

        let existing = self
            .catalog
            .find_metadata(self.profile_id, &entry.id)
            .await
            .context("metadata lookup failed")?;
        match transform::plan_metadata(existing.as_ref())? {
            Some(MetadataPlan::Create { xml }) => {
                info!(entry_id = %entry.id, "adding marker metadata record");
                self.catalog
                    .add_metadata(self.profile_id, &entry.id, &xml)
                    .await
                    .context("metadata add failed")?;
            }
            Some(MetadataPlan::Replace { record_id, xml }) => {
                info!(entry_id = %entry.id, "updating metadata record");
                self.catalog
                    .update_metadata(record_id, &xml)
                    .await
                    .context("metadata update failed")?;
            }
            None => {}
        }
        Ok(())
    }
}

/// Defers tag and metadata mutations into bulk-upload XML, one file per
/// page. Metadata lookups still hit the live API; category membership has
/// no bulk form and is ensured directly.
pub struct XmlBatchProcessor<'a, C: CatalogApi + ?Sized> {
    catalog: &'a C,
    profile_id: i32,
    profile_label: String,
    category_id: Option<i32>,
    output_dir: PathBuf,
    date_stamp: String,
    items: Vec<String>,
}

impl<'a, C: CatalogApi + ?Sized> XmlBatchProcessor<'a, C> {
    pub fn new(
        catalog: &'a C,
        profile_id: i32,
        profile_name: &str,
        category_id: Option<i32>,
        output_dir: PathBuf,
        date_stamp: String,
    ) -> Self {
        XmlBatchProcessor {
            catalog,
            profile_id,
            // The bulk format references profiles by system name.
            profile_label: profile_name.replace(' ', "_"),
            category_id,
            output_dir,
            date_stamp,
            items: Vec::new(),
        }
    }
}

#[async_trait]
impl<C: CatalogApi + ?Sized> EntryProcessor for XmlBatchProcessor<'_, C> {
    async fn process(&mut self, entry: &MediaEntry) -> Result<()> {
        if let Some(category_id) = self.category_id {
            ensure_category(self.catalog, &entry.id, category_id).await?;
        }

        let tags_fragment = transform::plan_tags(&entry.tags)
            .map(|tags| bulk_xml::tags_fragment(&tags));

        let existing = self
            .catalog
            .find_metadata(self.profile_id, &entry.id)
            .await
            .context("metadata lookup failed")?;
        let metadata_fragment = transform::plan_metadata(existing.as_ref())?.map(|plan| {
            bulk_xml::custom_data_fragment(self.profile_id, &self.profile_label, plan.xml())
        });

        if tags_fragment.is_none() && metadata_fragment.is_none() {
            return Ok(());
        }
        self.items.push(bulk_xml::item_fragment(
            &entry.id,
            tags_fragment.as_deref(),
            metadata_fragment.as_deref(),
        ));
        Ok(())
    }

    async fn end_page(&mut self, page_number: usize, estimated_pages: usize) -> Result<()> {
        if self.items.is_empty() {
            return Ok(());
        }
        let path = bulk_xml::write_page_file(
            &self.output_dir,
            &self.date_stamp,
            page_number,
            estimated_pages,
            &self.items,
        )?;
        info!(file = %path.display(), items = self.items.len(), "bulk upload file saved");
        self.items.clear();
        Ok(())
    }
}
