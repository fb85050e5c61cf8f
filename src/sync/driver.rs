//! The paginated sync loop: fetch pages at or after the working checkpoint,
//! hand admitted entries to the processor, advance the watermark, and stop
//! on an empty page or a boundary singleton. One failing entry never stops
//! the run; a failing page fetch does.

use chrono::DateTime;
use tracing::{error, info};

use crate::catalog::{CatalogApi, MediaEntry, MediaEntryFilter, ORDER_BY_CREATED_AT_ASC, Pager};
use crate::sync::processor::EntryProcessor;
use crate::sync::transform::MARKER_ADMIN_TAG;

/// What one stream of the sync scans and admits.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub label: &'static str,
    id_equal: Option<String>,
    category_full_name: Option<String>,
    admin_tags_like: Option<&'static str>,
    /// Secondary, client-side predicate: the entry must carry this
    /// provenance tag or it is skipped without processing.
    required_admin_tag: Option<&'static str>,
}

impl StreamSpec {
    /// One entry by id, no checkpoint window.
    pub fn single_entry(entry_id: String) -> Self {
        StreamSpec {
            label: "single-entry",
            id_equal: Some(entry_id),
            category_full_name: None,
            admin_tags_like: None,
            required_admin_tag: None,
        }
    }

    /// Entries already filed in the target category.
    pub fn category_scoped(category_full_name: &str) -> Self {
        StreamSpec {
            label: "category",
            id_equal: None,
            category_full_name: Some(category_full_name.to_string()),
            admin_tags_like: None,
            required_admin_tag: None,
        }
    }

    /// Entries stamped by the marketplace recording importer, wherever they
    /// were filed.
    pub fn marketplace() -> Self {
        StreamSpec {
            label: "marketplace",
            id_equal: None,
            category_full_name: None,
            admin_tags_like: Some(MARKER_ADMIN_TAG),
            required_admin_tag: Some(MARKER_ADMIN_TAG),
        }
    }

    fn filter_at(&self, checkpoint: i64) -> MediaEntryFilter {
        MediaEntryFilter {
            id_equal: self.id_equal.clone(),
            created_at_greater_than_or_equal: self.id_equal.is_none().then_some(checkpoint),
            categories_full_name_in: self.category_full_name.clone(),
            admin_tags_like: self.admin_tags_like.map(str::to_string),
            order_by: Some(ORDER_BY_CREATED_AT_ASC.to_string()),
        }
    }

    fn admits(&self, entry: &MediaEntry) -> bool {
        self.required_admin_tag
            .is_none_or(|tag| entry.has_admin_tag(tag))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyncStats {
    pub pages: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct SyncOutcome {
    /// Highest creation time covered by this run, to persist for resumption.
    pub checkpoint: i64,
    pub stats: SyncStats,
    /// True when the run aborted on a page-fetch or flush failure.
    pub fatal: bool,
}

pub struct SyncDriver<'a, C: CatalogApi + ?Sized> {
    catalog: &'a C,
    page_size: i32,
}

impl<'a, C: CatalogApi + ?Sized> SyncDriver<'a, C> {
    pub fn new(catalog: &'a C, page_size: i32) -> Self {
        SyncDriver { catalog, page_size }
    }

    pub async fn run(
        &self,
        start_checkpoint: i64,
        spec: &StreamSpec,
        processor: &mut (dyn EntryProcessor + '_),
    ) -> SyncOutcome {
        let mut checkpoint = start_checkpoint;
        let mut stats = SyncStats::default();
        let mut fatal = false;
        let mut last_seen_id: Option<String> = None;
        let mut estimated_pages: Option<usize> = None;

        let pager = Pager {
            page_size: self.page_size,
            page_index: 1,
        };

        info!(
            stream = spec.label,
            checkpoint,
            start = %humanize(checkpoint),
            "processing starts"
        );

        loop {
            let filter = spec.filter_at(checkpoint);
            let page = match self.catalog.list_entries(&filter, &pager).await {
                Ok(page) => page,
                Err(err) => {
                    error!(
                        stream = spec.label,
                        "page fetch failed, aborting run: {err:#}"
                    );
                    // Skip one second past the last known-good point so the
                    // next run does not pull a page that may have caused
                    // this failure.
                    checkpoint += 1;
                    fatal = true;
                    break;
                }
            };

            if estimated_pages.is_none() {
                estimated_pages = Some(page_estimate(page.total_count, self.page_size));
            }
            if page.objects.is_empty() {
                break;
            }
            // The >= filter re-fetches the boundary entry; a page holding
            // only the entry we just finished means the stream is drained.
            if let [only] = page.objects.as_slice() {
                if last_seen_id.as_deref() == Some(only.id.as_str()) {
                    break;
                }
            }

            stats.pages += 1;
            info!(
                stream = spec.label,
                page = stats.pages,
                entries = page.objects.len(),
                watermark = %humanize(checkpoint),
                "page of media entries"
            );

            let before = (checkpoint, last_seen_id.clone());
            for entry in &page.objects {
                if !spec.admits(entry) {
                    stats.skipped += 1;
                    continue;
                }
                info!(entry_id = %entry.id, "processing");
                match processor.process(entry).await {
                    Ok(()) => stats.processed += 1,
                    Err(err) => {
                        stats.failed += 1;
                        error!(
                            entry_id = %entry.id,
                            "entry processing failed, continuing: {err:#}"
                        );
                    }
                }
                checkpoint = checkpoint.max(entry.created_at);
            }
            // Entries the predicate skipped still move the watermark once
            // the whole page is consumed.
            if let Some(last) = page.objects.last() {
                checkpoint = checkpoint.max(last.created_at);
                last_seen_id = Some(last.id.clone());
            }

            if let Err(err) = processor
                .end_page(stats.pages, estimated_pages.unwrap_or(1))
                .await
            {
                error!(
                    stream = spec.label,
                    "page flush failed, aborting run: {err:#}"
                );
                fatal = true;
                break;
            }

            // A page of entries sharing one timestamp can re-fetch
            // identically forever; no watermark movement means the stream
            // cannot make further progress.
            if (checkpoint, last_seen_id.clone()) == before {
                break;
            }
        }

        info!(
            stream = spec.label,
            pages = stats.pages,
            processed = stats.processed,
            skipped = stats.skipped,
            failed = stats.failed,
            checkpoint,
            "stream finished"
        );
        SyncOutcome {
            checkpoint,
            stats,
            fatal,
        }
    }
}

fn page_estimate(total_count: i32, page_size: i32) -> usize {
    let total = total_count.max(0) as usize;
    let size = page_size.max(1) as usize;
    total.div_ceil(size).max(1)
}

fn humanize(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|moment| moment.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
