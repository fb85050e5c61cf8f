//! In-memory catalog used by driver and processor tests. Reproduces the
//! server's list semantics (inclusive lower bound, ascending order, bounded
//! pages) against a plain vector of entries.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::client::CatalogApi;
use super::types::{
    CategoryAdd, EntryPage, MediaEntry, MediaEntryFilter, MetadataRecord, Pager,
};

#[derive(Default)]
pub struct FakeCatalog {
    pub entries: Mutex<Vec<MediaEntry>>,
    /// object id -> metadata record (one profile in play).
    pub metadata: Mutex<HashMap<String, MetadataRecord>>,
    /// entry ids already in the target category.
    pub members: Mutex<HashSet<String>>,
    /// Every mutating call, for asserting idempotence.
    pub mutations: Mutex<Vec<String>>,
    /// Fail list_entries calls after this many successes.
    pub fail_fetch_after: Mutex<Option<usize>>,
    fetches: Mutex<usize>,
    next_metadata_id: Mutex<i64>,
}

impl FakeCatalog {
    pub fn with_entries(entries: Vec<MediaEntry>) -> Self {
        FakeCatalog {
            entries: Mutex::new(entries),
            ..FakeCatalog::default()
        }
    }

    pub fn entry(id: &str, created_at: i64, tags: &str, admin_tags: &str) -> MediaEntry {
        MediaEntry {
            id: id.to_string(),
            tags: tags.to_string(),
            admin_tags: admin_tags.to_string(),
            created_at,
        }
    }

    pub fn mutation_log(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn seed_metadata(&self, object_id: &str, xml: &str) {
        let mut metadata = self.metadata.lock().unwrap();
        let id = metadata.len() as i64 + 1;
        metadata.insert(
            object_id.to_string(),
            MetadataRecord {
                id,
                xml: xml.to_string(),
            },
        );
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_entries(&self, filter: &MediaEntryFilter, pager: &Pager) -> Result<EntryPage> {
        {
            let mut fetches = self.fetches.lock().unwrap();
            *fetches += 1;
            if let Some(limit) = *self.fail_fetch_after.lock().unwrap() {
                if *fetches > limit {
                    bail!("simulated catalog outage");
                }
            }
        }

        let entries = self.entries.lock().unwrap();
        let mut matches: Vec<MediaEntry> = entries
            .iter()
            .filter(|entry| {
                filter
                    .id_equal
                    .as_ref()
                    .is_none_or(|id| &entry.id == id)
            })
            .filter(|entry| {
                filter
                    .created_at_greater_than_or_equal
                    .is_none_or(|bound| entry.created_at >= bound)
            })
            .filter(|entry| {
                filter
                    .admin_tags_like
                    .as_ref()
                    .is_none_or(|needle| entry.admin_tags.contains(needle.as_str()))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total_count = matches.len() as i32;
        matches.truncate(pager.page_size as usize);
        Ok(EntryPage {
            objects: matches,
            total_count,
        })
    }

    async fn update_entry_tags(&self, entry_id: &str, tags: &str) -> Result<()> {
        self.mutations
            .lock()
            .unwrap()
            .push(format!("tags {entry_id} -> {tags}"));
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|entry| entry.id == entry_id) {
            entry.tags = tags.to_string();
        }
        Ok(())
    }

    async fn find_metadata(
        &self,
        _profile_id: i32,
        object_id: &str,
    ) -> Result<Option<MetadataRecord>> {
        Ok(self.metadata.lock().unwrap().get(object_id).cloned())
    }

    async fn add_metadata(&self, _profile_id: i32, object_id: &str, xml: &str) -> Result<()> {
        self.mutations
            .lock()
            .unwrap()
            .push(format!("metadata add {object_id}"));
        let id = {
            let mut next = self.next_metadata_id.lock().unwrap();
            *next += 1;
            *next
        };
        self.metadata.lock().unwrap().insert(
            object_id.to_string(),
            MetadataRecord {
                id,
                xml: xml.to_string(),
            },
        );
        Ok(())
    }

    async fn update_metadata(&self, record_id: i64, xml: &str) -> Result<()> {
        self.mutations
            .lock()
            .unwrap()
            .push(format!("metadata update {record_id}"));
        let mut metadata = self.metadata.lock().unwrap();
        if let Some(record) = metadata.values_mut().find(|record| record.id == record_id) {
            record.xml = xml.to_string();
        }
        Ok(())
    }

    async fn add_entry_to_category(
        &self,
        entry_id: &str,
        _category_id: i32,
    ) -> Result<CategoryAdd> {
        self.mutations
            .lock()
            .unwrap()
            .push(format!("category add {entry_id}"));
        if self.members.lock().unwrap().insert(entry_id.to_string()) {
            Ok(CategoryAdd::Added)
        } else {
            Ok(CategoryAdd::AlreadyMember)
        }
    }
}
