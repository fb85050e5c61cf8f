//! Remote media-catalog API: wire types and the HTTP client.

pub mod client;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use client::{CatalogApi, CatalogClient};
pub use types::{
    ApiError, CategoryAdd, EntryPage, MediaEntry, MediaEntryFilter, MetadataRecord,
    ORDER_BY_CREATED_AT_ASC, Pager,
};
