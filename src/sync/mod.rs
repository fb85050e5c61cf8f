//! Incremental catalog sync: checkpoint store, paginated driver, per-entry
//! transform, and the run flow tying them to the remote catalog.

pub mod bulk_xml;
pub mod checkpoint;
pub mod driver;
pub mod processor;
pub mod transform;

pub use checkpoint::{CheckpointStore, Stream};
pub use driver::{StreamSpec, SyncDriver, SyncOutcome};

use chrono::{Local, NaiveDate, NaiveTime};
use tracing::info;

use crate::catalog::CatalogClient;
use crate::config::Settings;
use crate::errors::AppError;
use crate::sync::processor::{DirectProcessor, EntryProcessor, XmlBatchProcessor};

#[derive(Debug, Clone)]
pub enum RunMode {
    /// Process one entry by id; checkpoints are neither read nor saved.
    SingleEntry { entry_id: String },
    /// Process everything from the given date, or from the stored
    /// checkpoints when no date is supplied.
    Range { start_date: Option<NaiveDate> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Apply updates through the API immediately.
    Direct,
    /// Defer tag/metadata updates into bulk-upload XML files.
    BulkXml,
}

/// Connects, resolves the configured category and metadata profile, and
/// drives the requested streams. Startup failures map to their exit-code
/// classes; anything after that is logged and absorbed per stream.
pub async fn run_sync_flow(
    store: &mut CheckpointStore,
    mode: RunMode,
    output: OutputMode,
) -> Result<(), AppError> {
    let settings = store.settings().clone();
    let partner_id = settings.resolved_partner_id()?;
    let admin_secret = settings.resolved_admin_secret()?;

    let client = CatalogClient::connect(&settings.service_url, partner_id, &admin_secret)
        .await
        .map_err(|e| AppError::ClientInit(format!("{e:#}")))?;

    let category_id = client
        .category_id_by_full_name(&settings.target_category)
        .await
        .map_err(|e| AppError::CategoryLookup(format!("{}: {e:#}", settings.target_category)))?;
    let profile_id = client
        .metadata_profile_id(&settings.metadata_profile_name)
        .await
        .map_err(|e| {
            AppError::ProfileLookup(format!("{}: {e:#}", settings.metadata_profile_name))
        })?;
    info!(
        category = %settings.target_category,
        category_id,
        profile = %settings.metadata_profile_name,
        profile_id,
        "targets resolved"
    );

    let driver = SyncDriver::new(&client, settings.page_size);
    let date_stamp = Local::now().format("%Y-%m-%d").to_string();

    match mode {
        RunMode::SingleEntry { entry_id } => {
            info!(entry_id = %entry_id, "processing a single media entry");
            let spec = StreamSpec::single_entry(entry_id);
            let mut processor = build_processor(
                output,
                &client,
                profile_id,
                Some(category_id),
                &settings,
                &date_stamp,
            );
            driver.run(0, &spec, processor.as_mut()).await;
        }
        RunMode::Range { start_date } => {
            let explicit_start = start_date.map(date_floor);

            // Stream one: entries already filed in the target category.
            let start = explicit_start.unwrap_or_else(|| store.load(Stream::Primary));
            let spec = StreamSpec::category_scoped(&settings.target_category);
            let mut processor =
                build_processor(output, &client, profile_id, None, &settings, &date_stamp);
            let outcome = driver.run(start, &spec, processor.as_mut()).await;
            store.record(Stream::Primary, outcome.checkpoint);

            // Stream two: entries stamped by the marketplace importer,
            // wherever they were filed. Runs even if stream one aborted;
            // the streams fail independently. Its mutations always apply
            // directly; bulk files only describe the category stream.
            let start = explicit_start.unwrap_or_else(|| store.load(Stream::Marketplace));
            let spec = StreamSpec::marketplace();
            let mut processor = DirectProcessor::new(&client, profile_id, Some(category_id));
            let outcome = driver.run(start, &spec, &mut processor).await;
            store.record(Stream::Marketplace, outcome.checkpoint);

            store
                .flush()
                .map_err(|e| AppError::Settings(format!("failed to persist checkpoints: {e:#}")))?;
            info!("checkpoints saved");
        }
    }
    Ok(())
}

fn build_processor<'a>(
    output: OutputMode,
    client: &'a CatalogClient,
    profile_id: i32,
    category_id: Option<i32>,
    settings: &Settings,
    date_stamp: &str,
) -> Box<dyn EntryProcessor + 'a> {
    match output {
        OutputMode::Direct => Box::new(DirectProcessor::new(client, profile_id, category_id)),
        OutputMode::BulkXml => Box::new(XmlBatchProcessor::new(
            client,
            profile_id,
            &settings.metadata_profile_name,
            category_id,
            settings.xml_output_dir.clone(),
            date_stamp.to_string(),
        )),
    }
}

fn date_floor(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}
