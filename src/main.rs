//! Incremental catalog tagging job
//!
//! Scans the media catalog for newly created entries from the
//! videoconference recording importer, tags them, attaches their custom
//! metadata record, and files them into the recordings category. Progress
//! is checkpointed per stream so the job can run on a schedule and resume
//! where it left off.

mod catalog;
mod cli;
mod config;
mod errors;
mod sync;

use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Options;
use crate::config::Settings;
use crate::errors::AppError;
use crate::sync::{CheckpointStore, OutputMode, RunMode};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = match Options::try_parse() {
        Ok(options) => options,
        Err(err) => {
            // clap renders its own usage and error text; --help and
            // --version land here too and exit cleanly.
            let arg_failure = err.use_stderr();
            let _ = err.print();
            return if arg_failure {
                ExitCode::from(AppError::ARGUMENTS_EXIT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    info!("program start");
    match run_app(options).await {
        Ok(()) => {
            info!("program exit");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run_app(options: Options) -> Result<(), AppError> {
    let mut settings = Settings::load(&options.settings)?;
    let overrides_changed = settings.apply_overrides(
        options.partner_id,
        options.secret.as_deref(),
        options.profile.as_deref(),
    );

    let mode = match options.entry_id {
        Some(entry_id) => RunMode::SingleEntry { entry_id },
        None => RunMode::Range {
            start_date: options
                .start_date
                .as_deref()
                .map(|raw| parse_start_date(raw, &settings))
                .transpose()?,
        },
    };
    let output = if options.generate_xml {
        OutputMode::BulkXml
    } else {
        OutputMode::Direct
    };
    let persists_checkpoints = matches!(mode, RunMode::Range { .. });

    let mut store = CheckpointStore::new(options.settings.clone(), settings);
    sync::run_sync_flow(&mut store, mode, output).await?;

    // Range mode already flushed together with its checkpoints;
    // single-entry mode persists only when overrides were supplied.
    if overrides_changed && !persists_checkpoints {
        store
            .flush()
            .map_err(|e| AppError::Settings(format!("failed to persist overrides: {e:#}")))?;
    }
    Ok(())
}

fn parse_start_date(raw: &str, settings: &Settings) -> Result<NaiveDate, AppError> {
    let date: NaiveDate = raw
        .parse()
        .map_err(|_| AppError::InvalidDate(raw.to_string()))?;
    if date < settings.service_start_date {
        return Err(AppError::DateBeforeServiceStart {
            supplied: date,
            floor: settings.service_start_date,
        });
    }
    Ok(date)
}
