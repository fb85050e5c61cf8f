use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Environment variables consulted when the settings file carries no
/// credentials. Loaded through dotenv in main.
pub const PARTNER_ID_ENV: &str = "CATALOG_PARTNER_ID";
pub const ADMIN_SECRET_ENV: &str = "CATALOG_SECRET";

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

fn default_page_size() -> i32 {
    500
}

fn default_xml_output_dir() -> PathBuf {
    PathBuf::from("./bulk_xml")
}

/// The whole local configuration record, (de)serialized as one unit.
/// Checkpoints live here too: read at startup, rewritten at end of run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the catalog API, e.g. "https://media.example.edu".
    pub service_url: String,

    /// Partner account id for session generation. Falls back to the
    /// CATALOG_PARTNER_ID environment variable when absent.
    #[serde(default)]
    pub partner_id: Option<i32>,

    /// Administrator secret for session generation. Falls back to the
    /// CATALOG_SECRET environment variable when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,

    /// Full name of the category all recordings are filed into.
    pub target_category: String,

    /// Name of the custom metadata profile the marker field is written under.
    pub metadata_profile_name: String,

    /// Creation date of the first entry on this account. The API rejects
    /// filters significantly before it, so checkpoints clamp up to this floor.
    pub service_start_date: NaiveDate,

    /// Watermark of the category-scoped stream. 0 means the job never ran.
    #[serde(default)]
    pub start_timestamp: i64,

    /// Watermark of the marketplace (provenance-filtered) stream.
    #[serde(default)]
    pub marketplace_timestamp: i64,

    #[serde(default = "default_page_size")]
    pub page_size: i32,

    /// Where bulk-upload XML files are written in --generate-xml mode.
    #[serde(default = "default_xml_output_dir")]
    pub xml_output_dir: PathBuf,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Settings(format!("failed to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| {
            AppError::Settings(format!("failed to parse {}: {}", path.display(), e))
        })?;
        settings.validate(path)?;
        Ok(settings)
    }

    fn validate(&self, path: &Path) -> Result<(), AppError> {
        // A checkpoint below the epoch can only be corruption. Refusing here
        // (rather than defaulting to zero) avoids reprocessing the whole
        // catalog off a damaged settings file.
        if self.start_timestamp < 0 || self.marketplace_timestamp < 0 {
            return Err(AppError::Settings(format!(
                "stored checkpoint is before the epoch in {} (start_timestamp={}, marketplace_timestamp={})",
                path.display(),
                self.start_timestamp,
                self.marketplace_timestamp
            )));
        }
        if self.page_size <= 0 {
            return Err(AppError::Settings(format!(
                "page_size must be positive, got {}",
                self.page_size
            )));
        }
        if self.target_category.trim().is_empty() {
            return Err(AppError::Settings("target_category is empty".into()));
        }
        if self.metadata_profile_name.trim().is_empty() {
            return Err(AppError::Settings("metadata_profile_name is empty".into()));
        }
        url::Url::parse(&self.service_url).map_err(|e| {
            AppError::Settings(format!("invalid service_url {:?}: {}", self.service_url, e))
        })?;
        Ok(())
    }

    /// Persists the whole record. Writes a temporary file in the same
    /// directory and renames it over the target, so a concurrent or
    /// subsequent load never observes a partially written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))
            .context("failed to create temporary settings file")?;
        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .context("failed to write temporary settings file")?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to replace settings file {}", path.display()))?;
        Ok(())
    }

    /// Unix timestamp of midnight on the service start date.
    pub fn service_start_floor(&self) -> i64 {
        self.service_start_date
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp()
    }

    pub fn resolved_partner_id(&self) -> Result<i32, AppError> {
        if let Some(id) = self.partner_id {
            return Ok(id);
        }
        match env::var(PARTNER_ID_ENV) {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                AppError::Settings(format!("{} is not a number: {:?}", PARTNER_ID_ENV, raw))
            }),
            Err(_) => Err(AppError::Settings(format!(
                "partner id not configured (set partner_id in the settings file or {})",
                PARTNER_ID_ENV
            ))),
        }
    }

    pub fn resolved_admin_secret(&self) -> Result<String, AppError> {
        if let Some(secret) = self.admin_secret.as_ref().filter(|s| !s.is_empty()) {
            return Ok(secret.clone());
        }
        env::var(ADMIN_SECRET_ENV).map_err(|_| {
            AppError::Settings(format!(
                "administrator secret not configured (set admin_secret in the settings file or {})",
                ADMIN_SECRET_ENV
            ))
        })
    }

    /// Applies command line overrides, returning whether anything changed.
    /// Supplied overrides are persisted back with the next save.
    pub fn apply_overrides(
        &mut self,
        partner_id: Option<i32>,
        secret: Option<&str>,
        profile: Option<&str>,
    ) -> bool {
        let mut changed = false;
        if let Some(id) = partner_id {
            self.partner_id = Some(id);
            changed = true;
        }
        if let Some(secret) = secret {
            self.admin_secret = Some(secret.to_string());
            changed = true;
        }
        if let Some(profile) = profile {
            self.metadata_profile_name = profile.to_string();
            changed = true;
        }
        changed
    }
}
