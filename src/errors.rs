use chrono::NaiveDate;
use thiserror::Error;

/// Startup failure classes. Each maps to a distinct process exit code so the
/// scheduler wrapping this job can tell the failure classes apart without
/// scraping logs. Failures after processing has started are logged and
/// absorbed instead (the run still exits 0 with entries skipped).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("start dates before the service start ({floor}) are not supported: {supplied}")]
    DateBeforeServiceStart { supplied: NaiveDate, floor: NaiveDate },

    #[error("invalid date format: {0}")]
    InvalidDate(String),

    #[error("catalog client initialization failed: {0}")]
    ClientInit(String),

    #[error("failed to resolve the target category: {0}")]
    CategoryLookup(String),

    #[error("failed to resolve the target metadata profile: {0}")]
    ProfileLookup(String),

    #[error("invalid settings: {0}")]
    Settings(String),
}

impl AppError {
    /// Exit code for argument-parser failures. The parser renders its own
    /// diagnostics, so no variant is built for this class.
    pub const ARGUMENTS_EXIT: u8 = 3;

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::DateBeforeServiceStart { .. } => 1,
            AppError::InvalidDate(_) => 2,
            AppError::ClientInit(_) => 4,
            AppError::CategoryLookup(_) => 5,
            AppError::ProfileLookup(_) => 6,
            AppError::Settings(_) => 7,
        }
    }
}
