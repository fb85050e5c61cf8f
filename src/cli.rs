use std::path::PathBuf;

use clap::Parser;

/// Tag newly imported videoconference recordings in the media catalog,
/// attach their custom metadata record, and file them into the recordings
/// category.
#[derive(Debug, Parser)]
#[command(name = "zoomtagger")]
pub struct Options {
    /// Process a single media entry and stop (checkpoints are not saved).
    #[arg(short = 'e', long = "entry-id", conflicts_with = "start_date")]
    pub entry_id: Option<String>,

    /// Process all media entries created at or after this date
    /// (YYYY-MM-DD), overriding the stored checkpoints.
    #[arg(short = 'd', long = "start-date")]
    pub start_date: Option<String>,

    /// Write bulk-upload XML files instead of applying updates through the
    /// API.
    #[arg(long = "generate-xml")]
    pub generate_xml: bool,

    /// Override the partner id and persist it to the settings file.
    #[arg(long = "partner-id")]
    pub partner_id: Option<i32>,

    /// Override the administrator secret and persist it to the settings
    /// file.
    #[arg(long = "secret")]
    pub secret: Option<String>,

    /// Override the metadata profile name and persist it to the settings
    /// file.
    #[arg(long = "profile")]
    pub profile: Option<String>,

    /// Path to the settings file.
    #[arg(long = "settings", default_value = crate::config::DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn argument_definitions_are_consistent() {
        Options::command().debug_assert();
    }

    #[test]
    fn entry_id_and_start_date_are_mutually_exclusive() {
        let result =
            Options::try_parse_from(["zoomtagger", "-e", "0_ab12cd34", "-d", "2024-01-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn range_mode_accepts_overrides() {
        let options = Options::try_parse_from([
            "zoomtagger",
            "--start-date",
            "2024-01-01",
            "--partner-id",
            "411",
            "--generate-xml",
        ])
        .unwrap();
        assert_eq!(options.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(options.partner_id, Some(411));
        assert!(options.generate_xml);
        assert_eq!(options.settings, PathBuf::from("settings.json"));
    }
}
