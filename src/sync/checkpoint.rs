//! Checkpoint persistence. The two sync streams keep independent
//! creation-time watermarks inside the settings record; this store reads
//! them at startup, tracks advancement in memory, and writes the whole
//! record back once at end of run.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Settings;

/// Which watermark a stream advances. The streams sync independently and
/// must never share a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Entries already filed in the target category.
    Primary,
    /// Entries created by the marketplace recording importer.
    Marketplace,
}

pub struct CheckpointStore {
    path: PathBuf,
    settings: Settings,
    floor: i64,
}

impl CheckpointStore {
    pub fn new(path: PathBuf, settings: Settings) -> Self {
        let floor = settings.service_start_floor();
        CheckpointStore {
            path,
            settings,
            floor,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The stream's last persisted checkpoint, clamped up to the service
    /// start floor. A stored 0 means the stream never ran and resolves to
    /// the floor; negative values were already rejected at settings load.
    pub fn load(&self, stream: Stream) -> i64 {
        self.stored(stream).max(self.floor)
    }

    /// Records the stream's final watermark for the next flush.
    pub fn record(&mut self, stream: Stream, checkpoint: i64) {
        match stream {
            Stream::Primary => self.settings.start_timestamp = checkpoint,
            Stream::Marketplace => self.settings.marketplace_timestamp = checkpoint,
        }
    }

    /// Persists the whole settings record atomically.
    pub fn flush(&self) -> Result<()> {
        self.settings.save(&self.path)
    }

    fn stored(&self, stream: Stream) -> i64 {
        match stream {
            Stream::Primary => self.settings.start_timestamp,
            Stream::Marketplace => self.settings.marketplace_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::fs;

    fn settings_with(start: i64, marketplace: i64) -> Settings {
        serde_json::from_str(&format!(
            r#"{{
                "service_url": "https://media.example.edu",
                "partner_id": 411,
                "target_category": "Zoom Recordings",
                "metadata_profile_name": "Campus Custom Metadata",
                "service_start_date": "2018-01-05",
                "start_timestamp": {start},
                "marketplace_timestamp": {marketplace}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn unset_checkpoint_resolves_to_the_service_floor() {
        let settings = settings_with(0, 0);
        let floor = settings.service_start_floor();
        let store = CheckpointStore::new(PathBuf::from("unused.json"), settings);

        assert_eq!(store.load(Stream::Primary), floor);
        assert_eq!(store.load(Stream::Marketplace), floor);
    }

    #[test]
    fn stored_checkpoint_wins_over_the_floor_when_later() {
        let settings = settings_with(1_600_000_000, 12);
        let floor = settings.service_start_floor();
        let store = CheckpointStore::new(PathBuf::from("unused.json"), settings);

        assert_eq!(store.load(Stream::Primary), 1_600_000_000);
        // A stored value below the floor (but valid) still clamps up.
        assert_eq!(store.load(Stream::Marketplace), floor);
    }

    #[test]
    fn streams_do_not_share_a_checkpoint() {
        let mut store =
            CheckpointStore::new(PathBuf::from("unused.json"), settings_with(0, 0));
        store.record(Stream::Primary, 1_700_000_000);

        assert_eq!(store.settings().start_timestamp, 1_700_000_000);
        assert_eq!(store.settings().marketplace_timestamp, 0);
    }

    #[test]
    fn flush_persists_recorded_checkpoints() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            serde_json::to_string(&settings_with(0, 0)).unwrap(),
        )?;

        let mut store = CheckpointStore::new(path.clone(), settings_with(0, 0));
        store.record(Stream::Primary, 1_700_000_100);
        store.record(Stream::Marketplace, 1_700_000_200);
        store.flush()?;

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.start_timestamp, 1_700_000_100);
        assert_eq!(reloaded.marketplace_timestamp, 1_700_000_200);
        Ok(())
    }
}
