use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub note: NoteConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory where uploaded recording blobs are persisted
    pub recordings_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteConfig {
    /// Minimum characters per section required at finalize time
    pub min_section_chars: usize,
    /// Quiet period after the last edit before autosave fires
    pub autosave_quiet_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    /// Polling fallback interval when push delivery is unavailable,
    /// roughly 2x the push channel's worst-case latency
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "clinic-scribe".to_string(),
            http: HttpConfig {
                bind: "127.0.0.1".to_string(),
                port: 8574,
            },
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_path: "data/recordings".to_string(),
        }
    }
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            min_section_chars: 50,
            autosave_quiet_secs: 3,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
        }
    }
}

impl NoteConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.autosave_quiet_secs)
    }
}

impl TranscriptionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
