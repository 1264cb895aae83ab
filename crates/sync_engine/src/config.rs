use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use engine_logging::engine_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse settings from {path}: {message}")]
    Parse { path: String, message: String },
}

/// Every tunable of the sync engine. Durations are milliseconds on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub base_origin: String,
    pub home_url: String,
    pub login_url: String,
    pub collection_url: String,
    pub user_agent: String,
    pub accept_language: String,
    #[serde(with = "duration_ms")]
    pub navigation_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub page_load_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub page_load_poll: Duration,
    #[serde(with = "duration_ms")]
    pub start_delay: Duration,
    #[serde(with = "duration_ms")]
    pub resume_delay: Duration,
    #[serde(with = "duration_ms")]
    pub element_delay: Duration,
    #[serde(with = "duration_ms")]
    pub cycle_delay: Duration,
    #[serde(with = "duration_ms")]
    pub load_more_wait: Duration,
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,
    #[serde(with = "duration_ms")]
    pub scroll_bottom_wait: Duration,
    pub scroll_nudges: u32,
    pub scroll_nudge_px: u32,
    #[serde(with = "duration_ms")]
    pub scroll_nudge_delay: Duration,
    pub max_empty_retries: u32,
    #[serde(with = "duration_ms")]
    pub empty_retry_delay: Duration,
    #[serde(with = "duration_ms")]
    pub readiness_interval: Duration,
    pub command_capacity: usize,
    pub event_capacity: usize,
    pub skip_existing_records: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_origin: "https://www.xiaohongshu.com".to_string(),
            home_url: "https://www.xiaohongshu.com".to_string(),
            login_url: "https://www.xiaohongshu.com/login".to_string(),
            collection_url: "https://www.xiaohongshu.com/user/profile/me/collect".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
                         (KHTML, like Gecko) Version/17.0 Safari/605.1.15"
                .to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            navigation_timeout: Duration::from_secs(30),
            page_load_timeout: Duration::from_secs(5),
            page_load_poll: Duration::from_millis(250),
            start_delay: Duration::from_secs(1),
            resume_delay: Duration::from_millis(500),
            element_delay: Duration::from_millis(100),
            cycle_delay: Duration::from_millis(1500),
            load_more_wait: Duration::from_secs(2),
            settle_delay: Duration::from_secs(2),
            scroll_bottom_wait: Duration::from_secs(1),
            scroll_nudges: 3,
            scroll_nudge_px: 100,
            scroll_nudge_delay: Duration::from_millis(300),
            max_empty_retries: 3,
            empty_retry_delay: Duration::from_secs(3),
            readiness_interval: Duration::from_secs(3),
            command_capacity: 16,
            event_capacity: 64,
            skip_existing_records: false,
        }
    }
}

impl SyncSettings {
    /// Loads settings from a RON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                engine_info!("No settings file at {:?}; using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let settings = ron::from_str(&content).map_err(|err| SettingsError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        engine_info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
    }

    /// Headers sent with every navigation.
    pub fn navigation_headers(&self) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
        ]
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
