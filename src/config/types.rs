use reelwatch_common::TrackerKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub trackers: Vec<TrackerConfig>,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub seasons: SeasonConfig,

    #[serde(default)]
    pub suppression: SuppressionConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// First enabled tracker of the given kind.
    pub fn tracker(&self, kind: TrackerKind) -> Option<&TrackerConfig> {
        self.trackers
            .iter()
            .find(|t| t.enabled && t.tracker_type == kind)
    }

    /// Tracker by (case-insensitive) name, enabled or not.
    pub fn tracker_by_name(&self, name: &str) -> Option<&TrackerConfig> {
        self.trackers
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Connection to the media library server (Jellyfin).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default = "default_library_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: String,

    /// Timeout for every library request. On expiry the request counts as
    /// "not found / not ready".
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_library_url() -> String {
    "http://localhost:8096".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

impl LibraryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            url: default_library_url(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub tracker_type: TrackerKind,

    pub url: String,

    pub api_key: String,

    #[serde(default)]
    pub enabled: bool,
}

/// Reconciliation worker timing.
///
/// There is intentionally no maximum age: a pending change whose item never
/// shows up in the library stays queued.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Sleep between worker ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Delay before a not-ready or unchanged entry is checked again.
    #[serde(default = "default_recheck_interval")]
    pub recheck_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_recheck_interval() -> u64 {
    60
}

impl ReconcileConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn recheck_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.recheck_interval_secs as i64)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            recheck_interval_secs: default_recheck_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeasonConfig {
    /// Quiet window between two "new episodes" notifications for one season.
    #[serde(default = "default_min_gap")]
    pub min_gap_secs: u64,

    /// Episodes that premiered longer ago than this are not announced
    /// (0 disables the check).
    #[serde(default)]
    pub episode_premiered_within_days: u32,

    /// Episodes of a season created in the library less than this many days
    /// ago are not announced; the season announcement covers them
    /// (0 disables the check).
    #[serde(default)]
    pub season_added_within_days: u32,
}

fn default_min_gap() -> u64 {
    900
}

impl SeasonConfig {
    pub fn min_gap(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_gap_secs as i64)
    }
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            min_gap_secs: default_min_gap(),
            episode_premiered_within_days: 0,
            season_added_within_days: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SuppressionConfig {
    #[serde(default = "default_suppression_ttl")]
    pub ttl_secs: u64,
}

fn default_suppression_ttl() -> u64 {
    1800
}

impl SuppressionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs as i64)
    }
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_suppression_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    /// Directory holding the persisted JSON documents.
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,

    /// Upper bound for the notified-items ledger; oldest entries are evicted.
    #[serde(default = "default_notified_max")]
    pub notified_max_entries: usize,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_notified_max() -> usize {
    100
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            notified_max_entries: default_notified_max(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,
}
