use crate::config::TrackerConfig;
use anyhow::{Context, Result};
use reelwatch_common::TrackerKind;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Connection timeout for Arr API requests
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Common trait for *arr API clients
#[async_trait::async_trait]
pub trait ArrClient: Send + Sync {
    /// Test the connection to the *arr instance
    async fn test_connection(&self) -> Result<bool>;
}

/// Source of planned episode counts per season.
#[async_trait::async_trait]
pub trait SeasonTotals: Send + Sync {
    /// Episodes the season is planned to have, if the tracker knows.
    async fn planned_episode_total(&self, tvdb_id: &str, season_number: u32) -> Option<u32>;
}

/// Create an appropriate client based on config
pub fn create_client(config: &TrackerConfig) -> Box<dyn ArrClient> {
    match config.tracker_type {
        TrackerKind::Movies => Box::new(RadarrClient::new(config)),
        TrackerKind::Series => Box::new(SonarrClient::new(config)),
    }
}

struct BaseArrClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BaseArrClient {
    fn new(config: &TrackerConfig) -> Self {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .context(format!("Failed to GET {}", path))
    }
}

pub struct RadarrClient(BaseArrClient);

impl RadarrClient {
    pub fn new(config: &TrackerConfig) -> Self {
        Self(BaseArrClient::new(config))
    }
}

#[async_trait::async_trait]
impl ArrClient for RadarrClient {
    async fn test_connection(&self) -> Result<bool> {
        let response = self.0.get("/system/status").await?;
        Ok(response.status().is_success())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SonarrSeriesResource {
    #[serde(default)]
    seasons: Vec<SonarrSeasonResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SonarrSeasonResource {
    season_number: u32,
    statistics: Option<SonarrSeasonStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SonarrSeasonStatistics {
    #[serde(default)]
    total_episode_count: u32,
}

pub struct SonarrClient(BaseArrClient);

impl SonarrClient {
    pub fn new(config: &TrackerConfig) -> Self {
        Self(BaseArrClient::new(config))
    }

    async fn fetch_planned_total(&self, tvdb_id: &str, season_number: u32) -> Result<Option<u32>> {
        let response = self.0.get(&format!("/series?tvdbId={tvdb_id}")).await?;
        if !response.status().is_success() {
            anyhow::bail!("Sonarr series lookup returned {}", response.status());
        }

        let series: Vec<SonarrSeriesResource> = response
            .json()
            .await
            .context("Invalid Sonarr series response")?;

        Ok(series
            .iter()
            .flat_map(|s| s.seasons.iter())
            .find(|s| s.season_number == season_number)
            .and_then(|s| s.statistics.as_ref())
            .map(|stats| stats.total_episode_count)
            .filter(|total| *total > 0))
    }
}

#[async_trait::async_trait]
impl ArrClient for SonarrClient {
    async fn test_connection(&self) -> Result<bool> {
        let response = self.0.get("/system/status").await?;
        Ok(response.status().is_success())
    }
}

#[async_trait::async_trait]
impl SeasonTotals for SonarrClient {
    async fn planned_episode_total(&self, tvdb_id: &str, season_number: u32) -> Option<u32> {
        match self.fetch_planned_total(tvdb_id, season_number).await {
            Ok(total) => total,
            Err(e) => {
                tracing::debug!(tvdb_id, season = season_number, error = %e, "Planned season total unavailable");
                None
            }
        }
    }
}
