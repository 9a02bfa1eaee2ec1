use crate::signals::AcquisitionGrabSignal;
use reelwatch_common::{ExternalKey, ExternalKeySet, KeyScheme};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Event types that announce a change worth tracking.
pub const TRACKED_EVENTS: [&str; 2] = ["Grab", "Download"];

pub fn is_tracked_event(event_type: &str) -> bool {
    TRACKED_EVENTS.iter().any(|e| e.eq_ignore_ascii_case(event_type))
}

/// Radarr webhook payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarrWebhook {
    pub event_type: String,
    pub movie: Option<RadarrMovie>,
    pub remote_movie: Option<RadarrRemoteMovie>,
    #[serde(default)]
    pub is_upgrade: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarrMovie {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarrRemoteMovie {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
}

/// Sonarr webhook payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrWebhook {
    pub event_type: String,
    pub series: Option<SonarrSeries>,
    #[serde(default)]
    pub episodes: Vec<SonarrEpisode>,
    #[serde(default)]
    pub is_upgrade: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrSeries {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub tvdb_id: Option<i64>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrEpisode {
    pub id: i64,
    pub episode_number: u32,
    pub season_number: u32,
    pub title: Option<String>,
}

fn numeric_key(scheme: KeyScheme, id: Option<i64>) -> Option<ExternalKey> {
    id.map(|id| ExternalKey::new(scheme, id.to_string()))
}

fn string_key(scheme: KeyScheme, id: Option<&String>) -> Option<ExternalKey> {
    id.map(|id| ExternalKey::new(scheme, id.as_str()))
}

impl RadarrWebhook {
    /// The grab this payload describes, if it names a movie.
    pub fn to_grab_signal(&self) -> Option<AcquisitionGrabSignal> {
        let movie = self.movie.as_ref();
        let remote = self.remote_movie.as_ref();

        let external_ids = ExternalKeySet::from_keys(
            [
                numeric_key(KeyScheme::Primary, movie.and_then(|m| m.tmdb_id)),
                numeric_key(KeyScheme::Primary, remote.and_then(|r| r.tmdb_id)),
                string_key(KeyScheme::Alternate, movie.and_then(|m| m.imdb_id.as_ref())),
                string_key(KeyScheme::Alternate, remote.and_then(|r| r.imdb_id.as_ref())),
            ]
            .into_iter()
            .flatten(),
        );

        let title = movie
            .map(|m| m.title.clone())
            .or_else(|| remote.and_then(|r| r.title.clone()))?;
        let year = movie.and_then(|m| m.year).or_else(|| remote.and_then(|r| r.year));

        Some(AcquisitionGrabSignal {
            external_ids,
            title,
            year,
            season_number: None,
            episode_numbers: Vec::new(),
        })
    }
}

impl SonarrWebhook {
    /// One grab per season named by the payload's episodes; a whole-series
    /// grab when it names none.
    pub fn to_grab_signals(&self) -> Vec<AcquisitionGrabSignal> {
        let Some(series) = &self.series else {
            return Vec::new();
        };

        let external_ids = ExternalKeySet::from_keys(
            [
                numeric_key(KeyScheme::Primary, series.tmdb_id),
                numeric_key(KeyScheme::Secondary, series.tvdb_id),
                string_key(KeyScheme::Alternate, series.imdb_id.as_ref()),
            ]
            .into_iter()
            .flatten(),
        );

        let base = AcquisitionGrabSignal {
            external_ids,
            title: series.title.clone(),
            year: series.year,
            season_number: None,
            episode_numbers: Vec::new(),
        };

        if self.episodes.is_empty() {
            return vec![base];
        }

        let mut by_season: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for episode in &self.episodes {
            by_season
                .entry(episode.season_number)
                .or_default()
                .push(episode.episode_number);
        }

        by_season
            .into_iter()
            .map(|(season, episodes)| AcquisitionGrabSignal {
                season_number: Some(season),
                episode_numbers: episodes,
                ..base.clone()
            })
            .collect()
    }
}
