use crate::arr::{is_tracked_event, RadarrWebhook, SonarrWebhook};
use crate::server::AppContext;
use crate::signals::{GrabOutcome, LibraryChangeSignal};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use reelwatch_common::{ExternalKeySet, TrackerKind};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

pub fn webhook_routes() -> Router<AppContext> {
    Router::new()
        .route("/library", post(handle_library_webhook))
        .route("/:tracker", post(handle_tracker_webhook))
}

/// Payload of the library's webhook plugin ("Item Added" template).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryWebhook {
    #[serde(rename = "ItemType", default)]
    pub item_type: String,
    #[serde(rename = "ItemId", default)]
    pub item_id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Year", default, deserialize_with = "lenient_number")]
    pub year: Option<i32>,
    #[serde(rename = "SeriesName", default)]
    pub series_name: Option<String>,
    #[serde(rename = "SeasonNumber00", default, deserialize_with = "lenient_number")]
    pub season_number: Option<u32>,
    #[serde(rename = "EpisodeNumber00", default, deserialize_with = "lenient_number")]
    pub episode_number: Option<u32>,
    #[serde(rename = "Provider_tmdb", default)]
    pub provider_tmdb: Option<String>,
    #[serde(rename = "Provider_tvdb", default)]
    pub provider_tvdb: Option<String>,
    #[serde(rename = "Provider_imdb", default)]
    pub provider_imdb: Option<String>,
    #[serde(rename = "Overview", default)]
    pub overview: Option<String>,
    #[serde(rename = "RunTime", default)]
    pub runtime: Option<String>,
    #[serde(rename = "Artist", default)]
    pub artist: Option<String>,
}

impl LibraryWebhook {
    pub fn into_signal(self) -> LibraryChangeSignal {
        let provider_ids = ExternalKeySet::from_provider_pairs(
            [
                ("tmdb", self.provider_tmdb.as_deref()),
                ("tvdb", self.provider_tvdb.as_deref()),
                ("imdb", self.provider_imdb.as_deref()),
            ]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v))),
        );

        LibraryChangeSignal {
            item_type: self.item_type,
            item_id: self.item_id,
            provider_ids,
            name: self.name,
            year: self.year,
            season_number: self.season_number,
            episode_number: self.episode_number,
            series_name: self.series_name,
            overview: self.overview,
            runtime: self.runtime,
            artist: self.artist,
        }
    }
}

/// Accepts `2010`, `"2010"`, `"01"`, `""` or null.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => n.to_string().parse().ok(),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

async fn handle_library_webhook(
    State(ctx): State<AppContext>,
    Json(payload): Json<LibraryWebhook>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if payload.item_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing ItemId".to_string()));
    }

    tracing::info!(
        "Received library webhook: {} '{}'",
        payload.item_type,
        payload.name
    );

    let outcome = ctx.signals.on_library_change(payload.into_signal()).await;

    Ok(Json(serde_json::json!({
        "status": outcome.as_str(),
    })))
}

async fn handle_tracker_webhook(
    State(ctx): State<AppContext>,
    Path(tracker_name): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let tracker = ctx
        .config
        .tracker_by_name(&tracker_name)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("Unknown tracker: {}", tracker_name),
            )
        })?;

    if !tracker.enabled {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Tracker integration is disabled".to_string(),
        ));
    }

    let (event_type, signals) = match tracker.tracker_type {
        TrackerKind::Movies => {
            let webhook: RadarrWebhook = serde_json::from_value(payload).map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Invalid Radarr payload: {}", e),
                )
            })?;

            tracing::info!(
                is_upgrade = webhook.is_upgrade,
                "Received Radarr webhook: {} for {}",
                webhook.event_type,
                webhook
                    .movie
                    .as_ref()
                    .map(|m| m.title.as_str())
                    .unwrap_or("unknown")
            );

            let signals = webhook.to_grab_signal().into_iter().collect::<Vec<_>>();
            (webhook.event_type, signals)
        }
        TrackerKind::Series => {
            let webhook: SonarrWebhook = serde_json::from_value(payload).map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Invalid Sonarr payload: {}", e),
                )
            })?;

            tracing::info!(
                is_upgrade = webhook.is_upgrade,
                "Received Sonarr webhook: {} for {}",
                webhook.event_type,
                webhook
                    .series
                    .as_ref()
                    .map(|s| s.title.as_str())
                    .unwrap_or("unknown")
            );

            let signals = webhook.to_grab_signals();
            (webhook.event_type, signals)
        }
    };

    if !is_tracked_event(&event_type) {
        tracing::debug!("Ignoring event type: {}", event_type);
        return Ok(Json(serde_json::json!({
            "status": "ignored",
            "reason": format!("Event type '{}' not processed", event_type)
        })));
    }

    let now = Utc::now();
    let queued = signals
        .into_iter()
        .map(|signal| ctx.signals.on_acquisition_grab(tracker.tracker_type, signal, now))
        .filter(|outcome| matches!(outcome, GrabOutcome::Queued(_)))
        .count();

    Ok(Json(serde_json::json!({
        "status": if queued > 0 { "queued" } else { "ignored" },
        "queued": queued,
    })))
}
