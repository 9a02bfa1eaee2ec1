//! Read access to the media library server.
//!
//! The engine only needs a handful of queries, expressed by the
//! [`LibraryClient`] trait so that reconciliation can be tested without a
//! server. [`JellyfinClient`] is the production implementation.

pub mod jellyfin;

pub use jellyfin::JellyfinClient;

use async_trait::async_trait;
use reelwatch_common::{ExternalKey, ExternalKeySet, ItemKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An item as returned by the library's item queries.
///
/// Field names follow the library's JSON (PascalCase). Only fields the engine
/// reads are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LibraryItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub item_type: String,
    #[serde(default)]
    pub production_year: Option<i32>,
    #[serde(default)]
    pub index_number: Option<u32>,
    #[serde(default)]
    pub parent_index_number: Option<u32>,
    #[serde(default)]
    pub provider_ids: HashMap<String, String>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub series_name: Option<String>,
    #[serde(default)]
    pub season_id: Option<String>,
    /// "FileSystem" for real files, "Virtual" for known-but-missing episodes.
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub premiere_date: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub media_streams: Vec<MediaStream>,
    #[serde(default)]
    pub media_sources: Vec<MediaSource>,
}

impl LibraryItem {
    pub fn kind(&self) -> ItemKind {
        ItemKind::from_library_type(&self.item_type)
    }

    pub fn external_keys(&self) -> ExternalKeySet {
        ExternalKeySet::from_provider_pairs(
            self.provider_ids
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }

    /// Whether the library has an actual file for this item.
    pub fn has_file(&self) -> bool {
        !matches!(self.location_type.as_deref(), Some("Virtual"))
    }

    /// Whether this item carries the given catalog id.
    pub fn carries_key(&self, key: &ExternalKey) -> bool {
        self.provider_ids
            .iter()
            .any(|(name, value)| {
                name.eq_ignore_ascii_case(key.scheme.provider_name()) && value == &key.value
            })
    }

    pub fn to_ref(&self) -> LibraryItemRef {
        LibraryItemRef {
            item_id: self.id.clone(),
            display_name: self.name.clone(),
            release_year: self.production_year,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub media_streams: Vec<MediaStream>,
}

/// One stream of a media file, as described by the library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStream {
    /// "Video", "Audio", "Subtitle", ...
    #[serde(rename = "Type", default)]
    pub stream_type: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(default)]
    pub channel_layout: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// "SDR" / "HDR".
    #[serde(default)]
    pub video_range: Option<String>,
    /// "DOVI", "DOVIWithHDR10", "HDR10Plus", "HLG", ...
    #[serde(default)]
    pub video_range_type: Option<String>,
    /// e.g. "Dolby Vision Profile 8.1 (HDR10)".
    #[serde(default)]
    pub video_do_vi_title: Option<String>,
    #[serde(default)]
    pub dv_profile: Option<u32>,
}

impl MediaStream {
    pub fn is_video(&self) -> bool {
        self.stream_type.as_deref() == Some("Video")
    }

    pub fn is_audio(&self) -> bool {
        self.stream_type.as_deref() == Some("Audio")
    }
}

/// A resolved pointer into the library. Never cached across reconciliation
/// passes: the id may change when the library rescans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryItemRef {
    pub item_id: String,
    pub display_name: String,
    pub release_year: Option<i32>,
}

/// Queries the engine runs against the library server.
#[async_trait]
pub trait LibraryClient: Send + Sync {
    /// Items of `kind` carrying the given catalog id.
    async fn find_by_key(&self, kind: ItemKind, key: &ExternalKey) -> Result<Vec<LibraryItem>>;

    /// Full details (including media streams) for one item; `None` when the
    /// library does not know the id.
    async fn item(&self, item_id: &str) -> Result<Option<LibraryItem>>;

    /// Descendants of `parent_id` of the given kind (seasons of a series,
    /// episodes of a season or series).
    async fn children(&self, parent_id: &str, kind: ItemKind) -> Result<Vec<LibraryItem>>;

    /// Primary image bytes for an item, if it has one.
    async fn primary_image(&self, item_id: &str) -> Result<Option<Vec<u8>>>;

    /// Test connectivity to the library
    async fn test_connection(&self) -> Result<bool>;
}
