//! Core type definitions for library items and acquisition trackers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of library item, as reported by the library server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Series,
    Season,
    Episode,
    MusicAlbum,
    /// Anything the engine does not handle (trailers, folders, audio tracks).
    #[serde(other)]
    Other,
}

impl ItemKind {
    /// Parse the library's `Type` / `ItemType` field.
    pub fn from_library_type(value: &str) -> Self {
        match value {
            "Movie" => Self::Movie,
            "Series" => Self::Series,
            "Season" => Self::Season,
            "Episode" => Self::Episode,
            "MusicAlbum" => Self::MusicAlbum,
            _ => Self::Other,
        }
    }

    /// The library's own spelling of this kind, used in queries.
    pub fn library_type(&self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Series => "Series",
            Self::Season => "Season",
            Self::Episode => "Episode",
            Self::MusicAlbum => "MusicAlbum",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.library_type())
    }
}

/// Which acquisition tool a pending change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// Movie tracker (Radarr).
    #[serde(alias = "radarr")]
    Movies,
    /// Series tracker (Sonarr).
    #[serde(alias = "sonarr")]
    Series,
}

impl TrackerKind {
    /// Library item kind this tracker's changes resolve to.
    pub fn item_kind(&self) -> ItemKind {
        match self {
            Self::Movies => ItemKind::Movie,
            Self::Series => ItemKind::Series,
        }
    }

    /// Name of the persisted pending-queue document for this tracker.
    pub fn document_name(&self) -> &'static str {
        match self {
            Self::Movies => "pending-movies",
            Self::Series => "pending-series",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movies => write!(f, "movies"),
            Self::Series => write!(f, "series"),
        }
    }
}
