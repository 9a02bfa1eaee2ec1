//! External catalog identifiers and pending-change scopes.
//!
//! Library items are never addressed by the library's own id across time, since
//! that id can change between rescans. Instead every tracked change carries the
//! identifiers third-party catalogs minted for it, tagged by [`KeyScheme`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Which catalog minted an identifier.
///
/// Declaration order is resolution priority: primary first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    /// Primary catalog (TMDB).
    Primary,
    /// Secondary TV catalog (TVDB).
    Secondary,
    /// Alternate cross-reference id (IMDb).
    Alternate,
}

impl KeyScheme {
    /// All schemes in resolution priority order.
    pub const PRIORITY: [KeyScheme; 3] = [Self::Primary, Self::Secondary, Self::Alternate];

    /// Provider name used by the library and the trackers for this scheme.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Primary => "tmdb",
            Self::Secondary => "tvdb",
            Self::Alternate => "imdb",
        }
    }

    /// Map a provider name ("Tmdb", "tvdb", "IMDB", ...) to its scheme.
    pub fn from_provider_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tmdb" => Some(Self::Primary),
            "tvdb" => Some(Self::Secondary),
            "imdb" => Some(Self::Alternate),
            _ => None,
        }
    }
}

impl fmt::Display for KeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_name())
    }
}

/// A single tagged catalog identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalKey {
    pub scheme: KeyScheme,
    pub value: String,
}

impl ExternalKey {
    pub fn new(scheme: KeyScheme, value: impl Into<String>) -> Self {
        Self {
            scheme,
            value: value.into(),
        }
    }
}

impl fmt::Display for ExternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.value)
    }
}

/// At most one key per scheme, kept in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalKeySet(Vec<ExternalKey>);

impl ExternalKeySet {
    /// Build a set from arbitrary keys. Blank values and "0" (which trackers
    /// send for "unknown") are dropped; the first key seen for a scheme wins.
    pub fn from_keys(keys: impl IntoIterator<Item = ExternalKey>) -> Self {
        let mut out: Vec<ExternalKey> = Vec::new();
        for key in keys {
            let value = key.value.trim();
            if value.is_empty() || value == "0" {
                continue;
            }
            if out.iter().any(|k| k.scheme == key.scheme) {
                continue;
            }
            out.push(ExternalKey::new(key.scheme, value));
        }
        out.sort_by_key(|k| k.scheme);
        Self(out)
    }

    /// Build a set from `(provider name, value)` pairs, ignoring unknown providers.
    pub fn from_provider_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::from_keys(pairs.into_iter().filter_map(|(name, value)| {
            KeyScheme::from_provider_name(name).map(|scheme| ExternalKey::new(scheme, value))
        }))
    }

    /// The highest-priority key, if any.
    pub fn preferred(&self) -> Option<&ExternalKey> {
        self.0.first()
    }

    pub fn get(&self, scheme: KeyScheme) -> Option<&str> {
        self.0
            .iter()
            .find(|k| k.scheme == scheme)
            .map(|k| k.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExternalKey> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if both sets share at least one identical key.
    pub fn overlaps(&self, other: &ExternalKeySet) -> bool {
        self.0.iter().any(|k| other.0.contains(k))
    }

    /// Keys of both sets. Where both carry a scheme, `self`'s value wins.
    pub fn union(&self, other: &ExternalKeySet) -> ExternalKeySet {
        Self::from_keys(self.0.iter().chain(other.0.iter()).cloned())
    }

    /// Composite document key for a pending change: preferred key plus scope.
    ///
    /// Returns an empty string for an empty set; callers reject those before
    /// queueing.
    pub fn composite_key(&self, scope: &EntryScope) -> String {
        match self.preferred() {
            Some(key) => format!("{}{}", key, scope.key_suffix()),
            None => String::new(),
        }
    }
}

impl fmt::Display for ExternalKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|k| k.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// What part of an item a pending change covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryScope {
    /// A movie, or anything else tracked as one unit.
    WholeItem,
    /// Some episodes of one season of a series.
    Season {
        season_number: u32,
        episode_numbers: BTreeSet<u32>,
    },
}

impl EntryScope {
    pub fn season(season_number: u32, episodes: impl IntoIterator<Item = u32>) -> Self {
        Self::Season {
            season_number,
            episode_numbers: episodes.into_iter().collect(),
        }
    }

    /// Suffix appended to the preferred key to form the composite document key.
    /// Episode numbers are deliberately excluded so grabs for the same season
    /// merge into one entry.
    pub fn key_suffix(&self) -> String {
        match self {
            Self::WholeItem => String::new(),
            Self::Season { season_number, .. } => format!(":S{season_number:02}"),
        }
    }

    /// Fold another scope for the same key into this one.
    pub fn merge(&mut self, other: &EntryScope) {
        if let (
            Self::Season {
                episode_numbers, ..
            },
            Self::Season {
                episode_numbers: incoming,
                ..
            },
        ) = (self, other)
        {
            episode_numbers.extend(incoming.iter().copied());
        }
    }

    /// Number of episodes named by a season scope; `None` for whole items.
    pub fn episode_count(&self) -> Option<usize> {
        match self {
            Self::WholeItem => None,
            Self::Season {
                episode_numbers, ..
            } => Some(episode_numbers.len()),
        }
    }
}

impl fmt::Display for EntryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WholeItem => f.write_str("whole item"),
            Self::Season {
                season_number,
                episode_numbers,
            } => {
                write!(f, "season {season_number}")?;
                if !episode_numbers.is_empty() {
                    let eps: Vec<String> =
                        episode_numbers.iter().map(|e| format!("E{e:02}")).collect();
                    write!(f, " ({})", eps.join(", "))?;
                }
                Ok(())
            }
        }
    }
}
