//! Maps catalog identifiers to library items.
//!
//! Resolution runs fresh on every reconciliation pass; nothing here is cached,
//! so a library rescan that changes item ids heals on the next tick.

use crate::library::{LibraryClient, LibraryItem, LibraryItemRef};
use reelwatch_common::{ExternalKeySet, ItemKind};
use std::sync::Arc;

/// Score bonus for an exact release-year match.
const YEAR_MATCH_SCORE: f64 = 3.0;

/// Maximum score contributed by title similarity.
const TITLE_MATCH_WEIGHT: f64 = 2.0;

pub struct IdentityResolver {
    library: Arc<dyn LibraryClient>,
}

impl IdentityResolver {
    pub fn new(library: Arc<dyn LibraryClient>) -> Self {
        Self { library }
    }

    /// Resolve a key set to a library item of the given kind.
    ///
    /// Keys are tried in priority order; the first key that yields any
    /// candidates decides. `None` is the ordinary "not in the library yet"
    /// answer, and lookup failures are folded into it.
    pub async fn resolve(
        &self,
        kind: ItemKind,
        keys: &ExternalKeySet,
        title_hint: &str,
        year_hint: Option<i32>,
    ) -> Option<LibraryItemRef> {
        for key in keys.iter() {
            let candidates = match self.library.find_by_key(kind, key).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Library lookup failed; treating as not found");
                    continue;
                }
            };

            if let Some(best) = pick_best(&candidates, title_hint, year_hint) {
                if candidates.len() > 1 {
                    tracing::debug!(
                        key = %key,
                        candidates = candidates.len(),
                        chosen = %best.id,
                        "Multiple library matches; picked highest score"
                    );
                }
                return Some(best.to_ref());
            }
        }

        None
    }

    /// Resolve the season child with the given index under a resolved series.
    pub async fn resolve_season(
        &self,
        series: &LibraryItemRef,
        season_number: u32,
    ) -> Option<LibraryItemRef> {
        let seasons = match self.library.children(&series.item_id, ItemKind::Season).await {
            Ok(seasons) => seasons,
            Err(e) => {
                tracing::debug!(
                    series_id = %series.item_id,
                    season = season_number,
                    error = %e,
                    "Season lookup failed; treating as not found"
                );
                return None;
            }
        };

        seasons
            .iter()
            .find(|s| s.index_number == Some(season_number))
            .map(|s| LibraryItemRef {
                item_id: s.id.clone(),
                display_name: s.name.clone(),
                release_year: s.production_year.or(series.release_year),
            })
    }
}

/// Candidate confidence: year match plus weighted title similarity.
pub fn score_candidate(item: &LibraryItem, title_hint: &str, year_hint: Option<i32>) -> f64 {
    let mut score = 0.0;
    if year_hint.is_some() && item.production_year == year_hint {
        score += YEAR_MATCH_SCORE;
    }
    if !title_hint.is_empty() {
        let similarity = strsim::jaro_winkler(
            &item.name.to_lowercase(),
            &title_hint.to_lowercase(),
        );
        score += TITLE_MATCH_WEIGHT * similarity;
    }
    score
}

/// Highest-scoring candidate; ties go to the earliest one.
fn pick_best<'a>(
    candidates: &'a [LibraryItem],
    title_hint: &str,
    year_hint: Option<i32>,
) -> Option<&'a LibraryItem> {
    let mut best: Option<(&LibraryItem, f64)> = None;
    for item in candidates {
        let score = score_candidate(item, title_hint, year_hint);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((item, score)),
        }
    }
    best.map(|(item, _)| item)
}
