//! Anti-spam gate for "new episodes" notifications.
//!
//! Episodes of one season tend to land in bursts. The gate lets the first
//! episode of a burst through, swallows the rest until a quiet window has
//! passed, and always lets the season-completing episode through.

use crate::state::{Document, StateStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DOCUMENT_NAME: &str = "season-progress";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonProgressRecord {
    pub season_id: String,
    pub last_observed_episode_count: u32,
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl SeasonProgressRecord {
    fn new(season_id: &str) -> Self {
        Self {
            season_id: season_id.to_string(),
            last_observed_episode_count: 0,
            last_notified_at: None,
        }
    }
}

pub struct SeasonProgressGate {
    doc: Document<BTreeMap<String, SeasonProgressRecord>>,
    min_gap: Duration,
}

impl SeasonProgressGate {
    pub fn new(store: Arc<StateStore>, min_gap: Duration) -> Self {
        Self {
            doc: Document::open(store, DOCUMENT_NAME),
            min_gap,
        }
    }

    pub fn should_notify(&self, season_id: &str, current_count: u32, planned_total: Option<u32>) -> bool {
        self.should_notify_at(season_id, current_count, planned_total, Utc::now())
    }

    /// Record the observed count and decide whether it deserves a
    /// notification. Records are created on first sight and never deleted.
    pub fn should_notify_at(
        &self,
        season_id: &str,
        current_count: u32,
        planned_total: Option<u32>,
        now: DateTime<Utc>,
    ) -> bool {
        let min_gap = self.min_gap;
        self.doc.update(|records| {
            let record = records
                .entry(season_id.to_string())
                .or_insert_with(|| SeasonProgressRecord::new(season_id));

            let previous = record.last_observed_episode_count;
            record.last_observed_episode_count = previous.max(current_count);

            if current_count <= previous {
                return false;
            }

            let gap_elapsed = match record.last_notified_at {
                Some(at) => now - at >= min_gap,
                None => true,
            };
            let season_complete = planned_total.is_some_and(|total| current_count >= total);

            gap_elapsed || season_complete
        })
    }

    /// Stamp a season as notified. Only call after a successful dispatch.
    pub fn record_notified(&self, season_id: &str, at: DateTime<Utc>) {
        self.doc.update(|records| {
            records
                .entry(season_id.to_string())
                .or_insert_with(|| SeasonProgressRecord::new(season_id))
                .last_notified_at = Some(at);
        });
    }

    /// Episode count last observed for a season (0 when never seen).
    pub fn recorded_count(&self, season_id: &str) -> u32 {
        self.doc.read(|records| {
            records
                .get(season_id)
                .map(|r| r.last_observed_episode_count)
                .unwrap_or(0)
        })
    }

    pub fn record(&self, season_id: &str) -> Option<SeasonProgressRecord> {
        self.doc.read(|records| records.get(season_id).cloned())
    }
}
