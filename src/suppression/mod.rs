//! Short-lived marks that silence inbound "new item" notifications for an
//! item whose quality upgrade was just announced.

use crate::state::{Document, StateStore};
use chrono::{DateTime, Duration, Utc};
use reelwatch_common::{ExternalKey, ExternalKeySet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DOCUMENT_NAME: &str = "suppression";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionMark {
    pub expires_at: DateTime<Utc>,
}

/// Marks keyed by `"<scheme>:<value>"`.
pub struct SuppressionMarks {
    doc: Document<BTreeMap<String, SuppressionMark>>,
}

impl SuppressionMarks {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            doc: Document::open(store, DOCUMENT_NAME),
        }
    }

    /// Mark every key in the set as suppressed for `ttl`.
    pub fn mark(&self, keys: &ExternalKeySet, ttl: Duration, now: DateTime<Utc>) {
        if keys.is_empty() {
            return;
        }
        let expires_at = now + ttl;
        self.doc.update(|marks| {
            for key in keys.iter() {
                marks.insert(key.to_string(), SuppressionMark { expires_at });
            }
        });
        tracing::debug!(keys = %keys, expires_at = %expires_at, "Suppression marks set");
    }

    /// Whether `key` is currently suppressed. Expired marks for the key are
    /// purged on the way.
    pub fn is_active_at(&self, key: &ExternalKey, now: DateTime<Utc>) -> bool {
        let id = key.to_string();
        self.doc.update_if_changed(|marks| match marks.get(&id) {
            Some(mark) if mark.expires_at > now => (true, false),
            Some(_) => {
                marks.remove(&id);
                (false, true)
            }
            None => (false, false),
        })
    }

    pub fn is_any_active(&self, keys: &ExternalKeySet, now: DateTime<Utc>) -> bool {
        // No short-circuit: every key gets its expired mark purged.
        keys.iter()
            .map(|key| self.is_active_at(key, now))
            .fold(false, |acc, active| acc || active)
    }

    pub fn len(&self) -> usize {
        self.doc.read(|marks| marks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
