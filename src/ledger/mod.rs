//! Bounded record of items already announced as new.

use crate::state::{Document, StateStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DOCUMENT_NAME: &str = "notified";

/// Keys look like `"Movie:Inception:2010"`; values are when the item was
/// announced. The oldest entry is evicted once the ledger is full.
pub struct NotifiedLedger {
    doc: Document<BTreeMap<String, DateTime<Utc>>>,
    max_entries: usize,
}

impl NotifiedLedger {
    pub fn new(store: Arc<StateStore>, max_entries: usize) -> Self {
        Self {
            doc: Document::open(store, DOCUMENT_NAME),
            max_entries: max_entries.max(1),
        }
    }

    pub fn key(item_type: &str, name: &str, year: Option<i32>) -> String {
        match year {
            Some(year) => format!("{item_type}:{name}:{year}"),
            None => format!("{item_type}:{name}:"),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.doc.read(|entries| entries.contains_key(key))
    }

    pub fn mark(&self, key: &str, at: DateTime<Utc>) {
        let max_entries = self.max_entries;
        self.doc.update(|entries| {
            entries.insert(key.to_string(), at);
            while entries.len() > max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, at)| **at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                        tracing::info!(key = %oldest, "Evicted oldest notified entry");
                    }
                    None => break,
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.doc.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
