//! Cache projection of remote progress rows.
//!
//! The snapshot is what the client keeps locally: practiced question ids per
//! chapter, flat wrong/favorite/mastered id lists and the most recent exam
//! history. It is never authoritative and can always be rebuilt from the
//! rows of the record service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ExamHistoryEntry, ProgressRecord};

/// Number of exam history entries kept in the local cache.
pub const EXAM_HISTORY_LIMIT: usize = 10;

/// UI-shaped projection of one device's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub practiced: BTreeMap<String, Vec<String>>,
    pub wrong: Vec<String>,
    pub favorites: Vec<String>,
    pub mastered: Vec<String>,
    pub exam_history: Vec<ExamHistoryEntry>,
}

impl CacheSnapshot {
    /// Rebuild the projection from scratch.
    ///
    /// Row order is preserved within each list. A practiced row without a
    /// chapter cannot be placed and is skipped. `history` is expected newest
    /// first and is truncated to [`EXAM_HISTORY_LIMIT`].
    pub fn from_records(records: &[ProgressRecord], history: Vec<ExamHistoryEntry>) -> Self {
        let mut snapshot = Self::default();

        for row in records {
            if row.is_practiced && !row.chapter_id.is_empty() {
                let list = snapshot.practiced.entry(row.chapter_id.clone()).or_default();
                insert_unique(list, &row.question_id);
            }
            if row.is_wrong {
                insert_unique(&mut snapshot.wrong, &row.question_id);
            }
            if row.is_favorite {
                insert_unique(&mut snapshot.favorites, &row.question_id);
            }
            if row.is_mastered {
                insert_unique(&mut snapshot.mastered, &row.question_id);
            }
        }

        snapshot.exam_history = history;
        snapshot.exam_history.truncate(EXAM_HISTORY_LIMIT);
        snapshot
    }

    /// Total practiced questions across all chapters.
    pub fn practiced_count(&self) -> usize {
        self.practiced.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.practiced.values().all(Vec::is_empty)
            && self.wrong.is_empty()
            && self.favorites.is_empty()
            && self.mastered.is_empty()
            && self.exam_history.is_empty()
    }
}

/// Append `id` unless already present. Returns whether it was added.
pub fn insert_unique(list: &mut Vec<String>, id: &str) -> bool {
    if list.iter().any(|existing| existing == id) {
        return false;
    }
    list.push(id.to_string());
    true
}

/// Remove every occurrence of `id`. Returns whether anything was removed.
pub fn remove_id(list: &mut Vec<String>, id: &str) -> bool {
    let before = list.len();
    list.retain(|existing| existing != id);
    list.len() != before
}

/// Put `entry` at the front of a newest-first history and enforce the cap.
pub fn prepend_history(history: &mut Vec<ExamHistoryEntry>, entry: ExamHistoryEntry) {
    history.insert(0, entry);
    history.truncate(EXAM_HISTORY_LIMIT);
}
