//! In-process record service.
//!
//! Follows the same contracts as the backend (upsert keyed by device and
//! question, newest-first history) and can be switched offline to exercise
//! the fail-soft paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use quiz_core::types::{Chapter, DeviceId, ExamHistoryEntry, ProgressPatch, ProgressRecord, Question};

use super::{CatalogSource, RemoteError, RemoteStore, Result};

#[derive(Default)]
struct State {
    progress: Vec<ProgressRecord>,
    history: Vec<(DeviceId, ExamHistoryEntry)>,
    chapters: Vec<Chapter>,
    questions: Vec<Question>,
}

/// Record service kept in memory.
#[derive(Default)]
pub struct InMemoryRemote {
    state: Mutex<State>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a question bank.
    pub fn with_catalog(chapters: Vec<Chapter>, questions: Vec<Question>) -> Self {
        let remote = Self::default();
        {
            let mut state = remote.lock();
            state.chapters = chapters;
            state.questions = questions;
        }
        remote
    }

    /// Make every following call fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls received, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Insert or replace a progress row directly.
    pub fn seed_progress(&self, record: ProgressRecord) {
        let mut state = self.lock();
        state
            .progress
            .retain(|r| !(r.device_id == record.device_id && r.question_id == record.question_id));
        state.progress.push(record);
    }

    /// Stored row for (device, question).
    pub fn progress_row(&self, device: &DeviceId, question_id: &str) -> Option<ProgressRecord> {
        self.lock()
            .progress
            .iter()
            .find(|r| &r.device_id == device && r.question_id == question_id)
            .cloned()
    }

    /// All stored history of the device, newest first, without any limit.
    pub fn history_of(&self, device: &DeviceId) -> Vec<ExamHistoryEntry> {
        let mut entries: Vec<_> = self
            .lock()
            .history
            .iter()
            .filter(|(d, _)| d == device)
            .map(|(_, e)| e.clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self) -> Result<MutexGuard<'_, State>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("record service unreachable".into()));
        }
        Ok(self.lock())
    }
}

fn not_found(what: &str, id: &str) -> RemoteError {
    RemoteError::Backend {
        status: 404,
        message: format!("{what} not found: {id}"),
    }
}

fn conflict(what: &str, id: &str) -> RemoteError {
    RemoteError::Backend {
        status: 409,
        message: format!("{what} already exists: {id}"),
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn fetch_progress(&self, device: &DeviceId) -> Result<Vec<ProgressRecord>> {
        let state = self.enter()?;
        Ok(state
            .progress
            .iter()
            .filter(|r| &r.device_id == device)
            .cloned()
            .collect())
    }

    async fn upsert_progress(&self, device: &DeviceId, patch: &ProgressPatch) -> Result<()> {
        let mut state = self.enter()?;
        let now = Utc::now();
        match state
            .progress
            .iter_mut()
            .find(|r| &r.device_id == device && r.question_id == patch.question_id)
        {
            Some(row) => row.apply(patch, now),
            None => {
                let mut row = ProgressRecord::new(device.clone(), patch.question_id.clone());
                row.apply(patch, now);
                state.progress.push(row);
            }
        }
        Ok(())
    }

    async fn reset_chapter(&self, device: &DeviceId, chapter_id: &str) -> Result<u64> {
        let mut state = self.enter()?;
        let now = Utc::now();
        let mut updated = 0;
        for row in state
            .progress
            .iter_mut()
            .filter(|r| &r.device_id == device && r.chapter_id == chapter_id)
        {
            row.is_practiced = false;
            row.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_progress(&self, device: &DeviceId) -> Result<u64> {
        let mut state = self.enter()?;
        let before = state.progress.len();
        state.progress.retain(|r| &r.device_id != device);
        Ok((before - state.progress.len()) as u64)
    }

    async fn fetch_exam_history(
        &self,
        device: &DeviceId,
        limit: usize,
    ) -> Result<Vec<ExamHistoryEntry>> {
        drop(self.enter()?);
        let mut entries = self.history_of(device);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn insert_exam_result(&self, device: &DeviceId, entry: &ExamHistoryEntry) -> Result<()> {
        let mut state = self.enter()?;
        state.history.push((device.clone(), entry.clone()));
        Ok(())
    }

    async fn delete_exam_history(&self, device: &DeviceId) -> Result<u64> {
        let mut state = self.enter()?;
        let before = state.history.len();
        state.history.retain(|(d, _)| d != device);
        Ok((before - state.history.len()) as u64)
    }
}

#[async_trait]
impl CatalogSource for InMemoryRemote {
    async fn fetch_chapters(&self) -> Result<Vec<Chapter>> {
        let state = self.enter()?;
        let mut chapters = state.chapters.clone();
        chapters.sort_by_key(|c| c.order);
        Ok(chapters)
    }

    async fn fetch_questions(&self) -> Result<Vec<Question>> {
        Ok(self.enter()?.questions.clone())
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        let mut state = self.enter()?;
        if state.chapters.iter().any(|c| c.id == chapter.id) {
            return Err(conflict("chapter", &chapter.id));
        }
        state.chapters.push(chapter.clone());
        Ok(())
    }

    async fn delete_chapter(&self, chapter_id: &str) -> Result<()> {
        let mut state = self.enter()?;
        let before = state.chapters.len();
        state.chapters.retain(|c| c.id != chapter_id);
        if state.chapters.len() == before {
            return Err(not_found("chapter", chapter_id));
        }
        Ok(())
    }

    async fn insert_question(&self, question: &Question) -> Result<()> {
        let mut state = self.enter()?;
        if state.questions.iter().any(|q| q.id == question.id) {
            return Err(conflict("question", &question.id));
        }
        state.questions.push(question.clone());
        Ok(())
    }

    async fn update_question(&self, question: &Question) -> Result<()> {
        let mut state = self.enter()?;
        let slot = state
            .questions
            .iter_mut()
            .find(|q| q.id == question.id)
            .ok_or_else(|| not_found("question", &question.id))?;
        *slot = question.clone();
        Ok(())
    }

    async fn delete_question(&self, question_id: &str) -> Result<()> {
        let mut state = self.enter()?;
        let before = state.questions.len();
        state.questions.retain(|q| q.id != question_id);
        if state.questions.len() == before {
            return Err(not_found("question", question_id));
        }
        Ok(())
    }
}
