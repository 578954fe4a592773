//! Learning progress with a local cache in front of the record service.
//!
//! Reads are served from the cache. Writes update the cache first and then
//! start the matching remote call on the tokio runtime, handing back a
//! [`RemoteWrite`] that reports its outcome. The remote call runs to
//! completion whether or not the handle is awaited, and the cache change is
//! never rolled back when it fails. The two sides are reconciled only by
//! [`ProgressStore::sync`], which rebuilds the cache from the remote rows.
//!
//! Write methods spawn tasks and must be called from within a tokio runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use quiz_core::snapshot::{self, CacheSnapshot, EXAM_HISTORY_LIMIT};
use quiz_core::types::{DeviceId, ExamHistoryEntry, ProgressFlag, ProgressPatch};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::db::{keys, DbError, LocalCache};
use crate::remote::{RemoteError, RemoteStore};

/// Remote half of a write, already running.
///
/// The local half has been applied before this handle exists. Await it to
/// learn whether the record service confirmed the change; dropping it
/// detaches the task without cancelling the call.
#[must_use = "await the handle to observe remote failures"]
pub struct RemoteWrite {
    task: Option<JoinHandle<Result<(), RemoteError>>>,
}

impl RemoteWrite {
    fn spawn<F>(call: F) -> Self
    where
        F: Future<Output = Result<(), RemoteError>> + Send + 'static,
    {
        Self {
            task: Some(tokio::spawn(call)),
        }
    }

    /// A write with no remote half.
    fn skipped() -> Self {
        Self { task: None }
    }

    /// True once the remote call has finished (or was never needed).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Future for RemoteWrite {
    type Output = Result<(), RemoteError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.task.as_mut() {
            None => Poll::Ready(Ok(())),
            Some(task) => Pin::new(task).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| Err(RemoteError::Task(e.to_string())))
            }),
        }
    }
}

/// Result of [`ProgressStore::toggle_favorite`].
pub struct FavoriteToggle {
    /// New membership: true when the question is now a favorite.
    pub added: bool,
    pub remote: RemoteWrite,
}

/// Sync errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("remote fetch failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("cache write failed: {0}")]
    Cache(#[from] DbError),
}

/// Sync statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub records: usize,
    pub practiced: usize,
    pub wrong: usize,
    pub favorites: usize,
    pub mastered: usize,
    pub exam_history: usize,
}

/// Progress of the current device.
///
/// Construct one per session and share it (`Arc<ProgressStore>`).
pub struct ProgressStore {
    cache: Mutex<LocalCache>,
    device_id: DeviceId,
    remote: Arc<dyn RemoteStore>,
}

impl ProgressStore {
    pub fn new(cache: LocalCache, device_id: DeviceId, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache: Mutex::new(cache),
            device_id,
            remote,
        }
    }

    /// Create a store for the device recorded in `cache`, creating the
    /// device identity on first run.
    pub fn open(cache: LocalCache, remote: Arc<dyn RemoteStore>) -> Result<Self, DbError> {
        let device_id = cache.load_or_create_device_id()?;
        Ok(Self::new(cache, device_id, remote))
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn cache(&self) -> MutexGuard<'_, LocalCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_list(&self, key: &str) -> Vec<String> {
        self.cache().get_or(key, Vec::new())
    }

    /// Read-modify-write of one cached id list. Returns the closure's result.
    fn update_list<R>(&self, key: &str, f: impl FnOnce(&mut Vec<String>) -> (bool, R)) -> R {
        let cache = self.cache();
        let mut list: Vec<String> = cache.get_or(key, Vec::new());
        let (changed, result) = f(&mut list);
        if changed {
            if let Err(e) = cache.set(key, &list) {
                tracing::warn!(key, error = %e, "cache write failed");
            }
        }
        result
    }

    /// Remote upsert of `patch`, not yet started.
    fn upsert_call(
        &self,
        patch: ProgressPatch,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send + 'static {
        let remote = Arc::clone(&self.remote);
        let device = self.device_id.clone();
        async move {
            tracing::debug!(question_id = %patch.question_id, "upserting progress");
            remote.upsert_progress(&device, &patch).await.map_err(|e| {
                tracing::warn!(
                    question_id = %patch.question_id,
                    error = %e,
                    "progress upsert failed, keeping local state"
                );
                e
            })
        }
    }

    fn upsert(&self, patch: ProgressPatch) -> RemoteWrite {
        RemoteWrite::spawn(self.upsert_call(patch))
    }

    // === Sync ===

    /// Rebuild the cache from the record service.
    ///
    /// Fetches all progress rows of the device and the most recent exam
    /// history. The cache is only replaced when both fetches succeed; on
    /// failure it is left exactly as it was.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let records = match self.remote.fetch_progress(&self.device_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "sync from server failed, using local data");
                return Err(e.into());
            }
        };
        let history = match self
            .remote
            .fetch_exam_history(&self.device_id, EXAM_HISTORY_LIMIT)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(error = %e, "exam history sync failed, using local data");
                return Err(e.into());
            }
        };

        let snapshot = CacheSnapshot::from_records(&records, history);
        self.cache().replace_snapshot(&snapshot).map_err(|e| {
            tracing::warn!(error = %e, "could not store synced progress");
            e
        })?;

        let report = SyncReport {
            records: records.len(),
            practiced: snapshot.practiced_count(),
            wrong: snapshot.wrong.len(),
            favorites: snapshot.favorites.len(),
            mastered: snapshot.mastered.len(),
            exam_history: snapshot.exam_history.len(),
        };
        tracing::info!(
            device_id = %self.device_id,
            records = report.records,
            practiced = report.practiced,
            "progress synced"
        );
        Ok(report)
    }

    /// Whole cached projection.
    pub fn snapshot(&self) -> CacheSnapshot {
        self.cache().snapshot().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cache read failed");
            CacheSnapshot::default()
        })
    }

    // === Practiced ===

    pub fn practiced(&self, chapter_id: &str) -> Vec<String> {
        self.read_list(&keys::practiced(chapter_id))
    }

    pub fn is_practiced(&self, chapter_id: &str, question_id: &str) -> bool {
        self.practiced(chapter_id).iter().any(|id| id == question_id)
    }

    /// Practiced questions summed over the given chapters.
    pub fn practiced_total<'a>(&self, chapter_ids: impl IntoIterator<Item = &'a str>) -> usize {
        chapter_ids
            .into_iter()
            .map(|chapter_id| self.practiced(chapter_id).len())
            .sum()
    }

    pub fn mark_practiced(&self, chapter_id: &str, question_id: &str) -> RemoteWrite {
        self.update_list(&keys::practiced(chapter_id), |list| {
            (snapshot::insert_unique(list, question_id), ())
        });
        self.upsert(
            ProgressPatch::new(question_id)
                .with_chapter(chapter_id)
                .with_flag(ProgressFlag::Practiced, true),
        )
    }

    /// Forget the chapter's practiced questions.
    ///
    /// The remote bulk update is skipped when nothing was cached as
    /// practiced for the chapter.
    pub fn reset_chapter(&self, chapter_id: &str) -> RemoteWrite {
        let key = keys::practiced(chapter_id);
        let previous = self.update_list(&key, |list| (true, std::mem::take(list)));
        if previous.is_empty() {
            return RemoteWrite::skipped();
        }

        let remote = Arc::clone(&self.remote);
        let device = self.device_id.clone();
        let chapter_id = chapter_id.to_string();
        RemoteWrite::spawn(async move {
            match remote.reset_chapter(&device, &chapter_id).await {
                Ok(updated) => {
                    tracing::debug!(%chapter_id, updated, "chapter progress reset");
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(%chapter_id, error = %e, "reset chapter failed");
                    Err(e)
                }
            }
        })
    }

    // === Wrong answers ===

    pub fn wrong_list(&self) -> Vec<String> {
        self.read_list(keys::WRONG)
    }

    pub fn is_wrong(&self, question_id: &str) -> bool {
        self.wrong_list().iter().any(|id| id == question_id)
    }

    pub fn mark_wrong(&self, question_id: &str) -> RemoteWrite {
        self.update_list(keys::WRONG, |list| {
            (snapshot::insert_unique(list, question_id), ())
        });
        self.upsert(ProgressPatch::new(question_id).with_flag(ProgressFlag::Wrong, true))
    }

    fn clear_wrong_locally(&self, question_id: &str) -> ProgressPatch {
        self.update_list(keys::WRONG, |list| (snapshot::remove_id(list, question_id), ()));
        ProgressPatch::new(question_id).with_flag(ProgressFlag::Wrong, false)
    }

    pub fn clear_wrong(&self, question_id: &str) -> RemoteWrite {
        let patch = self.clear_wrong_locally(question_id);
        self.upsert(patch)
    }

    // === Favorites ===

    pub fn favorites(&self) -> Vec<String> {
        self.read_list(keys::FAVORITES)
    }

    pub fn is_favorite(&self, question_id: &str) -> bool {
        self.favorites().iter().any(|id| id == question_id)
    }

    /// Flip favorite membership; the new state is known before the remote
    /// write runs.
    pub fn toggle_favorite(&self, question_id: &str) -> FavoriteToggle {
        let added = self.update_list(keys::FAVORITES, |list| {
            if snapshot::remove_id(list, question_id) {
                (true, false)
            } else {
                list.push(question_id.to_string());
                (true, true)
            }
        });
        let remote =
            self.upsert(ProgressPatch::new(question_id).with_flag(ProgressFlag::Favorite, added));
        FavoriteToggle { added, remote }
    }

    // === Mastered ===

    pub fn mastered(&self) -> Vec<String> {
        self.read_list(keys::MASTERED)
    }

    pub fn is_mastered(&self, question_id: &str) -> bool {
        self.mastered().iter().any(|id| id == question_id)
    }

    /// Add to the mastered set. Wrong status is left alone; see
    /// [`ProgressStore::master_question`].
    fn mark_mastered_locally(&self, question_id: &str) -> ProgressPatch {
        self.update_list(keys::MASTERED, |list| {
            (snapshot::insert_unique(list, question_id), ())
        });
        ProgressPatch::new(question_id).with_flag(ProgressFlag::Mastered, true)
    }

    pub fn mark_mastered(&self, question_id: &str) -> RemoteWrite {
        let patch = self.mark_mastered_locally(question_id);
        self.upsert(patch)
    }

    /// `mark_mastered` followed by `clear_wrong`. The remote upserts run in
    /// that order inside one task; both run even if the first fails.
    pub fn master_question(&self, question_id: &str) -> RemoteWrite {
        let mastered = self.upsert_call(self.mark_mastered_locally(question_id));
        let cleared = self.upsert_call(self.clear_wrong_locally(question_id));
        RemoteWrite::spawn(async move {
            let first = mastered.await;
            let second = cleared.await;
            first.and(second)
        })
    }

    // === Exam history ===

    /// Cached exam history, newest first.
    pub fn exam_history(&self) -> Vec<ExamHistoryEntry> {
        self.cache().get_or(keys::EXAM_HISTORY, Vec::new())
    }

    pub fn record_exam_result(&self, entry: ExamHistoryEntry) -> RemoteWrite {
        {
            let cache = self.cache();
            let mut history: Vec<ExamHistoryEntry> = cache.get_or(keys::EXAM_HISTORY, Vec::new());
            snapshot::prepend_history(&mut history, entry.clone());
            if let Err(e) = cache.set(keys::EXAM_HISTORY, &history) {
                tracing::warn!(error = %e, "cache write failed");
            }
        }

        let remote = Arc::clone(&self.remote);
        let device = self.device_id.clone();
        RemoteWrite::spawn(async move {
            remote
                .insert_exam_result(&device, &entry)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "save exam history failed");
                    e
                })
        })
    }

    // === Reset ===

    /// Clear every cached value of this app and delete the device's remote
    /// progress and history. The device identity is kept.
    pub fn reset_all(&self) -> RemoteWrite {
        match self.cache().clear_namespace() {
            Ok(removed) => tracing::debug!(removed, "local cache cleared"),
            Err(e) => tracing::warn!(error = %e, "could not clear local cache"),
        }

        let remote = Arc::clone(&self.remote);
        let device = self.device_id.clone();
        RemoteWrite::spawn(async move {
            let progress = remote.delete_progress(&device).await;
            let history = remote.delete_exam_history(&device).await;
            match (progress, history) {
                (Ok(progress), Ok(history)) => {
                    tracing::debug!(progress, history, "remote progress reset");
                    Ok(())
                }
                (Err(e), _) | (Ok(_), Err(e)) => {
                    tracing::warn!(error = %e, "remote reset failed");
                    Err(e)
                }
            }
        })
    }

    // === Admin session flag ===

    pub fn admin_authenticated(&self) -> bool {
        self.cache().get_or(keys::ADMIN_AUTH, false)
    }

    pub fn set_admin_authenticated(&self, value: bool) {
        if let Err(e) = self.cache().set(keys::ADMIN_AUTH, &value) {
            tracing::warn!(error = %e, "cache write failed");
        }
    }
}
