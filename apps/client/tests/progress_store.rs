//! ProgressStore behavior against an in-memory cache and record service.

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use quiz_client::db::{keys, LocalCache};
use quiz_client::remote::memory::InMemoryRemote;
use quiz_client::remote::RemoteError;
use quiz_client::{ProgressStore, RemoteStore, SyncError};
use quiz_core::{ExamHistoryEntry, ProgressRecord, EXAM_HISTORY_LIMIT};

fn setup() -> (Arc<InMemoryRemote>, ProgressStore) {
    let remote = Arc::new(InMemoryRemote::new());
    let cache = LocalCache::open_in_memory("quiz_").unwrap();
    let store = ProgressStore::open(cache, remote.clone()).unwrap();
    (remote, store)
}

fn exam(minutes_ago: i64, score: u32) -> ExamHistoryEntry {
    ExamHistoryEntry {
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        score,
        total: 20,
        correct: score / 5,
        wrong: 20 - score / 5,
        used_time: 600,
    }
}

#[tokio::test]
async fn mark_practiced_is_visible_before_remote_write_completes() {
    let (remote, store) = setup();

    let pending = store.mark_practiced("ch1", "q1");
    assert!(store.is_practiced("ch1", "q1"));

    pending.await.unwrap();
    let row = remote.progress_row(store.device_id(), "q1").unwrap();
    assert!(row.is_practiced);
    assert_eq!(row.chapter_id, "ch1");
}

#[tokio::test]
async fn mark_practiced_is_idempotent() {
    let (_, store) = setup();
    store.mark_practiced("ch1", "q1").await.unwrap();
    store.mark_practiced("ch1", "q1").await.unwrap();
    store.mark_practiced("ch1", "q2").await.unwrap();

    assert_eq!(store.practiced("ch1"), vec!["q1", "q2"]);
    assert_eq!(store.practiced_total(["ch1", "ch2"]), 2);
}

#[tokio::test]
async fn toggling_favorite_twice_restores_membership() {
    let (remote, store) = setup();

    let first = store.toggle_favorite("q1");
    assert!(first.added);
    first.remote.await.unwrap();
    assert!(store.is_favorite("q1"));

    let second = store.toggle_favorite("q1");
    assert!(!second.added);
    second.remote.await.unwrap();

    assert!(!store.is_favorite("q1"));
    assert!(store.favorites().is_empty());
    assert!(!remote.progress_row(store.device_id(), "q1").unwrap().is_favorite);
}

#[tokio::test]
async fn concurrent_favorites_keep_their_own_rows() {
    let (remote, store) = setup();

    let a = store.toggle_favorite("q1");
    let b = store.toggle_favorite("q2");
    let (ra, rb) = tokio::join!(b.remote, a.remote);
    ra.unwrap();
    rb.unwrap();

    let device = store.device_id();
    assert!(remote.progress_row(device, "q1").unwrap().is_favorite);
    assert!(remote.progress_row(device, "q2").unwrap().is_favorite);
    assert_eq!(store.favorites(), vec!["q1", "q2"]);
}

#[tokio::test]
async fn reset_all_then_sync_against_empty_remote_is_empty() {
    let (_, store) = setup();
    store.mark_practiced("ch1", "q1").await.unwrap();
    store.mark_wrong("q2").await.unwrap();
    store.toggle_favorite("q3").remote.await.unwrap();
    store.mark_mastered("q4").await.unwrap();
    store.record_exam_result(exam(0, 80)).await.unwrap();
    let device = store.device_id().clone();

    store.reset_all().await.unwrap();
    let report = store.sync().await.unwrap();

    assert_eq!(report.records, 0);
    assert!(store.snapshot().is_empty());
    assert!(store.practiced("ch1").is_empty());
    assert!(store.exam_history().is_empty());
    assert_eq!(store.device_id(), &device);
}

#[tokio::test]
async fn exam_history_cache_is_capped() {
    let (remote, store) = setup();

    for i in 0..15 {
        store.record_exam_result(exam(15 - i, i as u32)).await.unwrap();
        assert!(store.exam_history().len() <= EXAM_HISTORY_LIMIT);
    }

    let history = store.exam_history();
    assert_eq!(history.len(), EXAM_HISTORY_LIMIT);
    assert_eq!(history[0].score, 14);
    assert_eq!(remote.history_of(store.device_id()).len(), 15);
}

#[tokio::test]
async fn sync_pulls_remote_flags_into_empty_cache() {
    let (remote, store) = setup();
    let mut row = ProgressRecord::new(store.device_id().clone(), "q1");
    row.is_wrong = true;
    remote.seed_progress(row);

    assert!(!store.is_wrong("q1"));
    store.sync().await.unwrap();
    assert!(store.is_wrong("q1"));
}

#[tokio::test]
async fn sync_rebuilds_every_list() {
    let (remote, store) = setup();
    let device = store.device_id().clone();

    let mut practiced = ProgressRecord::new(device.clone(), "q1");
    practiced.chapter_id = "ch1".into();
    practiced.is_practiced = true;
    practiced.is_favorite = true;
    remote.seed_progress(practiced);

    let mut orphan = ProgressRecord::new(device.clone(), "q2");
    orphan.is_practiced = true;
    orphan.is_mastered = true;
    remote.seed_progress(orphan);

    let other = ProgressRecord {
        is_wrong: true,
        ..ProgressRecord::new(quiz_core::DeviceId::parse("someone-else").unwrap(), "q3")
    };
    remote.seed_progress(other);

    for i in 0..12 {
        remote
            .insert_exam_result(&device, &exam(20 - i, i as u32))
            .await
            .unwrap();
    }

    // Stale local state that the remote does not know about.
    store.mark_practiced("ch9", "q9").await.unwrap();
    remote.seed_progress(ProgressRecord::new(device.clone(), "q9"));

    let report = store.sync().await.unwrap();

    assert_eq!(store.practiced("ch1"), vec!["q1"]);
    assert!(store.practiced("ch9").is_empty());
    assert_eq!(store.favorites(), vec!["q1"]);
    assert_eq!(store.mastered(), vec!["q2"]);
    assert!(store.wrong_list().is_empty());
    assert_eq!(report.practiced, 1);
    assert_eq!(report.exam_history, EXAM_HISTORY_LIMIT);
    assert_eq!(store.exam_history()[0].score, 11);
}

#[tokio::test]
async fn failed_sync_leaves_cache_untouched() {
    let (remote, store) = setup();
    store.mark_wrong("q1").await.unwrap();
    store.record_exam_result(exam(0, 90)).await.unwrap();
    let before = store.snapshot();

    remote.set_offline(true);
    let err = store.sync().await.unwrap_err();

    assert!(matches!(err, SyncError::Remote(RemoteError::Network(_))));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn reset_chapter_clears_locally_even_when_remote_fails() {
    let (remote, store) = setup();
    store.mark_practiced("ch1", "q1").await.unwrap();

    remote.set_offline(true);
    let pending = store.reset_chapter("ch1");
    assert!(store.practiced("ch1").is_empty());
    assert!(pending.await.is_err());
    assert!(store.practiced("ch1").is_empty());
}

#[tokio::test]
async fn reset_chapter_updates_remote_rows() {
    let (remote, store) = setup();
    store.mark_practiced("ch1", "q1").await.unwrap();
    store.mark_practiced("ch2", "q2").await.unwrap();

    store.reset_chapter("ch1").await.unwrap();

    let device = store.device_id();
    assert!(!remote.progress_row(device, "q1").unwrap().is_practiced);
    assert!(remote.progress_row(device, "q2").unwrap().is_practiced);
    assert_eq!(store.practiced("ch2"), vec!["q2"]);
}

#[tokio::test]
async fn reset_of_empty_chapter_skips_remote() {
    let (remote, store) = setup();
    store.reset_chapter("ch1").await.unwrap();
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn offline_writes_keep_local_state() {
    let (remote, store) = setup();
    remote.set_offline(true);

    let err = store.mark_wrong("q1").await.unwrap_err();
    assert!(matches!(err, RemoteError::Network(_)));
    assert!(store.is_wrong("q1"));

    assert!(store.reset_all().await.is_err());
    assert!(store.wrong_list().is_empty());
}

#[tokio::test]
async fn wrong_list_add_and_clear() {
    let (remote, store) = setup();
    store.mark_wrong("q1").await.unwrap();
    store.mark_wrong("q1").await.unwrap();
    assert_eq!(store.wrong_list(), vec!["q1"]);

    store.clear_wrong("q1").await.unwrap();
    assert!(!store.is_wrong("q1"));
    assert!(!remote.progress_row(store.device_id(), "q1").unwrap().is_wrong);
}

#[tokio::test]
async fn mark_wrong_keeps_remote_chapter() {
    let (remote, store) = setup();
    store.mark_practiced("ch1", "q1").await.unwrap();
    store.mark_wrong("q1").await.unwrap();

    let row = remote.progress_row(store.device_id(), "q1").unwrap();
    assert_eq!(row.chapter_id, "ch1");
    assert!(row.is_practiced);
    assert!(row.is_wrong);
}

#[tokio::test]
async fn mastering_a_question_clears_wrong() {
    let (remote, store) = setup();
    store.mark_wrong("q1").await.unwrap();

    store.mark_mastered("q1").await.unwrap();
    assert!(store.is_wrong("q1"));

    store.master_question("q1").await.unwrap();
    assert!(store.is_mastered("q1"));
    assert!(!store.is_wrong("q1"));

    let row = remote.progress_row(store.device_id(), "q1").unwrap();
    assert!(row.is_mastered);
    assert!(!row.is_wrong);
}

/// Waits until the in-memory service has seen `n` calls.
async fn wait_for_calls(remote: &InMemoryRemote, n: usize) {
    for _ in 0..1000 {
        if remote.calls() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
}

/// Writes whose handles are never awaited still reach the service, so a
/// later sync keeps them.
#[tokio::test]
async fn discarded_writes_still_reach_remote() {
    let (remote, store) = setup();

    drop(store.mark_practiced("ch1", "q1"));
    drop(store.mark_wrong("q2"));
    let _ = store.toggle_favorite("q3");
    drop(store.master_question("q4"));
    wait_for_calls(&remote, 5).await;

    assert!(remote.calls() > 0);
    let device = store.device_id();
    assert!(remote.progress_row(device, "q1").unwrap().is_practiced);
    assert!(remote.progress_row(device, "q2").unwrap().is_wrong);
    assert!(remote.progress_row(device, "q3").unwrap().is_favorite);
    assert!(remote.progress_row(device, "q4").unwrap().is_mastered);

    store.sync().await.unwrap();
    assert_eq!(store.practiced("ch1"), vec!["q1"]);
    assert_eq!(store.wrong_list(), vec!["q2"]);
    assert_eq!(store.favorites(), vec!["q3"]);
    assert_eq!(store.mastered(), vec!["q4"]);
}

#[tokio::test]
async fn discarded_reset_all_still_clears_remote() {
    let (remote, store) = setup();
    store.mark_wrong("q1").await.unwrap();
    store.record_exam_result(exam(0, 70)).await.unwrap();
    let before = remote.calls();

    drop(store.reset_all());
    wait_for_calls(&remote, before + 2).await;

    assert_eq!(remote.calls(), before + 2);
    assert!(remote.progress_row(store.device_id(), "q1").is_none());
    assert!(remote.history_of(store.device_id()).is_empty());
}

#[tokio::test]
async fn write_handle_reports_finish() {
    let (_, store) = setup();
    let pending = store.mark_wrong("q1");
    pending.await.unwrap();

    let skipped = store.reset_chapter("empty");
    assert!(skipped.is_finished());
    skipped.await.unwrap();
}

#[tokio::test]
async fn corrupt_cached_value_reads_as_empty() {
    let remote = Arc::new(InMemoryRemote::new());
    let cache = LocalCache::open_in_memory("quiz_").unwrap();
    cache.set(keys::WRONG, &"not a list").unwrap();
    let store = ProgressStore::open(cache, remote).unwrap();

    assert!(store.wrong_list().is_empty());
    store.mark_wrong("q1").await.unwrap();
    assert_eq!(store.wrong_list(), vec!["q1"]);
}

#[tokio::test]
async fn device_id_survives_reopen_and_reset() {
    let dir = std::env::temp_dir().join(format!("quiz-store-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("cache.db");
    let remote = Arc::new(InMemoryRemote::new());

    let first = {
        let cache = LocalCache::open(&path, "quiz_").unwrap();
        let store = ProgressStore::open(cache, remote.clone()).unwrap();
        store.reset_all().await.unwrap();
        store.device_id().clone()
    };

    let cache = LocalCache::open(&path, "quiz_").unwrap();
    let store = ProgressStore::open(cache, remote).unwrap();
    assert_eq!(store.device_id(), &first);

    std::fs::remove_dir_all(&dir).ok();
}
