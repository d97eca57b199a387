//! Retry worker behaviour against the in-memory record store

use dropwatch_core::{FileStatus, FileTask, TaskQueue, WorkerConfig};
use dropwatch_processor::{
    DeadLetterLog, EncodingChain, FileProcessor, RetryPolicy, RetryWorker, TaskOutcome,
};
use dropwatch_storage::{MockRecordStore, RecordStore};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn default_policy() -> RetryPolicy {
    RetryPolicy::new(
        3,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(3),
            Duration::from_secs(5),
        ],
    )
}

fn worker(queue: &TaskQueue, store: &MockRecordStore) -> RetryWorker {
    let processor = FileProcessor::new(&WorkerConfig::default()).unwrap();
    RetryWorker::new(
        queue.clone(),
        Arc::new(store.clone()) as Arc<dyn RecordStore>,
        processor,
        default_policy(),
    )
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_persists_once() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "test_1.txt", "a\nb");
    let store = MockRecordStore::failing_next(2);
    let worker = worker(&TaskQueue::new(), &store);

    let start = Instant::now();
    let outcome = worker.handle_task(&FileTask::new(&path)).await;
    let elapsed = start.elapsed();

    assert_eq!(
        outcome,
        TaskOutcome::Persisted {
            attempts: 3,
            status: FileStatus::Ok
        }
    );
    assert_eq!(store.save_attempts(), 3);
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].lines, Some(2));

    // Slept 1s then 3s; the 5s delay is never used
    assert!(elapsed >= Duration::from_secs(4), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success_does_not_sleep() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "test_2.txt", "");
    let store = MockRecordStore::new();
    let worker = worker(&TaskQueue::new(), &store);

    let start = Instant::now();
    let outcome = worker.handle_task(&FileTask::new(&path)).await;

    assert_eq!(outcome.attempts(), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(store.records()[0].lines, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_store_abandons_task() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "test_3.txt", "content\n");
    let dead_letter_path = dir.path().join("dead.jsonl");

    let queue = TaskQueue::new();
    let store = MockRecordStore::always_failing();
    let worker = worker(&queue, &store).with_dead_letter_log(DeadLetterLog::new(&dead_letter_path));

    queue.put(FileTask::new(&path)).unwrap();
    queue.close();
    worker.run(CancellationToken::new()).await;

    assert!(store.is_empty());
    assert_eq!(store.save_attempts(), 3);
    assert_eq!(queue.size(), 0);
    assert_eq!(queue.unfinished(), 0);

    let letters = DeadLetterLog::new(&dead_letter_path).read_all().await.unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].path, path.to_string_lossy());
    assert_eq!(letters[0].attempts, 3);
    assert!(letters[0].last_error.contains("simulated"));
}

#[tokio::test]
async fn test_failed_records_are_persisted_not_retried() {
    let dir = TempDir::new().unwrap();
    let bad = write_file(&dir, "test_4.txt", "");
    std::fs::write(&bad, [0xFF, 0xFE, 0xFD]).unwrap();

    let queue = TaskQueue::new();
    let store = MockRecordStore::new();
    let processor =
        FileProcessor::with_encodings(EncodingChain::from_labels(&["utf-8"]).unwrap());
    let worker = RetryWorker::new(
        queue.clone(),
        Arc::new(store.clone()),
        processor,
        default_policy(),
    );

    let outcome = worker.handle_task(&FileTask::new(&bad)).await;

    assert_eq!(
        outcome,
        TaskOutcome::Persisted {
            attempts: 1,
            status: FileStatus::Failed
        }
    );
    assert_eq!(store.save_attempts(), 1);
    assert!(store.records()[0].error.is_some());
}

#[tokio::test]
async fn test_run_drains_queue_in_order() {
    let dir = TempDir::new().unwrap();
    let first = write_file(&dir, "test_5.txt", "one\n");
    let second = dir.path().join("test_6.txt"); // never created

    let queue = TaskQueue::new();
    let store = MockRecordStore::new();
    let worker = worker(&queue, &store);

    queue.put(FileTask::new(&first)).unwrap();
    queue.put(FileTask::new(&second)).unwrap();
    queue.close();
    worker.run(CancellationToken::new()).await;

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].path, first.to_string_lossy());
    assert_eq!(records[0].status, FileStatus::Ok);
    assert_eq!(records[1].path, second.to_string_lossy());
    assert_eq!(records[1].status, FileStatus::Failed);
    assert_eq!(queue.unfinished(), 0);
}

#[tokio::test]
async fn test_cancelled_worker_leaves_queue_untouched() {
    let queue = TaskQueue::new();
    let store = MockRecordStore::new();
    let worker = worker(&queue, &store);

    queue.put(FileTask::new("/in/test_7.txt")).unwrap();
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    worker.run(shutdown).await;

    assert_eq!(store.save_attempts(), 0);
    assert_eq!(queue.size(), 1);
}

#[tokio::test]
async fn test_worker_from_config_rejects_unknown_encoding() {
    let config = WorkerConfig {
        encodings: vec!["utf-8".to_string(), "not-an-encoding".to_string()],
        ..Default::default()
    };
    let store: Arc<dyn RecordStore> = Arc::new(MockRecordStore::new());
    assert!(RetryWorker::from_config(&config, TaskQueue::new(), store).is_err());
}
