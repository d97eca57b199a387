//! Integration tests for the directory watcher
//!
//! These tests use temporary directories and real filesystem operations
//! with short stability intervals.

use dropwatch_core::{FileTask, StabilityConfig, TaskQueue, WatcherConfig};
use dropwatch_watcher::DirectoryWatcher;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn stability() -> StabilityConfig {
    StabilityConfig {
        check_interval_ms: 50,
        max_checks: 5,
        max_concurrent_checks: 8,
    }
}

async fn start_watcher(dir: &Path) -> (DirectoryWatcher, TaskQueue, PathBuf) {
    let config = WatcherConfig {
        watch_path: dir.to_path_buf(),
        ..Default::default()
    };
    let queue = TaskQueue::new();
    let mut watcher = DirectoryWatcher::new(config, stability()).unwrap();
    watcher.start(queue.clone()).await.unwrap();
    let root = watcher.watch_path().unwrap().to_path_buf();

    // Wait a bit for the watcher to settle
    tokio::time::sleep(Duration::from_millis(100)).await;
    (watcher, queue, root)
}

async fn next_task(queue: &TaskQueue) -> FileTask {
    timeout(WAIT, queue.get())
        .await
        .expect("timed out waiting for a queued task")
        .expect("queue closed")
}

#[tokio::test]
async fn test_created_file_is_enqueued() {
    let temp_dir = TempDir::new().unwrap();
    let (mut watcher, queue, root) = start_watcher(temp_dir.path()).await;

    std::fs::write(root.join("test_1.txt"), "one\ntwo\n").unwrap();

    let task = next_task(&queue).await;
    assert_eq!(task.path(), root.join("test_1.txt"));

    // The write's modify events must not produce a second task
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(queue.size(), 0);

    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn test_non_matching_files_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let (mut watcher, queue, root) = start_watcher(temp_dir.path()).await;

    std::fs::write(root.join("notes.txt"), "ignored").unwrap();
    std::fs::write(root.join("test_x.txt"), "ignored").unwrap();
    std::fs::create_dir(root.join("test_9.txt")).unwrap();
    std::fs::write(root.join("test_2.txt"), "kept").unwrap();

    let task = next_task(&queue).await;
    assert_eq!(task.path(), root.join("test_2.txt"));

    // Give any stray check time to finish
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(queue.size(), 0);

    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn test_moved_in_file_is_enqueued() {
    let temp_dir = TempDir::new().unwrap();
    let staging = TempDir::new_in(temp_dir.path()).unwrap();
    let watched = temp_dir.path().join("watched");
    let (mut watcher, queue, root) = start_watcher(&watched).await;

    let staged = staging.path().join("test_3.txt");
    std::fs::write(&staged, "moved\n").unwrap();
    std::fs::rename(&staged, root.join("test_3.txt")).unwrap();

    let task = next_task(&queue).await;
    assert_eq!(task.path(), root.join("test_3.txt"));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(queue.size(), 0, "one move should yield one task");

    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_arrivals_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let (mut watcher, queue, root) = start_watcher(temp_dir.path()).await;

    std::fs::write(root.join("test_10.txt"), "a").unwrap();
    std::fs::write(root.join("test_11.txt"), "b").unwrap();

    let mut seen = HashSet::new();
    seen.insert(next_task(&queue).await.path().to_path_buf());
    seen.insert(next_task(&queue).await.path().to_path_buf());

    let expected: HashSet<_> = [root.join("test_10.txt"), root.join("test_11.txt")]
        .into_iter()
        .collect();
    assert_eq!(seen, expected);

    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn test_growing_file_never_enqueued() {
    let temp_dir = TempDir::new().unwrap();
    let (mut watcher, queue, root) = start_watcher(temp_dir.path()).await;

    // Outlasts the 5 x 50ms budget, growing well inside every interval
    let path = root.join("test_4.txt");
    let writer = tokio::spawn(async move {
        let mut file = std::fs::File::create(&path).unwrap();
        for _ in 0..100 {
            file.write_all(b"more data\n").unwrap();
            file.flush().unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });
    writer.await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(queue.size(), 0);

    watcher.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_cancels_pending_checks() {
    let temp_dir = TempDir::new().unwrap();
    let config = WatcherConfig {
        watch_path: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let slow = StabilityConfig {
        check_interval_ms: 10_000,
        max_checks: 5,
        max_concurrent_checks: 8,
    };
    let queue = TaskQueue::new();
    let mut watcher = DirectoryWatcher::new(config, slow).unwrap();
    watcher.start(queue.clone()).await.unwrap();
    let root = watcher.watch_path().unwrap().to_path_buf();
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::write(root.join("test_5.txt"), "pending").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    timeout(WAIT, watcher.stop())
        .await
        .expect("stop should not wait for the stability interval")
        .unwrap();
    assert_eq!(queue.size(), 0);
}
