//! Directory watcher feeding the task queue
//!
//! Raw notify events are classified and filtered by name on a single event
//! processor task. Each surviving candidate gets its own stability check task;
//! checks for the same path are chained so they finish in event order, while
//! unrelated paths are checked concurrently. Verdicts are sent to one
//! dispatcher task, the only place that touches the queue.

use crate::events::{candidates, Candidate};
use crate::matcher::FileMatcher;
use crate::stability::{Stability, StabilityDetector};
use dashmap::DashMap;
use dropwatch_core::error::{Error, Result};
use dropwatch_core::{FileTask, StabilityConfig, TaskQueue, WatcherConfig};
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Tail of the check chain for one path
struct ChainLink {
    generation: u64,
    done: oneshot::Receiver<()>,
}

/// Result of one stability check, on its way to the dispatcher
#[derive(Debug)]
struct Verdict {
    candidate: Candidate,
    stability: Stability,
}

/// State shared by the event processor and the check tasks it spawns
struct CheckContext {
    matcher: FileMatcher,
    detector: StabilityDetector,
    permits: Arc<Semaphore>,
    chains: DashMap<PathBuf, ChainLink>,
    generation: AtomicU64,
    verdicts: mpsc::UnboundedSender<Verdict>,
    cancel: CancellationToken,
}

/// Watches one directory (non-recursively) and enqueues stable matching files
pub struct DirectoryWatcher {
    config: WatcherConfig,
    stability: StabilityConfig,
    matcher: FileMatcher,
    /// Active notify watcher; dropping it ends the event stream
    watcher: Option<RecommendedWatcher>,
    /// Canonical directory being watched
    watch_path: Option<PathBuf>,
    /// Check state shared with the event processor while running
    context: Option<Arc<CheckContext>>,
    tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl DirectoryWatcher {
    /// Create a watcher; fails on an invalid file pattern
    pub fn new(config: WatcherConfig, stability: StabilityConfig) -> Result<Self> {
        let matcher = FileMatcher::new(&config.file_pattern)?;

        Ok(Self {
            config,
            stability,
            matcher,
            watcher: None,
            watch_path: None,
            context: None,
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Start watching and feeding `queue`
    ///
    /// The watched directory is created if missing.
    pub async fn start(&mut self, queue: TaskQueue) -> Result<()> {
        if self.watcher.is_some() {
            return Err(Error::watcher("Watcher is already running"));
        }

        let path = prepare_watch_dir(&self.config.watch_path).await?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (verdict_tx, verdict_rx) = mpsc::unbounded_channel();

        let context = Arc::new(CheckContext {
            matcher: self.matcher.clone(),
            detector: StabilityDetector::new(&self.stability),
            permits: Arc::new(Semaphore::new(self.stability.max_concurrent_checks.max(1))),
            chains: DashMap::new(),
            generation: AtomicU64::new(0),
            verdicts: verdict_tx,
            cancel: self.cancellation_token.child_token(),
        });

        self.tasks.push(start_dispatcher(verdict_rx, queue));
        self.tasks
            .push(start_event_processor(event_rx, Arc::clone(&context)));

        let mut watcher = self.init_watcher_with_retry(event_tx).await?;
        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watcher(format!("Failed to watch path {}: {e}", path.display())))?;

        info!(
            path = %path.display(),
            pattern = self.matcher.pattern(),
            "Watching directory"
        );

        self.watcher = Some(watcher);
        self.watch_path = Some(path);
        self.context = Some(context);
        Ok(())
    }

    /// Initialize notify watcher with retry logic
    async fn init_watcher_with_retry(
        &self,
        tx: mpsc::UnboundedSender<NotifyEvent>,
    ) -> Result<RecommendedWatcher> {
        let max_attempts = self.config.init_retries.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            match create_notify_watcher(tx.clone()) {
                Ok(watcher) => {
                    debug!("Notify watcher initialized");
                    return Ok(watcher);
                }
                Err(e) if attempts < max_attempts => {
                    warn!(
                        "Failed to initialize watcher (attempt {}/{}): {}",
                        attempts, max_attempts, e
                    );
                    tokio::time::sleep(self.config.init_retry_delay()).await;
                }
                Err(e) => {
                    error!("Failed to initialize watcher after {} attempts", attempts);
                    return Err(Error::watcher(format!(
                        "Watcher initialization failed: {e}"
                    )));
                }
            }
        }
    }

    /// Stop watching
    ///
    /// In-flight stability checks are cancelled and their files are not
    /// enqueued. Returns once the dispatcher has finished, so no task reaches
    /// the queue afterwards.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation_token.cancel();
        self.watcher.take();
        self.context.take();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Watcher task ended abnormally: {e}");
            }
        }

        if let Some(path) = self.watch_path.take() {
            info!(path = %path.display(), "File watcher stopped");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Canonical path of the watched directory while running
    pub fn watch_path(&self) -> Option<&Path> {
        self.watch_path.as_deref()
    }

    /// Number of paths with a stability check queued or running
    pub fn pending_checks(&self) -> usize {
        self.context
            .as_ref()
            .map_or(0, |context| context.chains.len())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

async fn prepare_watch_dir(path: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        Error::watcher(format!(
            "Failed to create watch directory {}: {e}",
            path.display()
        ))
    })?;
    tokio::fs::canonicalize(path).await.map_err(|e| {
        Error::watcher(format!(
            "Failed to resolve watch directory {}: {e}",
            path.display()
        ))
    })
}

fn create_notify_watcher(tx: mpsc::UnboundedSender<NotifyEvent>) -> Result<RecommendedWatcher> {
    RecommendedWatcher::new(
        move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
            Ok(event) => {
                if tx.send(event).is_err() {
                    trace!("Event processor gone, dropping notify event");
                }
            }
            Err(e) => {
                error!("Notify error: {}", e);
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))
}

fn start_event_processor(
    mut events: mpsc::UnboundedReceiver<NotifyEvent>,
    context: Arc<CheckContext>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = context.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            trace!("Received notify event: {:?}", event);

            for candidate in candidates(&event) {
                if !context.matcher.matches(&candidate.path) {
                    debug!(path = %candidate.path.display(), "Ignoring non-matching file");
                    continue;
                }

                info!(
                    path = %candidate.path.display(),
                    event = %candidate.kind,
                    "Found candidate file"
                );
                spawn_check(&context, candidate);
            }
        }
        debug!("Event processor stopped");
    })
}

/// Spawn a stability check that runs after any earlier check for the same path
fn spawn_check(context: &Arc<CheckContext>, candidate: Candidate) {
    let generation = context.generation.fetch_add(1, Ordering::Relaxed);
    let (done_tx, done_rx) = oneshot::channel();
    let previous = context.chains.insert(
        candidate.path.clone(),
        ChainLink {
            generation,
            done: done_rx,
        },
    );

    let context = Arc::clone(context);
    let cancel = context.cancel.child_token();

    tokio::spawn(async move {
        let run = async {
            if let Some(previous) = previous {
                // A dropped sender also means the predecessor is finished
                let _ = previous.done.await;
            }
            let _permit = Arc::clone(&context.permits).acquire_owned().await.ok()?;
            Some(context.detector.check(&candidate.path).await)
        };

        let stability = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            stability = run => stability,
        };

        let path = candidate.path.clone();
        match stability {
            Some(stability) => {
                if context
                    .verdicts
                    .send(Verdict {
                        candidate,
                        stability,
                    })
                    .is_err()
                {
                    debug!(path = %path.display(), "Dispatcher gone, dropping verdict");
                }
            }
            None => debug!(path = %path.display(), "Stability check cancelled"),
        }

        let _ = done_tx.send(());
        context
            .chains
            .remove_if(&path, |_, link| link.generation == generation);
    });
}

/// Single consumer of verdicts; the only writer to the queue
fn start_dispatcher(
    mut verdicts: mpsc::UnboundedReceiver<Verdict>,
    queue: TaskQueue,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(Verdict {
            candidate,
            stability,
        }) = verdicts.recv().await
        {
            let path = candidate.path;
            match stability {
                Stability::Stable { size } => {
                    match queue.put(FileTask::new(path.clone())) {
                        Ok(()) => info!(
                            path = %path.display(),
                            size,
                            queued = queue.size(),
                            "File added to queue"
                        ),
                        Err(e) => error!(path = %path.display(), "Failed to enqueue file: {e}"),
                    }
                }
                Stability::Unstable { checks } => {
                    error!(path = %path.display(), checks, "File is not stable, dropping")
                }
                Stability::Vanished => {
                    warn!(path = %path.display(), "File disappeared before it became stable")
                }
                Stability::Failed(reason) => error!(
                    path = %path.display(),
                    "Stability check failed, dropping: {reason}"
                ),
            }
        }
        debug!("Dispatcher stopped");
    })
}
