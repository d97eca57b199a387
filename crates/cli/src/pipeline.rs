//! Pipeline context: store, queue, watcher, worker and status API
//!
//! Everything the running service shares is created here and handed to each
//! component explicitly; there is no global state.

use anyhow::{Context, Result};
use dropwatch_core::{Config, TaskQueue};
use dropwatch_processor::start_worker;
use dropwatch_server::{bind, run_rest_server, AppState};
use dropwatch_storage::{create_record_store, RecordStore};
use dropwatch_watcher::DirectoryWatcher;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A running ingestion pipeline
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    queue: TaskQueue,
    watcher: DirectoryWatcher,
    worker: Option<JoinHandle<()>>,
    /// Stops the worker between tasks without draining the queue
    worker_cancel: CancellationToken,
    server: Option<JoinHandle<dropwatch_core::Result<()>>>,
    server_addr: Option<SocketAddr>,
    server_shutdown: CancellationToken,
}

impl Pipeline {
    /// Open the configured store and start every component
    pub async fn start(config: &Config) -> Result<Self> {
        let store = create_record_store(&config.storage)
            .await
            .context("Failed to open record store")?;
        Self::start_with_store(config, store).await
    }

    /// Start every component on top of an existing store
    pub async fn start_with_store(config: &Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        let watcher = DirectoryWatcher::new(config.watcher.clone(), config.stability.clone())
            .context("Failed to create watcher")?;
        let queue = TaskQueue::new();
        let worker_cancel = CancellationToken::new();

        let worker = start_worker(
            &config.worker,
            queue.clone(),
            Arc::clone(&store),
            worker_cancel.clone(),
        )
        .context("Failed to start worker")?;

        let mut pipeline = Self {
            store,
            queue,
            watcher,
            worker: Some(worker),
            worker_cancel,
            server: None,
            server_addr: None,
            server_shutdown: CancellationToken::new(),
        };

        if let Err(e) = pipeline.start_components(config).await {
            error!("Pipeline failed to start: {e:#}");
            if let Err(stop_err) = pipeline.shutdown().await {
                warn!("Cleanup after failed start: {stop_err:#}");
            }
            return Err(e);
        }

        info!("Pipeline started");
        Ok(pipeline)
    }

    async fn start_components(&mut self, config: &Config) -> Result<()> {
        self.watcher
            .start(self.queue.clone())
            .await
            .context("Failed to start watcher")?;

        if !config.server.enabled {
            info!("Status API disabled");
            return Ok(());
        }

        let listener = bind(&config.server).await?;
        self.server_addr = listener.local_addr().ok();

        let state = AppState::new(Arc::clone(&self.store), self.queue.clone(), &config.server);
        let server_config = config.server.clone();
        let shutdown = self.server_shutdown.clone();
        self.server = Some(tokio::spawn(async move {
            run_rest_server(listener, state, &server_config, shutdown).await
        }));
        Ok(())
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Address the status API is bound to, if enabled
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    /// Canonical watched directory
    pub fn watch_path(&self) -> Option<&Path> {
        self.watcher.watch_path()
    }

    /// Token that makes `shutdown` skip draining the queue
    ///
    /// The task being processed still completes.
    pub fn drain_abort_token(&self) -> CancellationToken {
        self.worker_cancel.clone()
    }

    /// Stop in dependency order
    ///
    /// The watcher stops first so nothing new is enqueued, then the queue is
    /// closed and the worker drains it, then the status API goes down.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.watcher
            .stop()
            .await
            .context("Failed to stop watcher")?;

        self.queue.close();
        if let Some(worker) = self.worker.take() {
            let pending = self.queue.size();
            if pending > 0 {
                info!(pending, "Draining queued files");
            }
            if let Err(e) = worker.await {
                error!("Worker task ended abnormally: {e}");
            }
        }

        self.server_shutdown.cancel();
        if let Some(server) = self.server.take() {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Status API failed: {e}"),
                Err(e) => error!("Status API task ended abnormally: {e}"),
            }
        }

        info!("Pipeline stopped");
        Ok(())
    }
}
