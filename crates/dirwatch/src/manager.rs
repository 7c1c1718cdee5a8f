//! Watch manager that owns the watch set and coordinates recursive watching.
//!
//! All mutations of the watch set happen on a single control loop task. Every
//! other party (callers of [`WatchManager::add`], directory discovery, event
//! classification) only submits requests to that loop, so the set itself never
//! needs a lock.

use crate::{
    backends::NotifyFactory,
    config::WatchManagerConfig,
    error::{Error, Result},
    events::WatchEvent,
    traits::{EventHandler, EventSource, EventSourceFactory, SourceStreams},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a watch manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerState {
    /// Built but not started.
    Idle,
    /// Control loop is running.
    Running,
    /// Stopped for good.
    Stopped,
}

/// Status information for the watch manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    /// Lifecycle state
    pub state: ManagerState,
    /// Number of watched directories
    pub watched_paths: usize,
    /// Events received from the source since start
    pub events_received: u64,
    /// Handler invocations that returned an error
    pub handler_failures: u64,
}

enum Request {
    Add(PathBuf),
    Snapshot(oneshot::Sender<LoopSnapshot>),
}

struct LoopSnapshot {
    paths: Vec<PathBuf>,
    events_received: u64,
}

/// Builder for [`WatchManager`].
#[derive(Default)]
pub struct WatchManagerBuilder {
    handler: Option<Arc<dyn EventHandler>>,
    config: WatchManagerConfig,
    factory: Option<Box<dyn EventSourceFactory>>,
}

impl WatchManagerBuilder {
    /// Create a builder with default configuration and the notify backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a callback invoked once per raw event.
    pub fn notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(WatchEvent) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(notifier));
        self
    }

    /// Set an event handler invoked once per raw event.
    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set the manager configuration.
    pub fn config(mut self, config: WatchManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a different event source backend.
    pub fn source<F>(mut self, factory: F) -> Self
    where
        F: EventSourceFactory + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Build an idle manager.
    ///
    /// Fails when no notifier was given or the configuration is invalid.
    pub fn build(self) -> Result<WatchManager> {
        let handler = self.handler.ok_or(Error::MissingNotifier)?;
        self.config.validate()?;
        let factory = self
            .factory
            .unwrap_or_else(|| Box::new(NotifyFactory::new()));
        Ok(WatchManager::from_parts(handler, self.config, factory))
    }
}

/// Recursive directory watch manager.
///
/// `start`, `add` and `stop` spawn tasks and must be called from within a
/// Tokio runtime.
pub struct WatchManager {
    config: WatchManagerConfig,
    factory: Box<dyn EventSourceFactory>,
    handler: Arc<dyn EventHandler>,
    request_tx: mpsc::Sender<Request>,
    /// Taken by the control loop on start
    request_rx: Mutex<Option<mpsc::Receiver<Request>>>,
    shutdown: CancellationToken,
    state: Mutex<ManagerState>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    handler_failures: Arc<AtomicU64>,
}

impl WatchManager {
    /// Create an idle manager that calls `notifier` for every event, using the
    /// notify backend and default configuration.
    pub fn new<F>(notifier: F) -> Self
    where
        F: Fn(WatchEvent) + Send + Sync + 'static,
    {
        Self::from_parts(
            Arc::new(notifier),
            WatchManagerConfig::default(),
            Box::new(NotifyFactory::new()),
        )
    }

    /// Start building a manager.
    pub fn builder() -> WatchManagerBuilder {
        WatchManagerBuilder::new()
    }

    fn from_parts(
        handler: Arc<dyn EventHandler>,
        config: WatchManagerConfig,
        factory: Box<dyn EventSourceFactory>,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::channel(config.request_buffer);
        Self {
            config,
            factory,
            handler,
            request_tx,
            request_rx: Mutex::new(Some(request_rx)),
            shutdown: CancellationToken::new(),
            state: Mutex::new(ManagerState::Idle),
            loop_task: Mutex::new(None),
            handler_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open the event source and start the control loop.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            ManagerState::Running => return Err(Error::AlreadyRunning),
            ManagerState::Stopped => return Err(Error::Stopped),
            ManagerState::Idle => {}
        }

        let (source, streams) = self.factory.open()?;
        let requests = self
            .request_rx
            .lock()
            .take()
            .ok_or_else(|| Error::Channel("request receiver already taken".to_string()))?;

        info!(backend = source.backend_type(), "Starting watch manager");

        let control = ControlLoop {
            watched: HashSet::new(),
            source,
            handler: Arc::clone(&self.handler),
            handler_limit: self
                .config
                .max_concurrent_handlers
                .map(|max| Arc::new(Semaphore::new(max))),
            handler_failures: Arc::clone(&self.handler_failures),
            request_tx: self.request_tx.clone(),
            shutdown: self.shutdown.clone(),
            events_received: 0,
        };

        *self.loop_task.lock() = Some(tokio::spawn(control.run(streams, requests)));
        *state = ManagerState::Running;
        Ok(())
    }

    /// Submit directories for recursive watching.
    ///
    /// Paths are made absolute and handed to the control loop in the
    /// background; the call returns before any of them is watched. A path that
    /// cannot be made absolute is logged and skipped. Paths added before
    /// `start` are picked up once the loop runs.
    pub fn add<I, P>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        if *self.state.lock() == ManagerState::Stopped {
            return Err(Error::Stopped);
        }

        let resolved: Vec<PathBuf> = paths
            .into_iter()
            .filter_map(|path| {
                match resolve_path(path.as_ref()) {
                    Ok(resolved) => Some(resolved),
                    Err(e) => {
                        warn!("Skipping watch request: {}", e);
                        None
                    }
                }
            })
            .collect();

        if !resolved.is_empty() {
            tokio::spawn(submit_paths(
                self.request_tx.clone(),
                self.shutdown.clone(),
                resolved,
            ));
        }
        Ok(())
    }

    /// Stop the control loop and close the event source.
    ///
    /// Pending submissions are abandoned. Stopping twice is a no-op.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == ManagerState::Stopped {
                return Ok(());
            }
            *state = ManagerState::Stopped;
        }

        info!("Stopping watch manager");
        self.shutdown.cancel();

        let task = self.loop_task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|e| Error::Channel(format!("control loop task failed: {}", e)))?;
        }

        info!("Watch manager stopped");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ManagerState {
        *self.state.lock()
    }

    /// Sorted snapshot of the watched directories.
    pub async fn watched_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.snapshot().await?.paths)
    }

    /// Get manager status.
    pub async fn status(&self) -> Result<ManagerStatus> {
        let snapshot = self.snapshot().await?;
        Ok(ManagerStatus {
            state: self.state(),
            watched_paths: snapshot.paths.len(),
            events_received: snapshot.events_received,
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        })
    }

    async fn snapshot(&self) -> Result<LoopSnapshot> {
        if self.state() != ManagerState::Running {
            return Err(Error::NotRunning);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::select! {
            _ = self.shutdown.cancelled() => return Err(Error::NotRunning),
            sent = self.request_tx.send(Request::Snapshot(reply_tx)) => {
                sent.map_err(|_| Error::NotRunning)?;
            }
        }
        reply_rx.await.map_err(|_| Error::NotRunning)
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Make `path` absolute and lexically clean: `.` is dropped and `..` removes
/// the preceding component. Symlinks are not resolved.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|e| Error::InvalidPath(format!("{}: {}", path.display(), e)))?;

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            // At the root this is a no-op, so `/..` stays `/`
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    Ok(cleaned)
}

/// Hand paths to the control loop one at a time, giving up at shutdown.
async fn submit_paths(
    request_tx: mpsc::Sender<Request>,
    shutdown: CancellationToken,
    paths: Vec<PathBuf>,
) {
    for path in paths {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Watch manager stopped, abandoning pending submissions");
                return;
            }
            sent = request_tx.send(Request::Add(path)) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

/// Immediate subdirectories of `dir`. Symlinks are not followed.
async fn list_subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut subdirs = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => subdirs.push(entry.path()),
            Ok(_) => {}
            Err(e) => debug!("Cannot read type of {}: {}", entry.path().display(), e),
        }
    }

    Ok(subdirs)
}

/// Sole owner of the watch set and the event source.
struct ControlLoop {
    watched: HashSet<PathBuf>,
    source: Box<dyn EventSource>,
    handler: Arc<dyn EventHandler>,
    handler_limit: Option<Arc<Semaphore>>,
    handler_failures: Arc<AtomicU64>,
    request_tx: mpsc::Sender<Request>,
    shutdown: CancellationToken,
    events_received: u64,
}

impl ControlLoop {
    async fn run(mut self, mut streams: SourceStreams, mut requests: mpsc::Receiver<Request>) {
        debug!("Control loop started");
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = streams.events.recv() => self.on_event(event).await,
                Some(err) = streams.errors.recv() => warn!("Error during watch: {}", err),
                Some(request) = requests.recv() => match request {
                    Request::Add(path) => self.on_add(path).await,
                    Request::Snapshot(reply) => {
                        let mut paths: Vec<PathBuf> = self.watched.iter().cloned().collect();
                        paths.sort();
                        let _ = reply.send(LoopSnapshot {
                            paths,
                            events_received: self.events_received,
                        });
                    }
                },
            }
        }

        self.source.close();
        info!(watched = self.watched.len(), "Control loop shut down");
    }

    async fn on_add(&mut self, path: PathBuf) {
        if path.as_os_str().is_empty() || self.watched.contains(&path) {
            return;
        }

        if let Err(e) = tokio::fs::metadata(&path).await {
            warn!("{} does not exist or is not accessible: {}", path.display(), e);
            return;
        }

        match self.source.subscribe(&path) {
            Ok(()) => info!("Added watch on {}", path.display()),
            Err(e) => warn!("Failed to add watch on {}: {}", path.display(), e),
        }

        self.watched.insert(path.clone());
        self.discover(path);
    }

    async fn on_event(&mut self, event: WatchEvent) {
        self.events_received += 1;
        debug!(path = %event.path.display(), kind = %event.kind, "Received event");

        let path = event.path.clone();
        let removal = event.is_removal();
        self.dispatch(event);

        if removal {
            // The source drops its own subscription once the directory is gone.
            if self.watched.remove(&path) {
                info!("Removed watch on {}", path.display());
            }
            return;
        }

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() && !self.watched.contains(&path) => {
                tokio::spawn(submit_paths(
                    self.request_tx.clone(),
                    self.shutdown.clone(),
                    vec![path],
                ));
            }
            Ok(_) => {}
            Err(e) => debug!("Cannot stat {}: {}", path.display(), e),
        }
    }

    /// Run the handler on its own task; the loop never waits for it.
    fn dispatch(&self, event: WatchEvent) {
        let handler = Arc::clone(&self.handler);
        let limit = self.handler_limit.clone();
        let failures = Arc::clone(&self.handler_failures);

        tokio::spawn(async move {
            let _permit = match limit {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            if let Err(e) = handler.handle(event).await {
                failures.fetch_add(1, Ordering::Relaxed);
                error!("Handler '{}' failed: {}", handler.name(), e);
            }
        });
    }

    /// List `dir` in the background and submit its subdirectories.
    fn discover(&self, dir: PathBuf) {
        let request_tx = self.request_tx.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            match list_subdirectories(&dir).await {
                Ok(subdirs) => submit_paths(request_tx, shutdown, subdirs).await,
                Err(e) => warn!("Failed to recursively watch {}: {}", dir.display(), e),
            }
        });
    }
}
