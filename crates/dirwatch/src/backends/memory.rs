//! In-memory event source driven by hand.
//!
//! Useful for exercising code built on the watch manager without touching
//! the platform's notification APIs: events and errors are injected through a
//! [`MemoryController`], and subscriptions are recorded for inspection.

use crate::{
    error::{Error, Result},
    events::WatchEvent,
    traits::{EventSource, EventSourceFactory, SourceStreams},
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct MemoryState {
    event_tx: Option<mpsc::UnboundedSender<WatchEvent>>,
    error_tx: Option<mpsc::UnboundedSender<Error>>,
    subscriptions: Vec<PathBuf>,
    rejected: HashSet<PathBuf>,
    closed: bool,
}

/// Factory for [`MemorySource`].
#[derive(Clone, Default)]
pub struct MemoryFactory {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFactory {
    /// Create a new factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a controller for the sources opened by this factory.
    pub fn controller(&self) -> MemoryController {
        MemoryController {
            state: Arc::clone(&self.state),
        }
    }
}

impl EventSourceFactory for MemoryFactory {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn open(&self) -> Result<(Box<dyn EventSource>, SourceStreams)> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        {
            let mut state = self.state.lock();
            state.event_tx = Some(event_tx);
            state.error_tx = Some(error_tx);
            state.closed = false;
        }

        let source = MemorySource {
            state: Arc::clone(&self.state),
        };
        Ok((Box::new(source), SourceStreams { events, errors }))
    }
}

/// Event source that only reports what its controller injects.
pub struct MemorySource {
    state: Arc<Mutex<MemoryState>>,
}

impl EventSource for MemorySource {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn subscribe(&mut self, path: &Path) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Watch("memory source is closed".to_string()));
        }
        if state.rejected.contains(path) {
            return Err(Error::Watch(format!(
                "subscription rejected for {}",
                path.display()
            )));
        }
        state.subscriptions.push(path.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.event_tx = None;
        state.error_tx = None;
    }
}

/// Handle for driving a [`MemorySource`].
#[derive(Clone)]
pub struct MemoryController {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryController {
    /// Deliver an event as if the platform had reported it.
    pub fn emit(&self, event: WatchEvent) -> Result<()> {
        let state = self.state.lock();
        let tx = state.event_tx.as_ref().ok_or(Error::NotRunning)?;
        tx.send(event)
            .map_err(|e| Error::Channel(format!("event stream closed: {}", e)))
    }

    /// Deliver an asynchronous error.
    pub fn emit_error(&self, error: Error) -> Result<()> {
        let state = self.state.lock();
        let tx = state.error_tx.as_ref().ok_or(Error::NotRunning)?;
        tx.send(error)
            .map_err(|e| Error::Channel(format!("error stream closed: {}", e)))
    }

    /// Make future subscriptions to `path` fail.
    pub fn reject(&self, path: impl Into<PathBuf>) {
        self.state.lock().rejected.insert(path.into());
    }

    /// Every successful subscription, in order, including repeats.
    pub fn subscriptions(&self) -> Vec<PathBuf> {
        self.state.lock().subscriptions.clone()
    }

    /// Whether the source has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
