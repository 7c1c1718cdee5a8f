//! Notify-based event source.

use crate::{
    error::{Error, Result},
    events::WatchEvent,
    traits::{EventSource, EventSourceFactory, SourceStreams},
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Event source backed by the platform's recommended notify watcher.
///
/// Each subscription is non-recursive; new subdirectories are picked up by the
/// watch manager as they appear.
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
}

impl NotifySource {
    fn open() -> Result<(Self, SourceStreams)> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    for watch_event in WatchEvent::from_notify(event) {
                        if event_tx.send(watch_event).is_err() {
                            debug!("Event stream closed, dropping notify event");
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = error_tx.send(Error::from(err));
                }
            },
        )
        .map_err(|e| Error::Watch(format!("Failed to create notify watcher: {}", e)))?;

        info!("Notify source initialized");
        Ok((
            Self {
                watcher: Some(watcher),
            },
            SourceStreams { events, errors },
        ))
    }
}

impl EventSource for NotifySource {
    fn backend_type(&self) -> &'static str {
        "notify"
    }

    fn subscribe(&mut self, path: &Path) -> Result<()> {
        let watcher = self
            .watcher
            .as_mut()
            .ok_or_else(|| Error::Watch("notify source is closed".to_string()))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(format!("Failed to watch {}: {}", path.display(), e)))
    }

    fn close(&mut self) {
        if self.watcher.take().is_some() {
            info!("Notify source closed");
        }
    }
}

/// Factory for notify-based sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyFactory;

impl NotifyFactory {
    /// Create a new notify factory.
    pub fn new() -> Self {
        Self
    }
}

impl EventSourceFactory for NotifyFactory {
    fn backend_type(&self) -> &'static str {
        "notify"
    }

    fn open(&self) -> Result<(Box<dyn EventSource>, SourceStreams)> {
        let (source, streams) = NotifySource::open()?;
        Ok((Box::new(source), streams))
    }
}
