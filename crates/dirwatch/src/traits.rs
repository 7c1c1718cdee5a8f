//! Core traits for the directory watching system.

use crate::{
    error::{Error, Result},
    events::WatchEvent,
};
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

/// A low-level filesystem event source.
///
/// A source subscribes to individual directories and reports changes to their
/// immediate entries. It does not recurse on its own; the watch manager takes
/// care of extending subscriptions to subdirectories.
pub trait EventSource: Send {
    /// Get the backend type identifier.
    fn backend_type(&self) -> &'static str;

    /// Start receiving events for the entries of `path`.
    fn subscribe(&mut self, path: &Path) -> Result<()>;

    /// Tear down every subscription. Streams end once the source is closed.
    fn close(&mut self);
}

/// Receiving ends of an event source.
#[derive(Debug)]
pub struct SourceStreams {
    /// Filesystem events.
    pub events: mpsc::UnboundedReceiver<WatchEvent>,

    /// Asynchronous errors raised while watching.
    pub errors: mpsc::UnboundedReceiver<Error>,
}

/// Factory for event sources.
pub trait EventSourceFactory: Send + Sync {
    /// Get the backend type identifier.
    fn backend_type(&self) -> &'static str;

    /// Open a new source along with the streams it reports on.
    fn open(&self) -> Result<(Box<dyn EventSource>, SourceStreams)>;
}

/// Trait for handling watch events.
///
/// Any `Fn(WatchEvent)` closure is a handler, so a plain callback can be
/// passed wherever a handler is expected.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a single watch event.
    async fn handle(&self, event: WatchEvent) -> Result<()>;

    /// Get the handler name.
    fn name(&self) -> &'static str {
        "notifier"
    }
}

#[async_trait]
impl<F> EventHandler for F
where
    F: Fn(WatchEvent) + Send + Sync,
{
    async fn handle(&self, event: WatchEvent) -> Result<()> {
        (self)(event);
        Ok(())
    }
}
