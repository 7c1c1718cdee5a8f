//! # dirwatch
//!
//! Recursive directory watching on top of a per-directory event source.
//!
//! A [`WatchManager`] keeps a set of watched directories and extends it as new
//! subdirectories appear, shrinking it again when directories are removed.
//! Every raw event from the source is handed to a user-supplied notifier.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐  add()   ┌──────────────────┐ subscribe ┌─────────────────┐
//! │   Application   │─────────▶│   Control Loop   │──────────▶│   EventSource   │
//! │                 │          │  (owns watch set)│◀──────────│ (notify, memory)│
//! └─────────────────┘          └──────────────────┘  events   └─────────────────┘
//!         ▲                         │        ▲
//!         │ notifier                │ list   │ add requests
//!         │                         ▼        │
//!  ┌─────────────────┐        ┌──────────────────┐
//!  │ Handler tasks   │◀───────│ Discovery tasks  │
//!  └─────────────────┘        └──────────────────┘
//! ```
//!
//! The control loop is the only task that touches the watch set. Callers,
//! discovery and event classification all go through its request channel.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dirwatch::WatchManager;
//!
//! # async fn run() -> dirwatch::Result<()> {
//! let manager = WatchManager::new(|event| {
//!     println!("{} {}", event.kind, event.path.display());
//! });
//! manager.start()?;
//! manager.add(["./notes"])?;
//! // ...
//! manager.stop().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod backends;
pub mod config;
pub mod error;
mod events;
mod manager;
pub mod traits;

pub use backends::*;
pub use config::WatchManagerConfig;
pub use error::*;
pub use events::*;
pub use manager::*;
pub use traits::{EventHandler, EventSource, EventSourceFactory, SourceStreams};

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::{
        Error, EventHandler, EventKind, Result, WatchEvent, WatchManager, WatchManagerConfig,
    };
}
