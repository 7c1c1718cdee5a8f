//! Error types for the directory watching system.

use thiserror::Error;

/// Errors that can occur while managing directory watches.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The event source rejected an operation.
    #[error("File watching error: {0}")]
    Watch(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Event handler failure.
    #[error("Event handling error: {0}")]
    Handler(String),

    /// A manager was built without a notifier.
    #[error("A notifier is required to build a watch manager")]
    MissingNotifier,

    /// Manager is not running.
    #[error("Watch manager is not running")]
    NotRunning,

    /// Manager is already running.
    #[error("Watch manager is already running")]
    AlreadyRunning,

    /// Manager has been stopped and cannot be used again.
    #[error("Watch manager has been stopped")]
    Stopped,

    /// Invalid path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Channel error.
    #[error("Channel error: {0}")]
    Channel(String),
}

/// Result type for directory watching operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convert notify errors to our error type.
impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watch(err.to_string())
    }
}
