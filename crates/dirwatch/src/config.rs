//! Configuration for the watch manager.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Watch manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchManagerConfig {
    /// Capacity of the request channel feeding the control loop.
    ///
    /// The default of 1 keeps submitters parked until the loop is ready to
    /// take their request.
    pub request_buffer: usize,

    /// Upper bound on concurrently running handler invocations.
    ///
    /// `None` lets every event run its handler immediately.
    pub max_concurrent_handlers: Option<usize>,
}

impl WatchManagerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            request_buffer: 1,
            max_concurrent_handlers: None,
        }
    }

    /// Set the request channel capacity.
    pub fn with_request_buffer(mut self, size: usize) -> Self {
        self.request_buffer = size;
        self
    }

    /// Bound the number of concurrently running handler invocations.
    pub fn with_max_concurrent_handlers(mut self, max: usize) -> Self {
        self.max_concurrent_handlers = Some(max);
        self
    }

    /// Check the configuration for values the manager cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.request_buffer == 0 {
            return Err(Error::Config(
                "request_buffer must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_handlers == Some(0) {
            return Err(Error::Config(
                "max_concurrent_handlers must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WatchManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WatchManagerConfig::default();
        assert_eq!(config.request_buffer, 1);
        assert_eq!(config.max_concurrent_handlers, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = WatchManagerConfig::new().with_request_buffer(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = WatchManagerConfig::new().with_max_concurrent_handlers(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: WatchManagerConfig =
            serde_json::from_str(r#"{"max_concurrent_handlers": 8}"#).unwrap();
        assert_eq!(config.request_buffer, 1);
        assert_eq!(config.max_concurrent_handlers, Some(8));
    }
}
