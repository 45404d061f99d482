//! Queue configuration.
//!
//! [`QueueConfig`] can be built in code through
//! [`BufferQueueBuilder`](super::BufferQueueBuilder) or loaded from JSON.
//! Every field is optional in JSON:
//!
//! ```json
//! {
//!   "name": "camera-preview",
//!   "default_width": 1280,
//!   "default_height": 720,
//!   "default_buffer_count": 3,
//!   "synchronous": true,
//!   "dequeue_timeout_ms": 500,
//!   "capabilities": { "extended": true }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handle::format;
use crate::protocol::Capabilities;

/// Default number of buffers when the producer has not set a count.
pub const DEFAULT_BUFFER_COUNT: usize = 2;

/// Default number of buffers the consumer may hold at once.
pub const DEFAULT_MAX_ACQUIRED: usize = 1;

/// Consumer-side queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Identifier answered by `get_id`.
    pub name: String,
    pub default_width: u32,
    pub default_height: u32,
    pub default_format: u32,
    /// Pool size used while no override is set.
    pub default_buffer_count: usize,
    pub max_acquired: usize,
    /// Initial synchronous mode.
    pub synchronous: bool,
    /// Upper bound on a blocking dequeue. `None` waits indefinitely.
    pub dequeue_timeout_ms: Option<u64>,
    pub transform_hint: u32,
    /// Usage bits the consumer always needs on allocated buffers.
    pub consumer_usage: u32,
    pub capabilities: Capabilities,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-queue".to_string(),
            default_width: 1,
            default_height: 1,
            default_format: format::RGBA_8888,
            default_buffer_count: DEFAULT_BUFFER_COUNT,
            max_acquired: DEFAULT_MAX_ACQUIRED,
            synchronous: false,
            dequeue_timeout_ms: None,
            transform_hint: 0,
            consumer_usage: 0,
            capabilities: Capabilities::BASE,
        }
    }
}

impl QueueConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn dequeue_timeout(&self) -> Option<Duration> {
        self.dequeue_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurfaceError;

    #[test]
    fn test_empty_json_is_default() {
        let config = QueueConfig::from_json_str("{}").unwrap();
        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = QueueConfig::from_json_str(
            r#"{"name": "preview", "default_width": 1280, "dequeue_timeout_ms": 250,
                "capabilities": {"extended": true}}"#,
        )
        .unwrap();

        assert_eq!(config.name, "preview");
        assert_eq!(config.default_width, 1280);
        assert_eq!(config.default_height, 1);
        assert_eq!(config.dequeue_timeout(), Some(Duration::from_millis(250)));
        assert!(config.capabilities.extended);
    }

    #[test]
    fn test_invalid_json() {
        let err = QueueConfig::from_json_str("{\"default_width\": \"wide\"}").unwrap_err();
        assert!(matches!(err, SurfaceError::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = QueueConfig::from_path("/nonexistent/surfacewire/queue.json").unwrap_err();
        assert!(matches!(err, SurfaceError::Io(_)));
    }
}
