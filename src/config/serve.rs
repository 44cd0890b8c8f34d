//! `[serve]` section configuration.
//!
//! Contains development server, watcher and live-reload settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[serve]` section in blogsmith.toml - development server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "0.0.0.0"  # Listen on all interfaces
/// port = 3000
/// watch = true           # Auto-rebuild on file changes
/// debounce_ms = 500      # Quiet period before a rebuild starts
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 5277).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Enable file watcher for live reload on changes.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,

    /// Quiet period after the last change before a rebuild starts.
    #[serde(default = "defaults::serve::debounce_ms")]
    #[educe(Default = defaults::serve::debounce_ms())]
    pub debounce_ms: u64,

    /// How often the build loop checks for pending changes.
    #[serde(default = "defaults::serve::poll_ms")]
    #[educe(Default = defaults::serve::poll_ms())]
    pub poll_ms: u64,

    /// Interval between keepalive comments on live-reload streams.
    #[serde(default = "defaults::serve::keepalive_secs")]
    #[educe(Default = defaults::serve::keepalive_secs())]
    pub keepalive_secs: u64,
}

impl ServeConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub const fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}
