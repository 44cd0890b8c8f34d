//! `[build]` section configuration.
//!
//! Contains source/output paths, the metadata cache location, pagination
//! and ignore patterns.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in blogsmith.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"      # Source directory
/// output = "public"        # Output directory
/// posts_per_page = 10
/// ignore = [".*", "_*", "drafts"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Content source directory.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Metadata cache sidecar (JSON).
    #[serde(default = "defaults::build::cache")]
    #[educe(Default = defaults::build::cache())]
    pub cache: PathBuf,

    /// Number of posts on each index page.
    #[serde(default = "defaults::build::posts_per_page")]
    #[educe(Default = defaults::build::posts_per_page())]
    pub posts_per_page: usize,

    /// Number of most recent posts in each Atom feed.
    #[serde(default = "defaults::build::feed_entries")]
    #[educe(Default = defaults::build::feed_entries())]
    pub feed_entries: usize,

    /// Glob patterns matched against every path segment below `content`.
    #[serde(default = "defaults::build::ignore")]
    #[educe(Default = defaults::build::ignore())]
    pub ignore: Vec<String>,
}
