//! Site configuration management for `blogsmith.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                         |
//! |-------------|-------------------------------------------------|
//! | `[base]`    | Site metadata (title, author, url)              |
//! | `[build]`   | Paths, cache, pagination, ignore patterns       |
//! | `[serve]`   | Development server, watcher and live reload     |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Blog"
//! description = "A personal blog"
//! url = "https://example.com"
//!
//! [build]
//! content = "content"
//! output = "public"
//! posts_per_page = 10
//!
//! [serve]
//! port = 5277
//! ```

mod base;
mod build;
pub mod defaults;
mod error;
mod serve;

pub use base::BaseConfig;
pub use build::BuildConfig;
pub use error::ConfigError;
pub use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing blogsmith.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .as_ref()
            .cloned()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());
        self.update_path_with_root(&root, &cli.config);

        if let Commands::Serve {
            interface,
            port,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
            if self.base.url.is_none() {
                self.base.url = Some(format!(
                    "http://{}:{}",
                    self.serve.interface, self.serve.port
                ));
            }
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve all paths against `root` and normalize them to absolute paths
    pub fn update_path_with_root(&mut self, root: &Path, config: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(config));
        self.build.content = Self::normalize_path(&root.join(&self.build.content));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.cache = Self::normalize_path(&root.join(&self.build.cache));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before building
    pub fn validate(&self) -> Result<()> {
        if self.build.posts_per_page == 0 {
            bail!(ConfigError::ZeroSetting("build.posts_per_page"));
        }

        if self.build.feed_entries == 0 {
            bail!(ConfigError::ZeroSetting("build.feed_entries"));
        }

        if let Some(url) = self.base.url.as_deref() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!(ConfigError::InvalidUrl(url.to_owned()));
            }
        }

        for pattern in &self.build.ignore {
            if let Err(source) = glob::Pattern::new(pattern) {
                bail!(ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                });
            }
        }

        if self.build.output.starts_with(&self.build.content) {
            bail!(ConfigError::OutputInsideContent {
                output: self.build.output.clone(),
                content: self.build.content.clone(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SiteConfig::from_str("").unwrap();

        assert_eq!(config.base.title, "My Blog");
        assert_eq!(config.build.posts_per_page, 10);
        assert_eq!(config.serve.port, 5277);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = SiteConfig::from_str("[deploy]\nforce = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::load_or_default(&dir.path().join("blogsmith.toml")).unwrap();
        assert_eq!(config.build.output, PathBuf::from("public"));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blogsmith.toml");
        fs::write(&path, "[base]\ntitle = \"From File\"\n").unwrap();

        let config = SiteConfig::from_path(&path).unwrap();
        assert_eq!(config.base.title, "From File");
    }

    #[test]
    fn test_from_path_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = SiteConfig::from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_update_with_cli_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let cli = Cli::parse_from([
            "blogsmith",
            "--root",
            root.to_str().unwrap(),
            "--output",
            "dist",
            "build",
        ]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.get_root(), root.as_path());
        assert_eq!(config.build.output, root.join("dist"));
        assert_eq!(config.build.content, root.join("content"));
        assert_eq!(config.build.cache, root.join(".blogsmith/cache.json"));
        assert_eq!(config.config_path, root.join("blogsmith.toml"));
    }

    #[test]
    fn test_update_with_cli_serve_overrides() {
        let cli = Cli::parse_from(["blogsmith", "serve", "--port", "9000", "--watch", "false"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.serve.port, 9000);
        assert!(!config.serve.watch);
        assert_eq!(config.base.url.as_deref(), Some("http://127.0.0.1:9000"));
    }

    #[test]
    fn test_serve_keeps_configured_url() {
        let cli = Cli::parse_from(["blogsmith", "serve", "--port", "9000"]);

        let mut config = SiteConfig::from_str("[base]\nurl = \"https://blog.example\"").unwrap();
        config.update_with_cli(&cli);

        assert_eq!(config.base.url.as_deref(), Some("https://blog.example"));
    }

    #[test]
    fn test_build_leaves_url_unset() {
        let cli = Cli::parse_from(["blogsmith", "build"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.base.url, None);
    }

    fn validation_error(toml: &str) -> ConfigError {
        let config = SiteConfig::from_str(toml).unwrap();
        config
            .validate()
            .unwrap_err()
            .downcast::<ConfigError>()
            .unwrap()
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let err = validation_error("[build]\nposts_per_page = 0");
        assert!(matches!(err, ConfigError::ZeroSetting("build.posts_per_page")));
    }

    #[test]
    fn test_validate_rejects_zero_feed_entries() {
        let err = validation_error("[build]\nfeed_entries = 0");
        assert!(matches!(err, ConfigError::ZeroSetting("build.feed_entries")));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let err = validation_error("[base]\nurl = \"example.com\"");
        assert!(matches!(err, ConfigError::InvalidUrl(url) if url == "example.com"));

        let err = validation_error("[base]\nurl = \"httpd://example.com\"");
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_validate_rejects_bad_ignore_pattern() {
        let err = validation_error("[build]\nignore = [\"*.bak\", \"[\"]");
        assert!(matches!(err, ConfigError::InvalidPattern { pattern, .. } if pattern == "["));
    }

    #[test]
    fn test_validate_rejects_output_inside_content() {
        let mut config = SiteConfig::default();
        config.update_path_with_root(Path::new("/site"), Path::new("blogsmith.toml"));
        config.build.output = config.build.content.join("public");

        let err = config.validate().unwrap_err().downcast::<ConfigError>().unwrap();
        assert!(matches!(err, ConfigError::OutputInsideContent { .. }));
    }
}
