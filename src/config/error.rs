//! Errors raised while loading or validating `blogsmith.toml`.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", .0.display())]
    Read(PathBuf, #[source] io::Error),

    #[error("invalid blogsmith.toml: {0}")]
    Parse(#[from] toml::de::Error),

    /// A counter setting that must be at least 1.
    #[error("[{0}] must be greater than 0")]
    ZeroSetting(&'static str),

    #[error("[base.url] `{0}` must start with http:// or https://")]
    InvalidUrl(String),

    #[error("[build.ignore] contains an invalid pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("[build.output] `{}` must not live inside [build.content] `{}`", .output.display(), .content.display())]
    OutputInsideContent { output: PathBuf, content: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_read_error_names_file() {
        let err = ConfigError::Read(
            PathBuf::from("blogsmith.toml"),
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert_eq!(err.to_string(), "cannot read `blogsmith.toml`");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_pattern_keeps_glob_error() {
        let source = glob::Pattern::new("[").unwrap_err();
        let err = ConfigError::InvalidPattern {
            pattern: "[".into(),
            source,
        };
        assert!(err.to_string().contains("`[`"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_zero_setting_names_key() {
        let err = ConfigError::ZeroSetting("build.posts_per_page");
        assert_eq!(err.to_string(), "[build.posts_per_page] must be greater than 0");
    }
}
