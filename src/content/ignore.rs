//! Glob-based ignore rules for the content tree.

use glob::{Pattern, PatternError};
use std::path::{Component, Path};

/// Patterns matched against every path segment below the content root.
///
/// A directory whose own segment matches is skipped entirely.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// Check a single file or directory name.
    pub fn matches_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }

    /// Check every segment of a path relative to the content root.
    pub fn is_ignored(&self, rel: &Path) -> bool {
        rel.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(|n| self.matches_name(n)),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;

    fn rules() -> IgnoreRules {
        IgnoreRules::new(&defaults::build::ignore()).unwrap()
    }

    #[test]
    fn test_default_patterns() {
        let rules = rules();

        assert!(rules.is_ignored(Path::new(".git/config")));
        assert!(rules.is_ignored(Path::new("_drafts/post.md")));
        assert!(rules.is_ignored(Path::new("config.yml")));
        assert!(rules.is_ignored(Path::new("README")));
        assert!(rules.is_ignored(Path::new("nginx.conf")));
        assert!(rules.is_ignored(Path::new("posts/.hidden.md")));
        assert!(!rules.is_ignored(Path::new("posts/2024/01-15-hello.md")));
        assert!(!rules.is_ignored(Path::new("README.md")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(IgnoreRules::new(&["["]).is_err());
    }

    #[test]
    fn test_parent_dir_components_are_not_matched() {
        let rules = IgnoreRules::new(&["..*"]).unwrap();
        assert!(!rules.is_ignored(Path::new("../a.md")));
    }
}
