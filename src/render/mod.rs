//! Markup and template rendering capabilities.
//!
//! The build pipeline never talks to a concrete markup dialect. It asks a
//! [`Renderers`] registry for the [`Renderer`] registered under a file
//! extension, and hands finished contexts to a [`TemplateEngine`].
//!
//! | Capability        | Default implementation          |
//! |-------------------|---------------------------------|
//! | [`Renderer`]      | [`MarkdownRenderer`] (`md`)     |
//! | [`TemplateEngine`]| [`BuiltinTemplates`]            |

mod markdown;
mod templates;

pub use markdown::MarkdownRenderer;
pub use templates::{BuiltinTemplates, TemplateEngine, TemplateError};

use rustc_hash::FxHashMap;
use std::{path::Path, sync::Arc};
use thiserror::Error;

/// Output of a single markup render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Document title found in the markup, if any.
    pub title: Option<String>,
    /// HTML fragment without the title heading.
    pub html: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markup error: {0}")]
    Markup(String),
}

/// A markup dialect.
///
/// Implementations must be pure: identical input always yields identical
/// output, so cached metadata stays valid for byte-identical sources.
pub trait Renderer: Send + Sync {
    fn render(&self, text: &str) -> Result<Rendered, RenderError>;

    /// Cheap title lookup used while scanning, before any full render.
    fn extract_title(&self, text: &str) -> Option<String>;
}

/// Renderers keyed by lowercase file extension.
#[derive(Clone, Default)]
pub struct Renderers {
    by_ext: FxHashMap<String, Arc<dyn Renderer>>,
}

impl Renderers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Markdown renderer for `md` and `markdown`.
    pub fn with_defaults() -> Self {
        let mut renderers = Self::new();
        renderers.register(&["md", "markdown"], Arc::new(MarkdownRenderer::default()));
        renderers
    }

    pub fn register(&mut self, exts: &[&str], renderer: Arc<dyn Renderer>) {
        for ext in exts {
            self.by_ext
                .insert(ext.to_ascii_lowercase(), Arc::clone(&renderer));
        }
    }

    pub fn get(&self, ext: &str) -> Option<&dyn Renderer> {
        self.by_ext
            .get(&ext.to_ascii_lowercase())
            .map(|renderer| renderer.as_ref())
    }

    /// Renderer responsible for `path`, judged by its extension.
    pub fn for_path(&self, path: &Path) -> Option<&dyn Renderer> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get(ext))
    }

    pub fn handles(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Renderer for Upper {
        fn render(&self, text: &str) -> Result<Rendered, RenderError> {
            Ok(Rendered {
                title: None,
                html: text.to_uppercase(),
            })
        }

        fn extract_title(&self, _text: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_defaults_handle_markdown() {
        let renderers = Renderers::with_defaults();

        assert!(renderers.handles(Path::new("posts/2024/01-02-a.md")));
        assert!(renderers.handles(Path::new("about.MARKDOWN")));
        assert!(!renderers.handles(Path::new("notes.rst")));
        assert!(!renderers.handles(Path::new("Makefile")));
    }

    #[test]
    fn test_register_custom_extension() {
        let mut renderers = Renderers::new();
        renderers.register(&["txt"], Arc::new(Upper));

        let rendered = renderers
            .for_path(Path::new("a.txt"))
            .unwrap()
            .render("hi")
            .unwrap();
        assert_eq!(rendered.html, "HI");
    }
}
