//! Content scanning error types.

use crate::render::RenderError;
use std::path::PathBuf;
use thiserror::Error;

/// Per-file failures. The file is skipped for the current run and retried
/// on the next one.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("`{0}` is not valid UTF-8")]
    Encoding(PathBuf),

    #[error("no renderer registered for `{0}`")]
    NoRenderer(PathBuf),

    #[error("failed to render `{path}`")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("invalid ignore pattern")]
    Pattern(#[from] glob::PatternError),
}
