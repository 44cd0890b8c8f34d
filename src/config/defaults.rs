//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn title() -> String {
        "My Blog".into()
    }

    pub fn url() -> Option<String> {
        None
    }

    pub fn author() -> String {
        "<YOUR_NAME>".into()
    }

    pub fn email() -> String {
        "user@noreply.blogsmith".into()
    }

    pub fn language() -> String {
        "en".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn cache() -> PathBuf {
        ".blogsmith/cache.json".into()
    }

    pub fn posts_per_page() -> usize {
        10
    }

    pub fn feed_entries() -> usize {
        10
    }

    pub fn ignore() -> Vec<String> {
        [".*", "_*", "config.yml", "Makefile", "README", "*.conf"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5277
    }

    pub fn debounce_ms() -> u64 {
        500
    }

    pub fn poll_ms() -> u64 {
        100
    }

    pub fn keepalive_secs() -> u64 {
        15
    }
}
