//! Document model, publish-date resolution and slug rules.

use super::frontmatter::Frontmatter;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::SystemTime,
};

/// `posts/YYYY/MM-DD-<slug>.<ext>`
static POST_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)posts/(\d{4})/(\d{2})-(\d{2})-").unwrap());

/// `YYYY/M/D/<file>`
static LEGACY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)(\d{4})/(\d{1,2})/(\d{1,2})/").unwrap());

/// Leading `MM-DD-` or `YYYY-MM-DD-` on a post's file stem.
static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{4}-)?\d{2}-\d{2}-(.+)$").unwrap());

/// Everything known about a document except its body.
///
/// This is what the metadata cache persists, so it must be a pure function
/// of the source path and bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Path relative to the content root, `/`-separated.
    pub path: String,
    pub title: String,
    pub tags: BTreeSet<String>,
    pub pub_date: Option<NaiveDate>,
    pub summary: Option<String>,
    pub public: bool,
}

/// A scanned source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub meta: DocumentMeta,
    /// Markup text after the header.
    pub body: String,
    /// Source modification time at scan.
    pub modified: SystemTime,
}

impl DocumentMeta {
    /// Build metadata from a parsed header, falling back to `fallback_title`
    /// and then `"Untitled"`.
    pub fn new(path: String, fm: Frontmatter, fallback_title: Option<String>) -> Self {
        let pub_date = fm.date.or_else(|| date_from_path(&path));
        Self {
            title: fm
                .title
                .or(fallback_title)
                .unwrap_or_else(|| "Untitled".into()),
            tags: fm.tags,
            pub_date,
            summary: fm.summary,
            public: fm.public,
            path,
        }
    }

    /// Posts are documents with a resolvable publish date.
    pub const fn is_post(&self) -> bool {
        self.pub_date.is_some()
    }

    /// Site-absolute URL path with leading and trailing `/`.
    pub fn slug(&self) -> String {
        let (dir, file) = match self.path.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, self.path.as_str()),
        };
        let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);

        match self.pub_date {
            Some(date) => {
                let stem = DATE_PREFIX
                    .captures(stem)
                    .and_then(|caps| caps.get(1))
                    .map_or(stem, |m| m.as_str());
                format!(
                    "/{}/{:02}/{:02}/{stem}/",
                    date.year(),
                    date.month(),
                    date.day()
                )
            }
            None => match dir {
                Some(dir) => format!("/{dir}/{stem}/"),
                None => format!("/{stem}/"),
            },
        }
    }

    /// Output file for this document below `output_dir`.
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        let slug = self.slug();
        let slug = slug.trim_matches('/');
        if slug.is_empty() {
            output_dir.join("index.html")
        } else {
            output_dir.join(slug).join("index.html")
        }
    }
}

impl Document {
    pub fn new(meta: DocumentMeta, body: String, modified: SystemTime) -> Self {
        Self {
            meta,
            body,
            modified,
        }
    }
}

/// Publish date encoded in a content-relative path, if any.
pub fn date_from_path(path: &str) -> Option<NaiveDate> {
    let caps = POST_PATH
        .captures(path)
        .or_else(|| LEGACY_PATH.captures(path))?;

    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
