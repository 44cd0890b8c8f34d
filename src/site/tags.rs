//! Tag pages and the tag cloud.

use crate::{content::Document, corpus::CorpusIndex};
use std::path::{Path, PathBuf};

/// Upper bound on tags shown in the cloud.
const CLOUD_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct CloudTag<'a> {
    pub name: &'a str,
    pub count: usize,
    /// Font size in percent.
    pub size: f64,
}

/// Directory name for a tag, or `None` if it cannot be a path segment.
///
/// `index.html` is refused because `tags/index.html` is the tag cloud.
pub fn tag_dir(name: &str) -> Option<String> {
    let dir = name.trim().replace(['/', '\\'], "-");
    match dir.as_str() {
        "" | "." | ".." => None,
        _ if dir.eq_ignore_ascii_case("index.html") => None,
        _ => Some(dir),
    }
}

pub fn tag_url(dir: &str) -> String {
    format!("/tags/{}/", urlencoding::encode(dir))
}

pub fn tag_feed_url(dir: &str) -> String {
    format!("/tags/{}/feed.atom", urlencoding::encode(dir))
}

pub fn tag_output_dir(output_dir: &Path, dir: &str) -> PathBuf {
    output_dir.join("tags").join(dir)
}

/// Posts for a tag page: by title, case-insensitive, ties in date order.
pub fn by_title<'a>(mut posts: Vec<&'a Document>) -> Vec<&'a Document> {
    posts.sort_by_cached_key(|doc| doc.meta.title.to_lowercase());
    posts
}

/// The most used tags, displayed alphabetically.
pub fn cloud(index: &CorpusIndex) -> Vec<CloudTag<'_>> {
    let mut tags: Vec<CloudTag<'_>> = index
        .tag_counts()
        .map(|(name, count)| CloudTag {
            name,
            count,
            size: 100.0 + (count.max(1) as f64).ln() * 20.0,
        })
        .collect();

    tags.sort_by(|a, b| b.count.cmp(&a.count));
    tags.truncate(CLOUD_LIMIT);
    tags.sort_by_cached_key(|tag| tag.name.to_lowercase());
    tags
}
