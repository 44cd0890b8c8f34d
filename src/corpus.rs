//! In-memory view of the whole site, rebuilt from every scan.

use crate::content::{Document, Scan};
use std::collections::BTreeMap;

/// Posts sorted newest first, pages in walk order, and posts grouped by tag.
///
/// Tag lists hold indices into `posts` and keep the post order.
#[derive(Debug, Default)]
pub struct CorpusIndex {
    posts: Vec<Document>,
    pages: Vec<Document>,
    tags: BTreeMap<String, Vec<usize>>,
}

impl CorpusIndex {
    pub fn from_scan(scan: Scan) -> Self {
        let Scan {
            mut posts, pages, ..
        } = scan;

        // Stable: equal dates keep walk order.
        posts.sort_by(|a, b| b.meta.pub_date.cmp(&a.meta.pub_date));

        let mut tags: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, post) in posts.iter().enumerate() {
            for tag in &post.meta.tags {
                tags.entry(tag.clone()).or_default().push(idx);
            }
        }

        Self { posts, pages, tags }
    }

    pub fn posts(&self) -> &[Document] {
        &self.posts
    }

    pub fn pages(&self) -> &[Document] {
        &self.pages
    }

    /// Every document, posts first.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.posts.iter().chain(&self.pages)
    }

    /// Tag names in byte order.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Posts carrying `tag`, newest first.
    pub fn tagged(&self, tag: &str) -> Vec<&Document> {
        self.tags
            .get(tag)
            .map(|ids| ids.iter().map(|&i| &self.posts[i]).collect())
            .unwrap_or_default()
    }

    /// `(tag, post count)` pairs in tag order.
    pub fn tag_counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.tags.iter().map(|(tag, ids)| (tag.as_str(), ids.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{DocumentMeta, frontmatter::Frontmatter};
    use chrono::NaiveDate;
    use std::time::SystemTime;

    fn post(path: &str, date: (i32, u32, u32), tags: &[&str]) -> Document {
        let fm = Frontmatter {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Frontmatter::default()
        };
        Document::new(
            DocumentMeta::new(path.into(), fm, None),
            String::new(),
            SystemTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn test_posts_sorted_desc_with_stable_ties() {
        let scan = Scan {
            posts: vec![
                post("a.md", (2024, 1, 1), &[]),
                post("b.md", (2024, 3, 1), &[]),
                post("c.md", (2024, 1, 1), &[]),
            ],
            ..Scan::default()
        };
        let index = CorpusIndex::from_scan(scan);
        let paths: Vec<_> = index.posts().iter().map(|d| d.meta.path.as_str()).collect();

        assert_eq!(paths, vec!["b.md", "a.md", "c.md"]);
    }

    #[test]
    fn test_tag_map() {
        let scan = Scan {
            posts: vec![
                post("old.md", (2023, 1, 1), &["rust", "web"]),
                post("new.md", (2024, 1, 1), &["rust"]),
            ],
            ..Scan::default()
        };
        let index = CorpusIndex::from_scan(scan);

        let rust: Vec<_> = index.tagged("rust").iter().map(|d| d.meta.path.as_str()).collect();
        assert_eq!(rust, vec!["new.md", "old.md"]);
        assert_eq!(index.tagged("web").len(), 1);
        assert!(index.tagged("none").is_empty());
        assert_eq!(
            index.tag_counts().collect::<Vec<_>>(),
            vec![("rust", 2), ("web", 1)]
        );
    }
}
