//! Fixed-size pagination of the post index.
//!
//! Page 1 lives at the site root, page N > 1 at `page/<N>/`.

use std::path::{Path, PathBuf};

/// One index page over a slice of `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl Pagination {
    /// Number of pages needed for `total` items, zero when there are none.
    pub const fn page_count(total: usize, per_page: usize) -> usize {
        total.div_ceil(per_page)
    }

    /// Every page for `total` items.
    pub fn pages(total: usize, per_page: usize) -> impl Iterator<Item = Self> {
        (1..=Self::page_count(total, per_page)).map(move |page| Self {
            page,
            per_page,
            total,
        })
    }

    pub const fn total_pages(&self) -> usize {
        Self::page_count(self.total, self.per_page)
    }

    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// The `[(page-1)*per_page, page*per_page)` window of `items`.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = ((self.page - 1) * self.per_page).min(items.len());
        let end = (self.page * self.per_page).min(items.len());
        &items[start..end]
    }

    pub fn prev_url(&self) -> Option<String> {
        self.has_prev().then(|| page_url(self.page - 1))
    }

    pub fn next_url(&self) -> Option<String> {
        self.has_next().then(|| page_url(self.page + 1))
    }

    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        match self.page {
            1 => output_dir.join("index.html"),
            n => output_dir.join("page").join(n.to_string()).join("index.html"),
        }
    }
}

fn page_url(page: usize) -> String {
    match page {
        1 => "/".into(),
        n => format!("/page/{n}/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(Pagination::page_count(0, 10), 0);
        assert_eq!(Pagination::page_count(1, 10), 1);
        assert_eq!(Pagination::page_count(10, 10), 1);
        assert_eq!(Pagination::page_count(25, 10), 3);
    }

    #[test]
    fn test_twenty_five_items() {
        let items: Vec<usize> = (0..25).collect();
        let pages: Vec<_> = Pagination::pages(items.len(), 10).collect();

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].slice(&items), &items[0..10]);
        assert_eq!(pages[2].slice(&items), &items[20..25]);
        assert_eq!(pages[2].slice(&items).len(), 5);
    }

    #[test]
    fn test_links() {
        let mut pages = Pagination::pages(25, 10);
        let first = pages.next().unwrap();
        let second = pages.next().unwrap();
        let third = pages.next().unwrap();

        assert_eq!(first.prev_url(), None);
        assert_eq!(first.next_url().as_deref(), Some("/page/2/"));
        assert_eq!(second.prev_url().as_deref(), Some("/"));
        assert_eq!(third.next_url(), None);
        assert_eq!(second.next_url().as_deref(), Some("/page/3/"));
    }

    #[test]
    fn test_output_paths() {
        let out = Path::new("out");
        let mut pages = Pagination::pages(11, 10);

        assert_eq!(pages.next().unwrap().output_path(out), PathBuf::from("out/index.html"));
        assert_eq!(
            pages.next().unwrap().output_path(out),
            PathBuf::from("out/page/2/index.html")
        );
    }
}
