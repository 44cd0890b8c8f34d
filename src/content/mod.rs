//! Source tree scanning.
//!
//! [`ContentStore::scan`] walks the content directory, reuses cached
//! metadata for byte-identical files and parses everything else.
//!
//! ```text
//! walk (sorted, ignore rules) ─▶ hash bytes ─┬─ cache hit ─▶ meta + body split
//!                                            └─ miss ──────▶ frontmatter + title
//!                                                              └─▶ cache insert
//! purge unseen entries ─▶ persist cache ─▶ Scan { posts, pages, removed, stamp }
//! ```
//!
//! A document counts as removed when it leaves the public site in any way:
//! its source is deleted, it turns non-public, it moves to another slug, or
//! it stops loading. Each departure is reported by exactly one scan.

mod cache;
mod document;
mod error;
pub mod frontmatter;
mod ignore;

pub use cache::{MetadataCache, SiteStamp, hash_bytes};
pub use document::{Document, DocumentMeta};
pub use error::ContentError;
pub use ignore::IgnoreRules;

use crate::{config::SiteConfig, log, render::Renderers};
use anyhow::{Result, bail};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

/// Result of one scan.
#[derive(Debug, Default)]
pub struct Scan {
    /// Public documents with a publish date, in walk order.
    pub posts: Vec<Document>,
    /// Public documents without a publish date, in walk order.
    pub pages: Vec<Document>,
    /// Previously published documents whose output is no longer current.
    pub removed: Vec<DocumentMeta>,
    /// Output tree state recorded by the last build.
    pub stamp: Option<SiteStamp>,
}

/// Outcome of loading one file.
struct Loaded {
    doc: Document,
    hash: String,
    reused: bool,
}

pub struct ContentStore {
    root: PathBuf,
    cache_path: PathBuf,
    ignore: IgnoreRules,
    renderers: Arc<Renderers>,
}

impl ContentStore {
    pub fn new(config: &SiteConfig, renderers: Arc<Renderers>) -> Result<Self, ContentError> {
        Ok(Self {
            root: config.build.content.clone(),
            cache_path: config.build.cache.clone(),
            ignore: IgnoreRules::new(&config.build.ignore)?,
            renderers,
        })
    }

    pub fn renderers(&self) -> &Renderers {
        &self.renderers
    }

    /// Scan the content tree, updating and persisting the metadata cache.
    pub fn scan(&self) -> Result<Scan> {
        if !self.root.is_dir() {
            bail!("content directory `{}` not found", self.root.display());
        }

        let mut cache = MetadataCache::load(&self.cache_path);
        let files = self.collect_files();

        let results: Vec<_> = files
            .par_iter()
            .map(|(path, rel)| (rel.as_str(), self.load(path, rel, &cache)))
            .collect();

        let seen: FxHashSet<&str> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        let mut scan = Scan {
            stamp: cache.site().cloned(),
            ..Scan::default()
        };
        let mut reused = 0;

        for (rel, result) in results {
            let loaded = match result {
                Ok(loaded) => loaded,
                Err(err) => {
                    log!("error"; "{:#}", anyhow::Error::from(err));
                    // Forget it so the output is withdrawn once and the
                    // file parses from scratch when it loads again.
                    scan.removed.extend(cache.remove(rel).filter(|old| old.public));
                    continue;
                }
            };

            if loaded.reused {
                reused += 1;
            } else {
                let new = &loaded.doc.meta;
                let previous = cache.insert(loaded.hash, new.clone());
                scan.removed.extend(previous.filter(|old| {
                    old.public && (!new.public || old.slug() != new.slug())
                }));
            }

            match (loaded.doc.meta.public, loaded.doc.meta.is_post()) {
                (false, _) => {}
                (true, true) => scan.posts.push(loaded.doc),
                (true, false) => scan.pages.push(loaded.doc),
            }
        }

        scan.removed.extend(cache.purge(|path| seen.contains(path)));
        if let Err(err) = cache.save(&self.cache_path) {
            log!("cache"; "failed to persist {}: {err}", self.cache_path.display());
        }

        log!(
            "scan";
            "{} posts, {} pages ({} cached, {} removed)",
            scan.posts.len(),
            scan.pages.len(),
            reused,
            scan.removed.len()
        );
        Ok(scan)
    }

    /// Persist `stamp` into the cache sidecar.
    pub fn record_stamp(&self, stamp: SiteStamp) -> io::Result<()> {
        let mut cache = MetadataCache::load(&self.cache_path);
        cache.set_site(stamp);
        cache.save(&self.cache_path)
    }

    /// Qualifying files as `(absolute, relative)` pairs in walk order.
    fn collect_files(&self) -> Vec<(PathBuf, String)> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.ignore.matches_name(name))
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log!("warn"; "skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.renderers.handles(entry.path()))
            .filter_map(|entry| {
                let rel = relative_key(entry.path(), &self.root)?;
                Some((entry.into_path(), rel))
            })
            .collect()
    }

    fn load(&self, path: &Path, rel: &str, cache: &MetadataCache) -> Result<Loaded, ContentError> {
        let read_err = |err| ContentError::Read(path.to_path_buf(), err);
        let bytes = fs::read(path).map_err(read_err)?;
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(read_err)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| ContentError::Encoding(path.to_path_buf()))?;
        let hash = hash_bytes(&bytes);

        if let Some(meta) = cache.get(rel, &hash) {
            let (_, body) = frontmatter::split(text);
            return Ok(Loaded {
                doc: Document::new(meta.clone(), body.to_owned(), modified),
                hash,
                reused: true,
            });
        }

        let renderer = self
            .renderers
            .for_path(path)
            .ok_or_else(|| ContentError::NoRenderer(path.to_path_buf()))?;
        let (fm, body) = frontmatter::parse(text);
        let fallback = match fm.title {
            Some(_) => None,
            None => renderer.extract_title(body),
        };
        let meta = DocumentMeta::new(rel.to_owned(), fm, fallback);

        Ok(Loaded {
            doc: Document::new(meta, body.to_owned(), modified),
            hash,
            reused: false,
        })
    }
}

/// Content-relative, `/`-separated cache key.
fn relative_key(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}
