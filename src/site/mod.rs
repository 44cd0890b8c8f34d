//! Incremental site builder.
//!
//! # Staleness
//!
//! Two independent axes decide what a build writes:
//!
//! | Axis        | Rule                                                         |
//! |-------------|--------------------------------------------------------------|
//! | Document    | output missing, or source mtime strictly newer than output   |
//! | Corpus-wide | any document written, any document removed, or root index    |
//! |             | missing while posts exist: regenerate every derived page     |
//!
//! Derived pages (index pages, archives, tag pages, feeds) depend on the whole
//! corpus, so they are rebuilt together and only after every per-document
//! render of the build has finished.
//!
//! # Site stamp
//!
//! The metadata cache also records a [`SiteStamp`]: a fingerprint of the
//! settings that shape rendered pages, and whether the last derived pass
//! finished. A changed fingerprint marks every document stale. An unfinished
//! derived pass is retried by the next build even when no source changed.
//!
//! A build with no filesystem or settings changes writes nothing.

mod archive;
mod context;
mod feed;
mod pagination;
mod tags;

pub use pagination::Pagination;

use crate::{
    config::SiteConfig,
    content::{ContentError, ContentStore, Document, DocumentMeta, SiteStamp, hash_bytes},
    corpus::CorpusIndex,
    log,
    render::{Renderers, TemplateEngine},
};
use anyhow::{Context, Result};
use context::Summaries;
use feed::AtomFeed;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, json};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

/// What a single build did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Public documents in the corpus.
    pub documents: usize,
    /// Document pages written.
    pub rendered: usize,
    /// Stale documents that failed to render or write.
    pub failed: usize,
    /// Outputs deleted for removed sources.
    pub removed: usize,
    /// Derived pages and feeds written.
    pub derived: usize,
    /// Documents whose output a derived page overwrote.
    pub shadowed: usize,
    pub elapsed: Duration,
}

impl BuildReport {
    pub const fn wrote_anything(&self) -> bool {
        self.rendered + self.removed + self.derived > 0
    }
}

pub struct SiteBuilder {
    config: SiteConfig,
    store: ContentStore,
    templates: Arc<dyn TemplateEngine>,
    site_ctx: Value,
    fingerprint: String,
}

impl SiteBuilder {
    pub fn new(
        config: &SiteConfig,
        renderers: Arc<Renderers>,
        templates: Arc<dyn TemplateEngine>,
    ) -> Result<Self> {
        Ok(Self {
            store: ContentStore::new(config, renderers)?,
            site_ctx: context::site(config),
            fingerprint: settings_fingerprint(config),
            config: config.clone(),
            templates,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn output(&self) -> &Path {
        &self.config.build.output
    }

    /// Remove the output directory and the metadata cache.
    pub fn clean(&self) -> Result<()> {
        let output = self.output();
        if output.exists() {
            fs::remove_dir_all(output)
                .with_context(|| format!("failed to remove {}", output.display()))?;
        }
        let cache = &self.config.build.cache;
        if cache.exists() {
            fs::remove_file(cache)
                .with_context(|| format!("failed to remove {}", cache.display()))?;
        }
        Ok(())
    }

    /// Scan, render stale documents, then regenerate derived pages if needed.
    pub fn build(&self) -> Result<BuildReport> {
        let start = Instant::now();
        let mut scan = self.store.scan()?;
        let removed_meta = std::mem::take(&mut scan.removed);
        let stamp = scan.stamp.take();
        let index = CorpusIndex::from_scan(scan);
        let output = self.output();

        let settings_changed = stamp
            .as_ref()
            .is_none_or(|stamp| stamp.fingerprint != self.fingerprint);
        let derived_pending = stamp.as_ref().is_none_or(|stamp| !stamp.derived_complete);

        let stale: Vec<&Document> = index
            .documents()
            .filter(|doc| settings_changed || is_stale(doc, output))
            .collect();

        let renders: Vec<_> = stale
            .par_iter()
            .map(|&doc| (doc, self.render_page(doc)))
            .collect();

        let mut report = BuildReport {
            documents: index.posts().len() + index.pages().len(),
            ..BuildReport::default()
        };
        let mut bodies = FxHashMap::default();

        for (doc, result) in renders {
            let path = doc.meta.output_path(output);
            let written = result.and_then(|(body, page)| {
                write_output(&path, &page)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Ok(body)
            });
            match written {
                Ok(body) => {
                    report.rendered += 1;
                    bodies.insert(doc.meta.path.clone(), body);
                }
                Err(err) => {
                    report.failed += 1;
                    log!("error"; "{}: {err:#}", doc.meta.path);
                    // An output from older settings would otherwise look fresh.
                    if settings_changed && path.is_file() {
                        if let Err(err) = fs::remove_file(&path) {
                            log!("warn"; "cannot remove {}: {err}", path.display());
                        }
                    }
                }
            }
        }

        report.removed = self.remove_outputs(&removed_meta, &index);

        let index_missing = !index.posts().is_empty() && !output.join("index.html").exists();
        if report.rendered > 0
            || report.removed > 0
            || index_missing
            || settings_changed
            || derived_pending
        {
            self.record_stamp(false);
            self.write_derived(&index, bodies, &mut report)?;
            self.record_stamp(true);
        }

        report.elapsed = start.elapsed();
        log!(
            "build";
            "{} documents: {} rendered, {} failed, {} removed, {} derived in {:.2?}",
            report.documents,
            report.rendered,
            report.failed,
            report.removed,
            report.derived,
            report.elapsed
        );
        Ok(report)
    }

    /// Persist the settings fingerprint and whether derived pages are current.
    fn record_stamp(&self, derived_complete: bool) {
        let stamp = SiteStamp {
            fingerprint: self.fingerprint.clone(),
            derived_complete,
        };
        if let Err(err) = self.store.record_stamp(stamp) {
            log!("cache"; "cannot record site stamp: {err}");
        }
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Render `text` with the renderer registered for `doc`'s extension.
    fn render_markup(&self, doc: &Document, text: &str) -> Result<String, ContentError> {
        let path = Path::new(&doc.meta.path);
        let renderer = self
            .store
            .renderers()
            .for_path(path)
            .ok_or_else(|| ContentError::NoRenderer(path.to_path_buf()))?;

        renderer
            .render(text)
            .map(|rendered| rendered.html)
            .map_err(|source| ContentError::Render {
                path: path.to_path_buf(),
                source,
            })
    }

    fn render_body(&self, doc: &Document) -> Result<String, ContentError> {
        self.render_markup(doc, &doc.body)
    }

    /// Summary markup as HTML. A summary that fails to render is left out.
    fn render_summary(&self, doc: &Document) -> Option<String> {
        let summary = doc.meta.summary.as_deref()?;
        match self.render_markup(doc, summary) {
            Ok(html) => Some(html),
            Err(err) => {
                log!("warn"; "summary dropped: {:#}", anyhow::Error::from(err));
                None
            }
        }
    }

    fn summaries(&self, docs: &[Document]) -> Summaries {
        docs.par_iter()
            .filter_map(|doc| Some((doc.meta.path.clone(), self.render_summary(doc)?)))
            .collect()
    }

    /// Rendered body HTML and the full page.
    fn render_page(&self, doc: &Document) -> Result<(String, String)> {
        let body = self.render_body(doc)?;
        let summary = self.render_summary(doc);
        let ctx = json!({
            "site": self.site_ctx,
            "doc": context::document(doc, summary.as_deref()),
            "body": body,
        });
        let page = self.templates.render("content_display", &ctx)?;
        Ok((body, page))
    }

    /// Delete outputs of removed sources, unless a current document owns the
    /// same output path.
    fn remove_outputs(&self, removed: &[DocumentMeta], index: &CorpusIndex) -> usize {
        let output = self.output();
        let live: FxHashSet<PathBuf> = index
            .documents()
            .map(|doc| doc.meta.output_path(output))
            .collect();

        let mut count = 0;
        for meta in removed {
            let path = meta.output_path(output);
            if live.contains(&path) || !path.exists() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    count += 1;
                    prune_empty_dirs(&path, output);
                }
                Err(err) => log!("warn"; "cannot remove {}: {err}", path.display()),
            }
        }
        count
    }

    // ========================================================================
    // Derived pages
    // ========================================================================

    fn template(&self, name: &str, ctx: &Value) -> Result<String> {
        self.templates
            .render(name, ctx)
            .with_context(|| format!("failed to render template `{name}`"))
    }

    /// Write every derived page, counting them and any document outputs
    /// they overwrite into `report`.
    fn write_derived(
        &self,
        index: &CorpusIndex,
        mut bodies: FxHashMap<String, String>,
        report: &mut BuildReport,
    ) -> Result<()> {
        let output = self.output();
        let posts = index.posts();
        let feed_len = self.config.build.feed_entries;
        let summaries = self.summaries(posts);
        let mut pages: Vec<(PathBuf, String)> = Vec::new();

        // Index pages
        for page in Pagination::pages(posts.len(), self.config.build.posts_per_page) {
            let ctx = json!({
                "site": self.site_ctx,
                "page": page.page,
                "total_pages": page.total_pages(),
                "posts": context::documents(page.slice(posts), &summaries),
                "prev": page.prev_url(),
                "next": page.next_url(),
            });
            pages.push((page.output_path(output), self.template("blog/index", &ctx)?));
        }

        // Archives
        let years = archive::buckets(posts);
        let ctx = json!({
            "site": self.site_ctx,
            "years": years
                .iter()
                .map(|year| context::year(year, &summaries))
                .collect::<Vec<_>>(),
        });
        pages.push((
            output.join("archive").join("index.html"),
            self.template("blog/archive", &ctx)?,
        ));
        for year in &years {
            let year_dir = output.join(year.year.to_string());
            let ctx = json!({ "site": self.site_ctx, "year": context::year(year, &summaries) });
            pages.push((
                year_dir.join("index.html"),
                self.template("blog/year_archive", &ctx)?,
            ));
            for month in &year.months {
                let ctx = json!({
                    "site": self.site_ctx,
                    "month": context::month(month, &summaries),
                });
                pages.push((
                    year_dir.join(month.month_key()).join("index.html"),
                    self.template("blog/month_archive", &ctx)?,
                ));
            }
        }

        // Tags
        let mut feeds: Vec<(PathBuf, AtomFeed<'_>)> = Vec::new();
        for name in index.tag_names() {
            let Some(dir) = tags::tag_dir(name) else {
                log!("warn"; "skipping tag `{name}`: not a valid directory name");
                continue;
            };
            let tagged = index.tagged(name);
            let tag_dir = tags::tag_output_dir(output, &dir);

            let ctx = json!({
                "site": self.site_ctx,
                "tag": {
                    "name": name,
                    "count": tagged.len(),
                    "url": tags::tag_url(&dir),
                    "feed": tags::tag_feed_url(&dir),
                },
                "posts": context::documents(tags::by_title(tagged.clone()), &summaries),
            });
            pages.push((tag_dir.join("index.html"), self.template("tag", &ctx)?));

            feeds.push((
                tag_dir.join("feed.atom"),
                AtomFeed {
                    title: format!("{} - {name}", self.config.base.title),
                    subtitle: format!("Recent blog posts tagged with '{name}'"),
                    path: tags::tag_feed_url(&dir),
                    posts: tagged.into_iter().take(feed_len).collect(),
                },
            ));
        }

        let cloud: Vec<Value> = tags::cloud(index)
            .into_iter()
            .filter_map(|tag| {
                let dir = tags::tag_dir(tag.name)?;
                Some(json!({
                    "name": tag.name,
                    "count": tag.count,
                    "size": tag.size,
                    "url": tags::tag_url(&dir),
                }))
            })
            .collect();
        let ctx = json!({ "site": self.site_ctx, "tags": cloud });
        pages.push((
            output.join("tags").join("index.html"),
            self.template("tagcloud", &ctx)?,
        ));

        // Feeds
        feeds.push((
            output.join("feed.atom"),
            AtomFeed {
                title: self.config.base.title.clone(),
                subtitle: self.config.base.description.clone(),
                path: "/feed.atom".into(),
                posts: posts.iter().take(feed_len).collect(),
            },
        ));
        self.fill_feed_bodies(&feeds, &mut bodies);
        for (path, feed) in feeds {
            pages.push((path, feed.into_xml(&self.config, &bodies)));
        }

        let owners: FxHashMap<PathBuf, &str> = index
            .documents()
            .map(|doc| (doc.meta.output_path(output), doc.meta.path.as_str()))
            .collect();
        for (path, _) in &pages {
            if let Some(source) = owners.get(path) {
                log!("warn"; "{source} is hidden by generated {}", path.display());
                report.shadowed += 1;
            }
        }

        for (path, contents) in &pages {
            write_output(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        report.derived = pages.len();
        Ok(())
    }

    /// Render bodies of feed entries that were not rendered earlier in this build.
    fn fill_feed_bodies(&self, feeds: &[(PathBuf, AtomFeed<'_>)], bodies: &mut FxHashMap<String, String>) {
        let mut seen = FxHashSet::default();
        let missing: Vec<&Document> = feeds
            .iter()
            .flat_map(|(_, feed)| feed.posts.iter().copied())
            .filter(|doc| !bodies.contains_key(&doc.meta.path))
            .filter(|doc| seen.insert(doc.meta.path.as_str()))
            .collect();

        let rendered: Vec<_> = missing
            .par_iter()
            .map(|&doc| (doc, self.render_body(doc)))
            .collect();

        for (doc, result) in rendered {
            match result {
                Ok(html) => {
                    bodies.insert(doc.meta.path.clone(), html);
                }
                Err(err) => log!("warn"; "feed entry without content: {:#}", anyhow::Error::from(err)),
            }
        }
    }
}

/// Hash of the settings every rendered page depends on.
fn settings_fingerprint(config: &SiteConfig) -> String {
    let settings = json!({
        "base": config.base,
        "posts_per_page": config.build.posts_per_page,
        "feed_entries": config.build.feed_entries,
    });
    hash_bytes(settings.to_string().as_bytes())
}

/// Output absent, or source strictly newer than output.
fn is_stale(doc: &Document, output_dir: &Path) -> bool {
    match fs::metadata(doc.meta.output_path(output_dir)).and_then(|m| m.modified()) {
        Ok(output_mtime) => doc.modified > output_mtime,
        Err(_) => true,
    }
}

fn write_output(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// Remove now-empty directories from `file`'s parent up to, not including, `root`.
fn prune_empty_dirs(file: &Path, root: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) || fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}
