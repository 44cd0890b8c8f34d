//! JSON contexts handed to the template engine.

use super::{archive::MonthBucket, archive::YearBucket, tags};
use crate::{config::SiteConfig, content::Document};
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

/// Rendered summary HTML keyed by source path.
pub type Summaries = FxHashMap<String, String>;

pub fn site(config: &SiteConfig) -> Value {
    json!({
        "title": config.base.title,
        "description": config.base.description,
        "author": config.base.author,
        "url": config.base.base_url(),
        "language": config.base.language,
    })
}

fn tag_refs(doc: &Document) -> Vec<Value> {
    doc.meta
        .tags
        .iter()
        .filter_map(|name| {
            let dir = tags::tag_dir(name)?;
            Some(json!({ "name": name, "url": tags::tag_url(&dir) }))
        })
        .collect()
}

/// A document as it appears in listings and on its own page.
///
/// `summary` is already HTML.
pub fn document(doc: &Document, summary: Option<&str>) -> Value {
    json!({
        "title": doc.meta.title,
        "url": doc.meta.slug(),
        "date": doc.meta.pub_date.map(|d| d.format("%Y-%m-%d").to_string()),
        "summary": summary,
        "tags": tag_refs(doc),
    })
}

pub fn documents<'a>(
    docs: impl IntoIterator<Item = &'a Document>,
    summaries: &Summaries,
) -> Vec<Value> {
    docs.into_iter()
        .map(|doc| document(doc, summaries.get(&doc.meta.path).map(String::as_str)))
        .collect()
}

pub fn month(bucket: &MonthBucket<'_>, summaries: &Summaries) -> Value {
    json!({
        "year": bucket.year,
        "month": bucket.month_key(),
        "month_name": bucket.month_name(),
        "count": bucket.posts.len(),
        "posts": documents(bucket.posts.iter().copied(), summaries),
    })
}

pub fn year(bucket: &YearBucket<'_>, summaries: &Summaries) -> Value {
    json!({
        "year": bucket.year,
        "count": bucket.count(),
        "months": bucket
            .months
            .iter()
            .map(|m| month(m, summaries))
            .collect::<Vec<_>>(),
    })
}
