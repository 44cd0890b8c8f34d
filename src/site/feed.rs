//! Atom 1.0 feed generation.

use crate::{config::SiteConfig, content::Document};
use atom_syndication::{
    CategoryBuilder, ContentBuilder, Entry, EntryBuilder, Feed, FeedBuilder, FixedDateTime,
    GeneratorBuilder, Link, LinkBuilder, Person, PersonBuilder, Text,
};
use chrono::{DateTime, NaiveDate, Utc};
use rustc_hash::FxHashMap;

/// A feed to be written: its own URL path plus the entries it carries.
pub struct AtomFeed<'a> {
    pub title: String,
    pub subtitle: String,
    /// Site-absolute path of the feed document, e.g. `/feed.atom`.
    pub path: String,
    pub posts: Vec<&'a Document>,
}

impl AtomFeed<'_> {
    /// Serialize to XML. `bodies` maps source paths to rendered HTML; posts
    /// missing from it get an entry without content.
    pub fn into_xml(self, config: &SiteConfig, bodies: &FxHashMap<String, String>) -> String {
        let base_url = config.base.base_url();
        let feed_url = format!("{base_url}{}", self.path);

        let entries: Vec<Entry> = self
            .posts
            .iter()
            .filter_map(|post| post_to_entry(post, base_url, bodies))
            .collect();

        // Newest entry date, so an unchanged corpus yields identical bytes.
        let updated = self
            .posts
            .iter()
            .filter_map(|p| p.meta.pub_date)
            .max()
            .and_then(date_to_fixed)
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.fixed_offset());

        let author: Person = PersonBuilder::default()
            .name(config.base.author.clone())
            .email(Some(config.base.email.clone()))
            .build();

        let self_link: Link = LinkBuilder::default()
            .href(feed_url.clone())
            .rel("self".to_string())
            .mime_type(Some("application/atom+xml".to_string()))
            .build();

        let alternate_link: Link = LinkBuilder::default()
            .href(format!("{base_url}/"))
            .rel("alternate".to_string())
            .build();

        let feed: Feed = FeedBuilder::default()
            .title(Text::plain(self.title))
            .id(feed_url)
            .updated(updated)
            .authors(vec![author])
            .links(vec![self_link, alternate_link])
            .subtitle(Some(Text::plain(self.subtitle)))
            .generator(Some(
                GeneratorBuilder::default()
                    .value(env!("CARGO_PKG_NAME"))
                    .version(Some(env!("CARGO_PKG_VERSION").to_string()))
                    .build(),
            ))
            .lang(Some(config.base.language.clone()))
            .entries(entries)
            .build();

        feed.to_string()
    }
}

/// Midnight UTC of `date`.
fn date_to_fixed(date: NaiveDate) -> Option<FixedDateTime> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
}

fn post_to_entry(
    post: &Document,
    base_url: &str,
    bodies: &FxHashMap<String, String>,
) -> Option<Entry> {
    let published = date_to_fixed(post.meta.pub_date?)?;
    let link = format!("{base_url}{}", post.meta.slug());

    let entry_link: Link = LinkBuilder::default()
        .href(link.clone())
        .rel("alternate".to_string())
        .build();

    // The Atom writer escapes the HTML payload.
    let content = bodies.get(&post.meta.path).map(|html| {
        ContentBuilder::default()
            .value(Some(html.clone()))
            .content_type(Some("html".to_string()))
            .build()
    });

    let categories: Vec<_> = post
        .meta
        .tags
        .iter()
        .map(|tag| CategoryBuilder::default().term(tag.clone()).build())
        .collect();

    Some(
        EntryBuilder::default()
            .title(Text::plain(post.meta.title.clone()))
            .id(link)
            .updated(published)
            .published(Some(published))
            .links(vec![entry_link])
            .summary(post.meta.summary.clone().map(Text::plain))
            .categories(categories)
            .content(content)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{DocumentMeta, frontmatter::Frontmatter};
    use std::time::SystemTime;

    fn make_config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.base.title = "Test Blog".to_string();
        config.base.author = "Test Author".to_string();
        config.base.url = Some("https://example.com/".to_string());
        config
    }

    fn post(path: &str, day: u32) -> Document {
        let fm = Frontmatter {
            title: Some(format!("Post {day}")),
            date: NaiveDate::from_ymd_opt(2024, 1, day),
            ..Frontmatter::default()
        };
        Document::new(
            DocumentMeta::new(path.into(), fm, None),
            String::new(),
            SystemTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn test_entry_basic() {
        let doc = post("posts/2024/01-15-test.md", 15);
        let entry = post_to_entry(&doc, "https://example.com", &FxHashMap::default()).unwrap();

        assert_eq!(entry.title().as_str(), "Post 15");
        assert_eq!(entry.id(), "https://example.com/2024/01/15/test/");
        assert!(entry.updated().to_rfc3339().starts_with("2024-01-15T00:00:00"));
        assert!(entry.content().is_none());
    }

    #[test]
    fn test_page_without_date_has_no_entry() {
        let doc = Document::new(
            DocumentMeta::new("about.md".into(), Frontmatter::default(), None),
            String::new(),
            SystemTime::UNIX_EPOCH,
        );
        assert!(post_to_entry(&doc, "", &FxHashMap::default()).is_none());
    }

    #[test]
    fn test_feed_xml_escapes_html_and_uses_newest_date() {
        let config = make_config();
        let a = post("posts/2024/01-03-a.md", 3);
        let b = post("posts/2024/01-09-b.md", 9);
        let mut bodies = FxHashMap::default();
        bodies.insert(a.meta.path.clone(), "<p>Hello & bye</p>".to_string());

        let xml = AtomFeed {
            title: "Test Blog".into(),
            subtitle: String::new(),
            path: "/feed.atom".into(),
            posts: vec![&b, &a],
        }
        .into_xml(&config, &bodies);

        assert!(xml.contains("<id>https://example.com/feed.atom</id>"));
        assert!(xml.contains("Hello &amp; bye"));
        assert!(xml.contains("&lt;p"));
        assert!(xml.contains("<updated>2024-01-09T00:00:00+00:00</updated>"));
        assert!(!xml.contains("<p>Hello"));
    }

    #[test]
    fn test_feed_is_deterministic() {
        let config = make_config();
        let a = post("posts/2024/01-03-a.md", 3);
        let render = || {
            AtomFeed {
                title: "T".into(),
                subtitle: String::new(),
                path: "/feed.atom".into(),
                posts: vec![&a],
            }
            .into_xml(&config, &FxHashMap::default())
        };
        assert_eq!(render(), render());
    }
}
