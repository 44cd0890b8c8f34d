//! Frontmatter header parsing.
//!
//! A header is the leading run of `key: value` lines, ended by the first
//! blank line. A document whose first line is not a `key: value` line has no
//! header at all.
//!
//! ```text
//! title: Hello World
//! tags: [rust, 'web dev']
//! date: 2024-01-15
//! public: yes
//!
//! Body starts here.
//! ```

use chrono::NaiveDate;
use regex::Regex;
use std::{collections::BTreeSet, sync::LazyLock};

static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)\s*:(.*)$").unwrap());

/// Parsed header fields. Unknown keys are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontmatter {
    pub title: Option<String>,
    pub tags: BTreeSet<String>,
    pub summary: Option<String>,
    pub date: Option<NaiveDate>,
    pub public: bool,
}

impl Default for Frontmatter {
    fn default() -> Self {
        Self {
            title: None,
            tags: BTreeSet::new(),
            summary: None,
            date: None,
            public: true,
        }
    }
}

/// Split `text` into header lines and body without parsing the header.
pub fn split(text: &str) -> (&str, &str) {
    let first = text.lines().next().unwrap_or_default();
    if !KEY_VALUE.is_match(first.trim_end()) {
        return ("", text);
    }

    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            return (&text[..offset], &text[offset + line.len()..]);
        }
        offset += line.len();
    }
    (text, "")
}

/// Parse the header of `text`, returning it along with the body.
pub fn parse(text: &str) -> (Frontmatter, &str) {
    let (header, body) = split(text);
    let mut fm = Frontmatter::default();

    for line in header.lines() {
        let Some(caps) = KEY_VALUE.captures(line.trim_end()) else {
            continue;
        };
        let value = caps[2].trim();

        match caps[1].to_ascii_lowercase().as_str() {
            "title" if !value.is_empty() => fm.title = Some(unquote(value).to_owned()),
            "tags" => fm.tags = parse_tags(value),
            "summary" if !value.is_empty() => fm.summary = Some(unquote(value).to_owned()),
            "date" => fm.date = NaiveDate::parse_from_str(unquote(value), "%Y-%m-%d").ok(),
            "public" => fm.public = parse_bool(value).unwrap_or(true),
            _ => {}
        }
    }

    (fm, body)
}

/// `[a, b, 'c']` or a bare `a, b` list.
fn parse_tags(value: &str) -> BTreeSet<String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);

    inner
        .split(',')
        .map(|tag| unquote(tag.trim()).trim())
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" => Some(true),
        "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}
