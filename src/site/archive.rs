//! Date archives: posts bucketed by year and month, newest first.

use crate::content::Document;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct MonthBucket<'a> {
    pub year: i32,
    pub month: u32,
    pub posts: Vec<&'a Document>,
}

#[derive(Debug)]
pub struct YearBucket<'a> {
    pub year: i32,
    pub months: Vec<MonthBucket<'a>>,
}

impl MonthBucket<'_> {
    /// Two-digit month, as used in archive URLs.
    pub fn month_key(&self) -> String {
        format!("{:02}", self.month)
    }

    /// English month name, e.g. `March`.
    pub fn month_name(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B").to_string())
            .unwrap_or_default()
    }
}

impl YearBucket<'_> {
    pub fn count(&self) -> usize {
        self.months.iter().map(|m| m.posts.len()).sum()
    }
}

/// Group date-sorted posts into year and month buckets, both descending.
///
/// Post order inside a bucket follows the input order. Empty buckets are
/// never produced.
pub fn buckets<'a>(posts: &'a [Document]) -> Vec<YearBucket<'a>> {
    let mut by_year: BTreeMap<i32, BTreeMap<u32, Vec<&'a Document>>> = BTreeMap::new();
    for post in posts {
        if let Some(date) = post.meta.pub_date {
            by_year
                .entry(date.year())
                .or_default()
                .entry(date.month())
                .or_default()
                .push(post);
        }
    }

    by_year
        .into_iter()
        .rev()
        .map(|(year, months)| YearBucket {
            year,
            months: months
                .into_iter()
                .rev()
                .map(|(month, posts)| MonthBucket { year, month, posts })
                .collect(),
        })
        .collect()
}
