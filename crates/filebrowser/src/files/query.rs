//! Filtering, sorting and pagination of listed entries.

use std::ops::Range;
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Duration, Local};
use protocol::{DateFilter, FileCategory, FilterCriteria, SortField, SortKey, SortOrder};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::browser::DirectoryEntry;

/// Name constraint of a listing.
#[derive(Debug, Clone)]
enum NameQuery {
    Pattern(Regex),
    /// Lowercased needle, used when the query is not a valid regex.
    Substring(String),
}

impl NameQuery {
    fn new(query: &str) -> Self {
        match RegexBuilder::new(query).case_insensitive(true).build() {
            Ok(regex) => NameQuery::Pattern(regex),
            Err(e) => {
                debug!(
                    query = %query,
                    error = %e,
                    "Query is not a valid pattern, matching as text"
                );
                NameQuery::Substring(query.to_lowercase())
            }
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameQuery::Pattern(regex) => regex.is_match(name),
            NameQuery::Substring(needle) => name.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Compiled [`FilterCriteria`], evaluated against a fixed "now".
#[derive(Debug, Clone)]
pub struct EntryFilter {
    category: Option<FileCategory>,
    date: Option<DateFilter>,
    query: Option<NameQuery>,
    now: DateTime<Local>,
}

impl EntryFilter {
    pub fn new(criteria: &FilterCriteria, now: DateTime<Local>) -> Self {
        Self {
            category: criteria.category,
            date: criteria.date,
            query: criteria
                .query
                .as_deref()
                .filter(|q| !q.is_empty())
                .map(NameQuery::new),
            now,
        }
    }

    /// Whether `entry` satisfies every constraint.
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        if let Some(category) = self.category {
            if entry.category != category {
                return false;
            }
        }
        if let Some(date) = self.date {
            if !date_matches(date, entry.modified, self.now) {
                return false;
            }
        }
        if let Some(query) = &self.query {
            if !query.matches(&entry.name) {
                return false;
            }
        }
        true
    }
}

fn date_matches(filter: DateFilter, modified: SystemTime, now: DateTime<Local>) -> bool {
    let modified: DateTime<Local> = DateTime::from(modified);
    match filter {
        DateFilter::Today => modified.date_naive() == now.date_naive(),
        DateFilter::Past7Days => modified >= now - Duration::days(7) && modified <= now,
        DateFilter::ThisMonth => modified.year() == now.year() && modified.month() == now.month(),
        DateFilter::ThisYear => modified.year() == now.year(),
        DateFilter::Range { from, to } => {
            let secs = modified.timestamp();
            // Bounds past i64::MAX saturate instead of wrapping negative.
            let bound = |b: u64| i64::try_from(b).unwrap_or(i64::MAX);
            from.is_none_or(|from| secs >= bound(from)) && to.is_none_or(|to| secs <= bound(to))
        }
    }
}

/// Value an entry is ordered by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Text(String),
    Time(SystemTime),
    Size(u64),
}

fn sort_value(entry: &DirectoryEntry, field: SortField) -> SortValue {
    match field {
        SortField::Name => SortValue::Text(entry.name.to_lowercase()),
        SortField::Date => SortValue::Time(entry.modified),
        SortField::Size => SortValue::Size(entry.size),
        SortField::Category => SortValue::Text(entry.category.label().to_lowercase()),
    }
}

/// Sort entries in place.
///
/// The sort is stable with the name as tie-break; descending order is the
/// exact reverse of ascending order.
pub fn sort_entries(entries: &mut [DirectoryEntry], key: SortKey) {
    entries.sort_by_cached_key(|e| {
        (
            sort_value(e, key.field),
            e.name.to_lowercase(),
            e.name.clone(),
        )
    });
    if key.order == SortOrder::Descending {
        entries.reverse();
    }
}

/// A page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number after clamping.
    pub number: usize,
    pub total_pages: usize,
    /// Slice of the sorted entries on this page.
    pub range: Range<usize>,
}

/// Select page `page` of `total` items.
///
/// Page 0 becomes page 1, pages past the end become the last page. There is
/// always at least one page.
pub fn paginate(total: usize, page: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_pages = total.div_ceil(page_size).max(1);
    let number = page.clamp(1, total_pages);
    let start = ((number - 1) * page_size).min(total);
    let end = (start + page_size).min(total);

    Page {
        number,
        total_pages,
        range: start..end,
    }
}
