//! Offset based pagination shared by every resource listing.

use std::cmp::Ordering;

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::bookkeeping::domain::{PopulatePath, Resource};

pub const DEFAULT_LIMIT: i64 = 10;
pub const DEFAULT_PAGE: i64 = 1;

/// Pagination parameters as provided in a query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// Comma separated `field:asc` or `field:desc` keys.
    pub sort_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Error, Eq, PartialEq)]
#[error("cannot sort by {0:?}")]
pub struct InvalidSort(pub String);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortKey {
    pub field: &'static str,
    pub descending: bool,
}

impl SortKey {
    /// Parse a comma separated list of sort keys, only accepting fields from
    /// `sortable`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use bookkeeping_api::pagination::SortKey;
    /// let keys = SortKey::parse_list("year:desc,month", &["month", "year"]).unwrap();
    ///
    /// assert_eq!("year", keys[0].field);
    /// assert!(keys[0].descending);
    /// assert!(!keys[1].descending);
    /// assert!(SortKey::parse_list("owner:asc", &["month"]).is_err());
    /// ```
    pub fn parse_list(
        raw: &str,
        sortable: &'static [&'static str],
    ) -> Result<Vec<Self>, InvalidSort> {
        raw.split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| Self::parse(key, sortable))
            .collect()
    }

    fn parse(raw: &str, sortable: &'static [&'static str]) -> Result<Self, InvalidSort> {
        let (name, direction) = match raw.split_once(':') {
            Some((name, direction)) => (name.trim(), direction.trim()),
            None => (raw, "asc"),
        };

        let descending = match direction.to_ascii_lowercase().as_str() {
            "asc" => false,
            "desc" => true,
            _ => return Err(InvalidSort(raw.to_owned())),
        };

        let field = sortable
            .iter()
            .copied()
            .find(|field| *field == name)
            .ok_or_else(|| InvalidSort(raw.to_owned()))?;

        Ok(Self { field, descending })
    }
}

/// Names used for the keys of a serialized [`PageResult`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageLabels {
    pub results: &'static str,
    pub page: &'static str,
    pub limit: &'static str,
    pub total_pages: &'static str,
    pub total_results: &'static str,
    pub has_next_page: &'static str,
    pub has_prev_page: &'static str,
    pub next_page: &'static str,
    pub prev_page: &'static str,
    pub offset: &'static str,
    pub paging_counter: &'static str,
}

impl Default for PageLabels {
    fn default() -> Self {
        Self {
            results: "results",
            page: "page",
            limit: "limit",
            total_pages: "totalPages",
            total_results: "totalResults",
            has_next_page: "hasNextPage",
            has_prev_page: "hasPrevPage",
            next_page: "nextPage",
            prev_page: "prevPage",
            offset: "offset",
            paging_counter: "pagingCounter",
        }
    }
}

/// Fully resolved pagination options.
#[derive(Clone, Debug, PartialEq)]
pub struct PageOptions {
    pub sort: Vec<SortKey>,
    pub limit: i64,
    pub page: i64,
    pub populate: Vec<PopulatePath>,
    pub labels: PageLabels,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            sort: vec![],
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
            populate: vec![],
            labels: PageLabels::default(),
        }
    }
}

impl PageOptions {
    /// Resolve query parameters against the sortable fields of a resource.
    /// Missing or non-positive limits and pages fall back to their defaults.
    pub fn from_query(
        query: PageQuery,
        sortable: &'static [&'static str],
    ) -> Result<Self, InvalidSort> {
        let sort = match query.sort_by.as_deref() {
            Some(raw) => SortKey::parse_list(raw, sortable)?,
            None => vec![],
        };

        Ok(Self {
            sort,
            limit: query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT),
            page: query.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            ..Default::default()
        })
    }

    pub fn with_populate(mut self, populate: Vec<PopulatePath>) -> Self {
        self.populate = populate;
        self
    }

    pub fn with_labels(mut self, labels: PageLabels) -> Self {
        self.labels = labels;
        self
    }

    /// The number of results skipped before the requested page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// A single page of results along with the information needed to fetch the
/// surrounding pages.
#[derive(Clone, Debug, PartialEq)]
pub struct PageResult<T> {
    pub results: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_results: i64,
    pub labels: PageLabels,
}

impl<T> PageResult<T> {
    pub fn new(results: Vec<T>, total_results: i64, options: &PageOptions) -> Self {
        Self {
            results,
            page: options.page,
            limit: options.limit,
            total_results,
            labels: options.labels,
        }
    }

    pub fn total_pages(&self) -> i64 {
        self.total_results / self.limit + i64::from(self.total_results % self.limit != 0)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev_page(&self) -> bool {
        self.page > 1
    }

    /// The 1-based position of the first result on this page.
    pub fn paging_counter(&self) -> i64 {
        self.offset().saturating_add(1)
    }

    pub fn next_page(&self) -> Option<i64> {
        self.has_next_page().then(|| self.page + 1)
    }

    pub fn prev_page(&self) -> Option<i64> {
        self.has_prev_page().then(|| self.page - 1)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PageResult<U> {
        PageResult {
            results: self.results.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total_results: self.total_results,
            labels: self.labels,
        }
    }
}

impl<T: Serialize> Serialize for PageResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let labels = &self.labels;
        let mut map = serializer.serialize_map(Some(11))?;

        map.serialize_entry(labels.results, &self.results)?;
        map.serialize_entry(labels.page, &self.page)?;
        map.serialize_entry(labels.limit, &self.limit)?;
        map.serialize_entry(labels.total_pages, &self.total_pages())?;
        map.serialize_entry(labels.total_results, &self.total_results)?;
        map.serialize_entry(labels.has_next_page, &self.has_next_page())?;
        map.serialize_entry(labels.has_prev_page, &self.has_prev_page())?;
        map.serialize_entry(labels.next_page, &self.next_page())?;
        map.serialize_entry(labels.prev_page, &self.prev_page())?;
        map.serialize_entry(labels.offset, &self.offset())?;
        map.serialize_entry(labels.paging_counter, &self.paging_counter())?;

        map.end()
    }
}

/// Sort and slice records that already match a query.
///
/// Sorting is stable, so records that compare equal on every key keep the
/// order they were given in.
pub fn paginate<R: Resource>(mut records: Vec<R>, options: &PageOptions) -> PageResult<R> {
    let total_results = records.len() as i64;

    if !options.sort.is_empty() {
        records.sort_by(|a, b| compare(a, b, &options.sort));
    }

    let offset = usize::try_from(options.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(options.limit).unwrap_or(usize::MAX);
    let results = records.into_iter().skip(offset).take(limit).collect();

    PageResult::new(results, total_results, options)
}

fn compare<R: Resource>(a: &R, b: &R, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = a
            .field(key.field)
            .partial_cmp(&b.field(key.field))
            .unwrap_or(Ordering::Equal);
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
