//! Listing engine types.
//!
//! Provides the per-request and per-response values passed between the
//! resolvers, the query builder and the facet aggregator:
//! - FilterRequest: raw user parameters for one call
//! - FacetOption / FacetResultSet: aggregated facet values with counts
//! - ListingPage: one page of results plus paging metadata

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::pager::Pager;

/// Request parameter carrying the keyword search.
pub const KEYWORDS_PARAM: &str = "Keywords";

/// Reserved request parameter that bypasses the form cache.
pub const FLUSH_PARAM: &str = "flush";

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved (field, direction) ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Raw parameters of one listing, filter or facet-refresh call.
///
/// Nothing here is validated yet; the sort and pagination resolvers
/// normalize the raw strings against the listing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRequest {
    /// Field identifier (`color`, `maker__id`) → selected value. Absent or
    /// blank means "any".
    pub facet_values: BTreeMap<String, String>,
    pub keywords: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub page_size: Option<String>,
    pub start: Option<String>,
    /// Forces the form cache to recompute.
    pub flush: bool,
}

impl FilterRequest {
    /// Build a request from decoded query parameters.
    ///
    /// `sort`, `dir`, `perpage`, `start`, `Keywords` and `flush` are
    /// reserved; every other key is taken as a facet identifier. For
    /// repeated keys the last value wins.
    pub fn from_query_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request = Self::default();
        for (key, value) in pairs {
            match key {
                "sort" => request.sort = Some(value.to_string()),
                "dir" => request.direction = Some(value.to_string()),
                "perpage" => request.page_size = Some(value.to_string()),
                "start" => request.start = Some(value.to_string()),
                KEYWORDS_PARAM => request.keywords = Some(value.to_string()),
                FLUSH_PARAM => request.flush = !value.is_empty() && value != "0",
                facet => {
                    request
                        .facet_values
                        .insert(facet.to_string(), value.to_string());
                }
            }
        }
        request
    }

    /// Select a value for a facet by its field identifier.
    pub fn with_facet(mut self, facet: impl Into<String>, value: impl Into<String>) -> Self {
        self.facet_values.insert(facet.into(), value.into());
        self
    }

    /// Set the keyword search.
    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    /// Selected value for a facet, ignoring blank selections.
    pub fn facet_value(&self, facet: &str) -> Option<&str> {
        self.facet_values
            .get(facet)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Keywords, ignoring blank input.
    pub fn keywords(&self) -> Option<&str> {
        self.keywords
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Whether any facet selection or keyword narrows the result set.
    pub fn has_filters(&self) -> bool {
        self.keywords().is_some()
            || self
                .facet_values
                .keys()
                .any(|facet| self.facet_value(facet).is_some())
    }
}

/// A single selectable facet value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetOption {
    /// Underlying key (relation id or scalar value).
    pub value: String,
    /// Display label annotated with the match count, e.g. `Blue (12)`.
    pub label: String,
    pub count: u64,
}

impl FacetOption {
    /// Build an option from an aggregated row, or `None` for rows that
    /// must never be offered (no matches, empty key or empty title).
    pub fn from_aggregate(count: i64, value: Option<&str>, title: Option<&str>) -> Option<Self> {
        let value = value.filter(|v| !v.is_empty())?;
        let title = title.filter(|t| !t.is_empty())?;
        let count = u64::try_from(count).ok().filter(|c| *c > 0)?;

        Some(Self {
            value: value.to_string(),
            label: format!("{title} ({count})"),
            count,
        })
    }
}

/// Options computed for one facet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetOptions {
    /// Facet name as configured (may be a relation path).
    pub facet: String,
    /// Flattened field identifier used by forms and the client.
    pub identifier: String,
    pub options: Vec<FacetOption>,
}

impl FacetOptions {
    /// Value → label map, as sent to the client.
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .map(|o| (o.value.clone(), o.label.clone()))
            .collect()
    }
}

/// Facet options for every facetable field of a listing, in configured order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetResultSet {
    pub facets: Vec<FacetOptions>,
}

impl FacetResultSet {
    /// Options for a facet by name.
    pub fn get(&self, facet: &str) -> Option<&FacetOptions> {
        self.facets.iter().find(|f| f.facet == facet)
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPage {
    /// Result rows as JSON objects.
    pub rows: Vec<serde_json::Value>,
    /// Effective ordering.
    pub sort: Sort,
    pub pager: Pager,
}
