//! Listing query builder.
//!
//! Composes a [`ListingQuery`] from a resolved listing and one request:
//! 1. base entity with the display columns the listing shows
//! 2. active facet filters, joins deduplicated
//! 3. keyword match over the fulltext fields, if the listing declares any
//! 4. ordering
//! 5. LIMIT/OFFSET window
//!
//! Each step is a separate method so it can be exercised on its own. The
//! builder only produces values; executing them is the store's job.

use super::definitions::Listing;
use super::query::{
    Condition, FacetConstraint, ListingQuery, Ordering, PageWindow, SelectedColumn,
};
use super::types::{FilterRequest, Sort};

/// Query builder for a single listing.
pub struct ListingQueryBuilder<'a> {
    listing: &'a Listing,
    query: ListingQuery,
}

impl<'a> ListingQueryBuilder<'a> {
    /// Start from the listing's base entity.
    ///
    /// Columns reached through relations are selected under their field path
    /// so every result row carries the value of every listing column.
    pub fn new(listing: &'a Listing) -> Self {
        let mut query = ListingQuery::new(&listing.table);
        for column in &listing.columns {
            if column.field.is_relation() {
                query.add_joins(&column.field.joins);
                query.columns.push(SelectedColumn {
                    column: column.field.column.clone(),
                    alias: column.field.path.clone(),
                });
            }
        }
        Self { listing, query }
    }

    /// Constrain the query by every facet the request selects a value for.
    pub fn apply_facet_filters(mut self, request: &FilterRequest) -> Self {
        for facet in &self.listing.facets {
            let Some(value) = request.facet_value(&facet.identifier) else {
                continue;
            };
            let Some(condition) = facet.kind.apply(&facet.field.key, value) else {
                continue;
            };
            self.query.add_joins(&facet.field.joins);
            self.query.constraints.push(FacetConstraint {
                facet: facet.name.clone(),
                condition,
            });
        }
        self
    }

    /// Add the keyword match. A listing without fulltext fields never gets a
    /// text predicate, whatever the request says.
    pub fn apply_keywords(mut self, keywords: Option<&str>) -> Self {
        let keywords = keywords.map(str::trim).filter(|k| !k.is_empty());
        let Some(keywords) = keywords else {
            return self;
        };
        if self.listing.fulltext_fields.is_empty() {
            return self;
        }

        for field in &self.listing.fulltext_fields {
            self.query.add_joins(&field.joins);
        }
        self.query.text_match = Some(Condition::TextMatch {
            columns: self
                .listing
                .fulltext_fields
                .iter()
                .map(|f| f.column.clone())
                .collect(),
            keywords: keywords.to_string(),
        });
        self
    }

    /// Order by the resolved sort.
    pub fn apply_sort(mut self, sort: &Sort) -> Self {
        match self.listing.sort_fields.get(&sort.field) {
            Some(field) => {
                self.query.add_joins(&field.joins);
                self.query.order = Some(Ordering {
                    column: field.column.clone(),
                    direction: sort.direction,
                });
            }
            None => {
                tracing::warn!(
                    listing = %self.listing.id,
                    field = %sort.field,
                    "sort field has no resolved column; leaving results unordered"
                );
            }
        }
        self
    }

    /// Restrict to one page.
    pub fn apply_window(mut self, offset: u64, page_size: u32) -> Self {
        self.query.window = Some(PageWindow {
            limit: u64::from(page_size),
            offset,
        });
        self
    }

    pub fn build(self) -> ListingQuery {
        self.query
    }
}

/// Build the full page query for a request.
pub fn page_query(
    listing: &Listing,
    request: &FilterRequest,
    sort: &Sort,
    offset: u64,
    page_size: u32,
) -> ListingQuery {
    ListingQueryBuilder::new(listing)
        .apply_facet_filters(request)
        .apply_keywords(request.keywords())
        .apply_sort(sort)
        .apply_window(offset, page_size)
        .build()
}

/// Build the filter-only query (no columns, ordering or window) used for
/// counting and as the base of facet aggregation.
pub fn filter_query(listing: &Listing, request: &FilterRequest) -> ListingQuery {
    ListingQueryBuilder::new(listing)
        .apply_facet_filters(request)
        .apply_keywords(request.keywords())
        .build()
        .filter_only()
}
