//! Facet aggregation.
//!
//! For every facetable field the aggregator counts matching rows grouped by
//! the field's grouping identifier, using every active filter except the
//! facet's own. Facets are queried concurrently; a failing facet yields an
//! empty option list and never affects the others.

use std::sync::Arc;

use tokio::task::JoinSet;

use super::definitions::{Facet, Listing};
use super::query::{FacetQuery, FacetRow, ListingQuery};
use super::types::{FacetOption, FacetOptions, FacetResultSet};
use crate::store::EntityStore;

/// Grouped count query for `facet`, built on the current filter state.
pub fn facet_query(base: &ListingQuery, facet: &Facet) -> FacetQuery {
    let mut query = base.without_facet(&facet.name);
    query.add_joins(&facet.field.joins);

    FacetQuery {
        facet: facet.name.clone(),
        base: query,
        group: facet.field.key.clone(),
        display: facet.field.column.clone(),
    }
}

/// Turn aggregated rows into options, dropping rows with no matches or an
/// empty key or title. Store order is kept.
pub fn options_from_rows(rows: Vec<FacetRow>) -> Vec<FacetOption> {
    rows.into_iter()
        .filter_map(|row| {
            FacetOption::from_aggregate(row.count, row.id.as_deref(), row.title.as_deref())
        })
        .collect()
}

/// Runs one aggregation per facet against a store.
pub struct FacetAggregator {
    store: Arc<dyn EntityStore>,
}

impl FacetAggregator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Compute options for every facet of `listing` under `base`.
    ///
    /// `base` is the filter-only query of the current request. The result
    /// keeps the configured facet order.
    pub async fn aggregate(&self, listing: &Listing, base: &ListingQuery) -> FacetResultSet {
        let mut tasks = JoinSet::new();

        for (index, facet) in listing.facets.iter().enumerate() {
            let store = Arc::clone(&self.store);
            let query = facet_query(base, facet);
            tasks.spawn(async move { (index, store.aggregate(&query).await) });
        }

        let mut results: Vec<Vec<FacetOption>> = vec![Vec::new(); listing.facets.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(rows))) => {
                    if let Some(slot) = results.get_mut(index) {
                        *slot = options_from_rows(rows);
                    }
                }
                Ok((index, Err(e))) => {
                    let facet = listing.facets.get(index).map(|f| f.name.as_str());
                    tracing::warn!(
                        listing = %listing.id,
                        facet = ?facet,
                        error = %format!("{e:#}"),
                        "facet aggregation failed; offering no options"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        listing = %listing.id,
                        error = %e,
                        "facet aggregation task did not complete"
                    );
                }
            }
        }

        FacetResultSet {
            facets: listing
                .facets
                .iter()
                .zip(results)
                .map(|(facet, options)| FacetOptions {
                    facet: facet.name.clone(),
                    identifier: facet.identifier.clone(),
                    options,
                })
                .collect(),
        }
    }
}
