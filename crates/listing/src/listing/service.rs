//! Listing service.
//!
//! Holds the registered listings and runs page, facet and item requests
//! against the entity store.

use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde_json::Value;

use super::definitions::Listing;
use super::facets::FacetAggregator;
use super::pager::{Pager, resolve_offset, resolve_page_size};
use super::query::ColumnRef;
use super::query_builder::{ListingQueryBuilder, filter_query, page_query};
use super::sort::resolve_sort;
use super::types::{FacetResultSet, FilterRequest, ListingPage, Sort};
use crate::access::ItemAccess;
use crate::error::{AppError, AppResult, ConfigError};
use crate::store::EntityStore;

/// Sort and paging for one request, after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub sort: Sort,
    pub page_size: u32,
    pub offset: u64,
}

impl ResolvedRequest {
    /// Normalize the raw sort and paging parameters against the listing.
    pub fn resolve(listing: &Listing, request: &FilterRequest) -> Self {
        Self {
            sort: resolve_sort(
                request.sort.as_deref(),
                request.direction.as_deref(),
                &listing.sortable_fields,
                &listing.default_sort,
            ),
            page_size: resolve_page_size(
                request.page_size.as_deref(),
                &listing.allowed_page_sizes,
                listing.default_page_size,
            ),
            offset: resolve_offset(request.start.as_deref()),
        }
    }
}

/// Service for executing listing requests.
pub struct ListingService {
    store: Arc<dyn EntityStore>,
    aggregator: FacetAggregator,
    listings: DashMap<String, Arc<Listing>>,
}

impl ListingService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            aggregator: FacetAggregator::new(Arc::clone(&store)),
            store,
            listings: DashMap::new(),
        }
    }

    /// Register a resolved listing.
    pub fn register(&self, listing: Listing) -> Result<(), ConfigError> {
        if self.listings.contains_key(&listing.id) {
            return Err(ConfigError::DuplicateListing {
                listing: listing.id.clone(),
            });
        }
        tracing::info!(
            listing = %listing.id,
            item_type = %listing.item_type,
            facets = listing.facets.len(),
            "registered listing"
        );
        self.listings.insert(listing.id.clone(), Arc::new(listing));
        Ok(())
    }

    /// Get a listing by id.
    pub fn get(&self, id: &str) -> Option<Arc<Listing>> {
        self.listings.get(id).map(|l| Arc::clone(l.value()))
    }

    /// All registered listings, ordered by id.
    pub fn list(&self) -> Vec<Arc<Listing>> {
        let mut listings: Vec<_> = self
            .listings
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        listings.sort_by(|a, b| a.id.cmp(&b.id));
        listings
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Execute one page of a listing.
    ///
    /// Rows and total count are fetched concurrently; a failure of either
    /// fails the request.
    pub async fn page(&self, listing: &Listing, request: &FilterRequest) -> Result<ListingPage> {
        let resolved = ResolvedRequest::resolve(listing, request);
        let query = page_query(
            listing,
            request,
            &resolved.sort,
            resolved.offset,
            resolved.page_size,
        );
        let count_query = query.filter_only();

        let (rows, total) = tokio::try_join!(
            self.store.fetch_page(&query),
            self.store.count(&count_query),
        )
        .with_context(|| format!("failed to execute listing '{}'", listing.id))?;

        Ok(ListingPage {
            rows,
            sort: resolved.sort,
            pager: Pager::new(resolved.offset, u64::from(resolved.page_size), total),
        })
    }

    /// Facet options consistent with the request's filters.
    ///
    /// Sort and paging parameters play no part. Individual facet failures
    /// are contained by the aggregator.
    pub async fn facets(&self, listing: &Listing, request: &FilterRequest) -> FacetResultSet {
        let base = filter_query(listing, request);
        self.aggregator.aggregate(listing, &base).await
    }

    /// Facet options with no filters applied.
    pub async fn unfiltered_facets(&self, listing: &Listing) -> FacetResultSet {
        self.facets(listing, &FilterRequest::default()).await
    }

    /// Load one item for display.
    ///
    /// The id must be all digits (400), must exist (404) and must pass the
    /// listing's access gate (403).
    pub async fn item(&self, listing: &Listing, raw_id: &str) -> AppResult<Value> {
        if raw_id.is_empty() || !raw_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::BadRequest("invalid item id".to_string()));
        }
        let Ok(id) = raw_id.parse::<i64>() else {
            return Err(AppError::NotFound);
        };

        let query = ListingQueryBuilder::new(listing).build();
        let id_column = ColumnRef::new(&listing.table, &listing.id_column);
        let item = self
            .store
            .find_by_id(&query, &id_column, id)
            .await
            .with_context(|| format!("failed to load {} {id}", listing.item_type))?
            .ok_or(AppError::NotFound)?;

        if !listing.access.can_view(&item) {
            tracing::info!(listing = %listing.id, id, "item view denied");
            return Err(AppError::Forbidden);
        }

        Ok(item)
    }
}
