//! Faceted listing engine.
//!
//! Turns a declarative listing configuration plus raw request parameters
//! into store queries, and computes live facet options for the current
//! filter state.

pub mod definitions;
pub mod facets;
pub mod filter;
pub mod pager;
pub mod query;
pub mod query_builder;
pub mod schema;
pub mod service;
pub mod sort;
pub mod sync;
pub mod types;

pub use definitions::{Facet, Listing, ListingColumn, ListingDefinitions};
pub use facets::FacetAggregator;
pub use filter::{CustomPredicate, FilterKind};
pub use pager::Pager;
pub use service::{ListingService, ResolvedRequest};
pub use sync::{FacetPayload, OptionList, SelectOption};
pub use types::{
    FacetOption, FacetOptions, FacetResultSet, FilterRequest, ListingPage, Sort, SortDirection,
};
