//! Faceted Listing Library
//!
//! Sortable, paginated listings over a relational entity store, with
//! keyword search and facet filters whose option counts follow the
//! current filter state. The `faceted-listing` binary serves them over
//! HTTP.

pub mod access;
pub mod cache;
pub mod config;
pub mod error;
pub mod listing;
pub mod routes;
pub mod state;
pub mod store;
pub mod theme;
