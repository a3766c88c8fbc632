//! Theme layer: Tera templates and their view models.

pub mod engine;
pub mod view;

pub use engine::ThemeEngine;
pub use view::{FilterControls, ItemView, ListingView, QueryParams};
