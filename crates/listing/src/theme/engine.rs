//! Theme engine with embedded Tera templates.

use anyhow::{Context, Result};
use tera::Tera;
use tracing::debug;

use super::view::{FilterControls, ItemView, ListingView};

const LISTING_TEMPLATE: &str = "listing.html";
const FILTER_FORM_TEMPLATE: &str = "filter_form.html";
const ITEM_TEMPLATE: &str = "item.html";

/// Theme engine for rendering listing pages.
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Create a theme engine with the built-in templates.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (
                LISTING_TEMPLATE,
                include_str!("../../templates/listing.html"),
            ),
            (
                FILTER_FORM_TEMPLATE,
                include_str!("../../templates/filter_form.html"),
            ),
            (ITEM_TEMPLATE, include_str!("../../templates/item.html")),
        ])
        .context("failed to initialize Tera templates")?;

        let template_names: Vec<_> = tera.get_template_names().collect();
        debug!(count = template_names.len(), "loaded templates");

        Ok(Self { tera })
    }

    /// Render the facet and keyword controls of the filter form.
    pub fn render_filter_controls(&self, controls: &FilterControls) -> Result<String> {
        self.render(FILTER_FORM_TEMPLATE, controls)
    }

    /// Render a listing page.
    pub fn render_listing(&self, view: &ListingView) -> Result<String> {
        self.render(LISTING_TEMPLATE, view)
    }

    /// Render an item page.
    pub fn render_item(&self, view: &ItemView) -> Result<String> {
        self.render(ITEM_TEMPLATE, view)
    }

    fn render<T: serde::Serialize>(&self, template: &str, view: &T) -> Result<String> {
        let context =
            tera::Context::from_serialize(view).context("failed to build template context")?;
        self.tera
            .render(template, &context)
            .with_context(|| format!("failed to render {template}"))
    }
}

impl std::fmt::Debug for ThemeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeEngine")
            .field("templates", &self.tera.get_template_names().count())
            .finish()
    }
}
