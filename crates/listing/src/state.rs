//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::FormCache;
use crate::config::Config;
use crate::listing::{ListingDefinitions, ListingService};
use crate::store::{EntityStore, MemoryStore, PgStore};
use crate::theme::ThemeEngine;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Registered listings and the store they query.
    listings: ListingService,

    /// Cache of rendered filter forms.
    form_cache: FormCache,

    /// Template engine.
    theme: ThemeEngine,
}

impl AppState {
    /// Build state from configuration: open the store and load listings.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn EntityStore> = match (&config.database_url, &config.memory_seed_path)
        {
            (Some(url), _) => Arc::new(
                PgStore::connect(
                    url,
                    config.database_max_connections,
                    config.statement_timeout,
                )
                .await?,
            ),
            (None, Some(path)) => Arc::new(MemoryStore::from_seed_file(path)?),
            (None, None) => {
                warn!("neither DATABASE_URL nor MEMORY_SEED_PATH set, using an empty store");
                Arc::new(MemoryStore::new())
            }
        };
        info!(store = store.name(), "entity store ready");

        let definitions = ListingDefinitions::load(&config.listings_path)?;

        Self::from_parts(store, &definitions, FormCache::new(config.form_cache_ttl))
    }

    /// Build state from an already-open store and parsed definitions.
    pub fn from_parts(
        store: Arc<dyn EntityStore>,
        definitions: &ListingDefinitions,
        form_cache: FormCache,
    ) -> Result<Self> {
        let listings = ListingService::new(store);
        for listing in definitions
            .resolve()
            .context("invalid listing definitions")?
        {
            listings
                .register(listing)
                .context("failed to register listing")?;
        }

        let theme = ThemeEngine::new().context("failed to initialize theme engine")?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                listings,
                form_cache,
                theme,
            }),
        })
    }

    /// Get the listing service.
    pub fn listings(&self) -> &ListingService {
        &self.inner.listings
    }

    /// Get the filter form cache.
    pub fn form_cache(&self) -> &FormCache {
        &self.inner.form_cache
    }

    /// Get the theme engine.
    pub fn theme(&self) -> &ThemeEngine {
        &self.inner.theme
    }

    /// Check if the entity store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.listings.store().ping().await.is_ok()
    }
}
