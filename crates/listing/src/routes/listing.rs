//! Listing routes.
//!
//! Page rendering, the facet-refresh endpoint, item views and form cache
//! invalidation.

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, RawQuery, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::listing::types::FLUSH_PARAM;
use crate::listing::{FacetPayload, FilterRequest, Listing};
use crate::state::AppState;
use crate::theme::view::{FilterControls, ItemView, ListingView, QueryParams, listing_path};

/// Create the listing router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listings", get(list_listings))
        .route("/listings/{listing}", get(render_listing))
        .route("/listings/{listing}/facets", get(refresh_facets))
        .route("/listings/{listing}/flush", post(flush_form))
        .route("/listings/{listing}/{item_id}", get(render_item))
}

#[derive(Serialize)]
struct ListingSummary {
    id: String,
    title: String,
    item_type: String,
    link: String,
    facets: Vec<String>,
}

fn find_listing(state: &AppState, listing_id: &str) -> AppResult<std::sync::Arc<Listing>> {
    state.listings().get(listing_id).ok_or(AppError::NotFound)
}

fn parse_request(params: &QueryParams) -> FilterRequest {
    FilterRequest::from_query_pairs(
        params
            .pairs()
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    )
}

async fn list_listings(State(state): State<AppState>) -> Json<Vec<ListingSummary>> {
    Json(
        state
            .listings()
            .list()
            .into_iter()
            .map(|listing| ListingSummary {
                link: listing_path(&listing.id),
                id: listing.id.clone(),
                title: listing.title.clone(),
                item_type: listing.item_type.clone(),
                facets: listing
                    .facets
                    .iter()
                    .map(|facet| facet.identifier.clone())
                    .collect(),
            })
            .collect(),
    )
}

async fn render_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
    RawQuery(query): RawQuery,
) -> AppResult<Html<String>> {
    let listing = find_listing(&state, &listing_id)?;
    let params = QueryParams::parse(query.as_deref());
    let request = parse_request(&params);
    let service = state.listings();

    let page = service.page(&listing, &request).await?;

    let (filter_controls, facets_json) = if request.has_filters() {
        let (originals, current) = tokio::join!(
            service.unfiltered_facets(&listing),
            service.facets(&listing, &request),
        );
        let controls = FilterControls::filtered(&listing, &originals, &request, &current)
            .context("failed to build filter controls")?;
        let html = state.theme().render_filter_controls(&controls)?;
        let json = FacetPayload(&current)
            .to_script_json()
            .context("failed to serialize facet payload")?;
        (html, Some(json))
    } else {
        let listing_ref: &Listing = &listing;
        let theme = state.theme();
        let html = state
            .form_cache()
            .get_or_render(&listing.id, request.flush, move || async move {
                let originals = service.unfiltered_facets(listing_ref).await;
                let controls = FilterControls::initial(listing_ref, &originals)
                    .context("failed to build filter controls")?;
                theme.render_filter_controls(&controls)
            })
            .await?;
        (html, None)
    };

    let view = ListingView::build(
        &listing,
        &page,
        &request,
        &params.without(FLUSH_PARAM),
        filter_controls,
        facets_json,
    );
    let html = state.theme().render_listing(&view)?;

    Ok(Html(html))
}

async fn refresh_facets(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
    RawQuery(query): RawQuery,
) -> AppResult<Response> {
    let listing = find_listing(&state, &listing_id)?;
    let request = parse_request(&QueryParams::parse(query.as_deref()));

    let facets = state.listings().facets(&listing, &request).await;
    let body = serde_json::to_string(&FacetPayload(&facets))
        .context("failed to serialize facet payload")?;

    debug!(listing = %listing.id, facets = facets.facets.len(), "facet refresh");

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn render_item(
    State(state): State<AppState>,
    Path((listing_id, item_id)): Path<(String, String)>,
) -> AppResult<Html<String>> {
    let listing = find_listing(&state, &listing_id)?;
    let item = state.listings().item(&listing, &item_id).await?;

    let view = ItemView::build(&listing, &item);
    let html = state.theme().render_item(&view)?;

    Ok(Html(html))
}

async fn flush_form(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> AppResult<StatusCode> {
    let listing = find_listing(&state, &listing_id)?;
    state.form_cache().invalidate(&listing.id).await;
    Ok(StatusCode::NO_CONTENT)
}
