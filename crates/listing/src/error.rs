//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Request-level errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Store failures are logged with detail but reported vaguely
        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "internal server error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

/// Listing configuration errors.
///
/// These are raised while resolving listing definitions against the entity
/// schema at startup and are never handled per request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The listing refers to an entity type that is not declared.
    #[error("{context}: unknown entity type '{entity}'")]
    UnknownEntity { context: String, entity: String },

    /// A field path ends in a field the entity does not declare.
    #[error("entity '{entity}': unknown field '{field}' in path '{path}'")]
    UnknownField {
        entity: String,
        field: String,
        path: String,
    },

    /// A field path traverses a relation the entity does not declare.
    #[error("entity '{entity}': unknown relation '{relation}' in path '{path}'")]
    UnknownRelation {
        entity: String,
        relation: String,
        path: String,
    },

    /// A relation points at an entity type that is not declared.
    #[error("entity '{entity}': relation '{relation}' targets unknown entity '{target}'")]
    BrokenRelation {
        entity: String,
        relation: String,
        target: String,
    },

    /// A table or column name is not a plain SQL identifier.
    #[error("'{name}' is not a valid identifier")]
    InvalidIdentifier { name: String },

    /// A filter override names a field that is not facetable.
    #[error("listing '{listing}': filter override for non-facetable field '{field}'")]
    OverrideWithoutFacet { listing: String, field: String },

    /// Two facets flatten to the same request identifier, e.g. two fields
    /// of one relation both keyed by the relation's id.
    #[error("listing '{listing}': facet identifier '{identifier}' is used by more than one facet")]
    DuplicateFacetIdentifier { listing: String, identifier: String },

    /// The default page size is not one of the allowed sizes.
    #[error("listing '{listing}': default page size {size} is not in the allowed sizes")]
    DefaultPageSizeNotAllowed { listing: String, size: u32 },

    /// The allowed page sizes are empty or contain zero.
    #[error("listing '{listing}': allowed page sizes must be non-empty and positive")]
    InvalidPageSizes { listing: String },

    /// Two listings were registered with the same id.
    #[error("duplicate listing id '{listing}'")]
    DuplicateListing { listing: String },

    /// The definitions file could not be parsed.
    #[error("invalid listing definitions: {details}")]
    InvalidDefinitions { details: String },
}
