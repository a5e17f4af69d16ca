//! Picture API routes.
//!
//! Thin handlers over [`PictureService`](crate::pictures::PictureService):
//! metadata lookup and listing, URL resolution (which may generate a
//! rendition), deletion and the administrative thumbnail flush.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use picforge_common::{Error, PictureId, PictureReference};
use picforge_db::models::PictureFilter;
use serde::Deserialize;

use super::AppContext;

/// Create picture-related routes.
pub fn picture_routes() -> Router<AppContext> {
    Router::new()
        .route("/pictures", get(list_pictures))
        .route("/pictures/:id", get(get_picture).delete(delete_picture))
        .route("/pictures/:id/url", get(get_picture_url))
        .route("/thumbs/clear", post(clear_thumbs))
        .route("/events/recent", get(recent_events))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub reference: Option<String>,
    pub object_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    /// Longest side of the rendition; defaults to the configured thumb size.
    pub size: Option<u32>,
    #[serde(default)]
    pub show_default: bool,
    /// Base URL overriding the backend's own.
    pub store_location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent")]
    pub limit: usize,
}

fn default_recent() -> usize {
    20
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn service_error(err: Error) -> Response {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) | Error::PathEscape(_) => StatusCode::BAD_REQUEST,
        Error::AlreadyExists(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Picture request failed: {}", err);
    }
    error_response(status, err.to_string())
}

fn parse_id(id: &str) -> Result<PictureId, Response> {
    id.parse::<PictureId>()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid picture ID"))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_pictures(State(ctx): State<AppContext>, Query(query): Query<ListQuery>) -> Response {
    let reference = match query.reference.as_deref().map(str::parse::<PictureReference>) {
        Some(Ok(reference)) => Some(reference),
        Some(Err(e)) => return service_error(e),
        None => None,
    };
    let filter = PictureFilter {
        reference,
        object_id: query.object_id,
        is_new: None,
        limit: query.limit,
        offset: query.offset,
    };

    match ctx.pictures.list_pictures(&filter) {
        Ok(pictures) => Json(pictures).into_response(),
        Err(e) => service_error(e),
    }
}

async fn get_picture(State(ctx): State<AppContext>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match ctx.pictures.get_picture(id) {
        Ok(Some(picture)) => Json(picture).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Picture not found"),
        Err(e) => service_error(e),
    }
}

/// Resolve a rendition URL, generating the rendition on first request.
async fn get_picture_url(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<UrlQuery>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let size = query.size.unwrap_or(ctx.config.media.default_thumb_size);

    match ctx
        .pictures
        .ensure_picture_url(id, size, query.show_default, query.store_location.as_deref())
        .await
    {
        Ok(Some(url)) => Json(serde_json::json!({ "id": id, "size": size, "url": url })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Picture not found"),
        Err(e) => service_error(e),
    }
}

async fn delete_picture(State(ctx): State<AppContext>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let picture = match ctx.pictures.get_picture(id) {
        Ok(Some(picture)) => picture,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Picture not found"),
        Err(e) => return service_error(e),
    };

    match ctx.pictures.delete_picture(&picture).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => service_error(e),
    }
}

async fn clear_thumbs(State(ctx): State<AppContext>) -> Response {
    match ctx.pictures.clear_thumbs().await {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(e) => service_error(e),
    }
}

async fn recent_events(State(ctx): State<AppContext>, Query(query): Query<RecentQuery>) -> impl IntoResponse {
    Json(ctx.pictures.events().recent_events(query.limit))
}
