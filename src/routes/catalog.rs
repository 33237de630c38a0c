use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::models::RefreshResponse;
use crate::AppState;

/// GET /api/catalog - Full published catalog
pub async fn get_catalog(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let Some(published) = state.catalog.current().await else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "Catalog not built yet" })),
        ));
    };

    let etag = format!("\"{}\"", published.revision);
    Ok(([(header::ETAG, etag)], Json(published)))
}

/// POST /api/catalog/refresh - Rebuild the catalog now
pub async fn refresh_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.catalog.refresh().await {
        Ok(published) => (
            StatusCode::OK,
            Json(RefreshResponse {
                success: true,
                revision: Some(published.revision.clone()),
                channels: published.snapshot.channels.len(),
                genres: published.snapshot.genres.len(),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Manual refresh failed: {:#}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(RefreshResponse {
                    success: false,
                    revision: None,
                    channels: 0,
                    genres: 0,
                    error: Some(format!("{:#}", e)),
                }),
            )
        }
    }
}
