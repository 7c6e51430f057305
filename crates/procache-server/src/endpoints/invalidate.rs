use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::endpoints::ResponseError;
use crate::service::ContentService;

#[derive(Debug, Deserialize)]
pub struct InvalidateParams {
    /// Evict only the document at this path instead of all documents.
    path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    invalidated: u64,
}

pub async fn invalidate(
    State(service): State<ContentService>,
    Query(params): Query<InvalidateParams>,
) -> Result<Json<InvalidateResponse>, ResponseError> {
    if !service.development() {
        return Err((
            StatusCode::NOT_FOUND,
            "invalidation is only available in development mode",
        )
            .into());
    }

    let loader = service.loader();
    let invalidated = match params.path {
        Some(path) => u64::from(loader.invalidate(&path).await?),
        None => {
            let before = loader.stats().await.invalidations;
            loader.invalidate_all().await;
            loader.stats().await.invalidations - before
        }
    };

    tracing::info!(invalidated, "Invalidated content cache");
    Ok(Json(InvalidateResponse { invalidated }))
}
