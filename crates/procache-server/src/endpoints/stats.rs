use axum::Json;
use axum::extract::State;
use procache::CacheStats;

use crate::service::ContentService;

pub async fn get_stats(State(service): State<ContentService>) -> Json<CacheStats> {
    Json(service.loader().stats().await)
}
