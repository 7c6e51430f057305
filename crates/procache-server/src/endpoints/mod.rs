use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::service::ContentService;

mod content;
mod error;
mod invalidate;
mod stats;

pub use error::ResponseError;

use content::get_content as content;
use invalidate::invalidate;
use stats::get_stats as stats;

pub async fn healthcheck() -> &'static str {
    "ok"
}

pub fn create_app(service: ContentService) -> Router {
    // The layers here go "top to bottom" according to the reading order here.
    let layer = ServiceBuilder::new().layer(TraceLayer::new_for_http());
    Router::new()
        .route("/content/{*path}", get(content))
        .route("/stats", get(stats))
        .route("/invalidate", post(invalidate))
        .with_state(service)
        .layer(layer)
        // the healthcheck is last, as it will bypass all the middlewares
        .route("/healthcheck", get(healthcheck))
}
