use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use procache_content::Document;

use crate::endpoints::ResponseError;
use crate::service::ContentService;

pub async fn get_content(
    State(service): State<ContentService>,
    Path(path): Path<String>,
) -> Result<Json<Arc<Document>>, ResponseError> {
    let document = service.loader().load(&path).await?;
    Ok(Json(document))
}
