use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
};

#[utoipa::path(
    get,
    path = "/api/history",
    tag = "history",
    responses(
        (status = 200, description = "Caller's generation records, newest first"),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer" = []))
)]
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let records = state.history.list(&user.user_id).await?;
    Ok(Json(json!({ "success": true, "history": records })))
}

#[utoipa::path(
    delete,
    path = "/api/history/{id}",
    tag = "history",
    params(("id" = String, Path, description = "History record id")),
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "No such record for this user")
    ),
    security(("bearer" = []))
)]
pub async fn delete_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let record = state
        .history
        .remove(&user.user_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("History record".to_string()))?;

    // The record is gone either way; a leftover image is only wasted space.
    if let Some(key) = record
        .outcome
        .generated_url()
        .and_then(|url| state.store.key_for_url(url))
    {
        if let Err(e) = state.store.delete(&key).await {
            warn!(user_id = %user.user_id, key, error = %e, "Failed to delete generated image");
        }
    }

    info!(user_id = %user.user_id, record_id = %id, "Deleted history record");
    Ok(Json(json!({
        "success": true,
        "message": "History record deleted"
    })))
}
