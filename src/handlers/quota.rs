use axum::{extract::State, Json};

use crate::{
    errors::Result, handlers::AppState, middleware::AuthenticatedUser, models::QuotaResponse,
};

/// First call for a user creates their record with the free credits.
#[utoipa::path(
    get,
    path = "/api/quota",
    tag = "quota",
    responses(
        (status = 200, description = "Caller's credit counters", body = QuotaResponse),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer" = []))
)]
pub async fn get_quota(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<QuotaResponse>> {
    let record = state.quota.get_or_init(&user.user_id).await?;
    Ok(Json(QuotaResponse::from(&record)))
}
