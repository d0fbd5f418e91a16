use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::json;

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{CheckoutRequest, CheckoutResponse, QUOTA_PRODUCTS},
    services::{WebhookOutcome, SIGNATURE_HEADER},
};

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "payment",
    responses((status = 200, description = "Credit packs on sale"))
)]
pub async fn list_products() -> Json<serde_json::Value> {
    Json(json!({ "products": QUOTA_PRODUCTS }))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    tag = "payment",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Hosted checkout created"),
        (status = 400, description = "Missing product id"),
        (status = 404, description = "Unknown product"),
        (status = 502, description = "Payment provider failed")
    ),
    security(("bearer" = []))
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let checkout = state
        .payments
        .create_checkout(&user.user_id, request.product_id.as_deref())
        .await?;
    Ok(Json(checkout))
}

/// Signature is checked over the raw body, before any parsing.
#[utoipa::path(
    post,
    path = "/api/webhooks/creem",
    tag = "payment",
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 401, description = "Bad signature")
    )
)]
pub async fn creem_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let response = match state.payments.handle_webhook(&body, signature).await? {
        WebhookOutcome::Credited { amount, remaining, .. } => json!({
            "success": true,
            "message": format!("Added {} credits", amount),
            "remaining": remaining,
        }),
        WebhookOutcome::Ignored { .. } => json!({
            "success": true,
            "message": "Event ignored",
        }),
    };

    Ok(Json(response))
}
