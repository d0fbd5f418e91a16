use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::generate::generate_portrait,
        crate::handlers::quota::get_quota,
        crate::handlers::history::list_history,
        crate::handlers::history::delete_history,
        crate::handlers::payment::list_products,
        crate::handlers::payment::create_checkout,
        crate::handlers::payment::creem_webhook,
    ),
    components(
        schemas(
            crate::models::GenerateResponse,
            crate::models::QuotaResponse,
            crate::models::CheckoutRequest,
            crate::models::StyleType,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "generate", description = "Portrait generation"),
        (name = "quota", description = "Generation credits"),
        (name = "history", description = "Past generations"),
        (name = "payment", description = "Credit packs and checkout"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Silver Portrait Studio API",
        version = "0.1.0",
        description = "Stylised portrait generation with prepaid credits"
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

pub fn create_docs_router() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
