use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{GenerateResponse, GenerationRequest, ImagePayload, StyleType},
};

const DEFAULT_LANG: &str = "zh";

/// Multipart fields: `image` (file), `type` (id | festival | memorial), `lang`.
#[utoipa::path(
    post,
    path = "/api/generate",
    tag = "generate",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "Fields: image, type, lang"),
    responses(
        (status = 200, description = "Generated portrait", body = GenerateResponse),
        (status = 400, description = "Missing or invalid image"),
        (status = 401, description = "Not signed in"),
        (status = 402, description = "No credits left"),
        (status = 413, description = "Image too large"),
        (status = 502, description = "Provider failed or returned no image"),
        (status = 504, description = "Provider timed out")
    ),
    security(("bearer" = []))
)]
pub async fn generate_portrait(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>> {
    let mut image = None;
    let mut style = None;
    let mut lang = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid multipart data: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read image: {}", e)))?;
                image = Some(ImagePayload {
                    bytes: bytes.to_vec(),
                    content_type,
                    file_name,
                });
            }
            Some("type") => style = Some(read_text(field).await?),
            Some("lang") => lang = Some(read_text(field).await?),
            _ => {}
        }
    }

    let style = StyleType::from_param(style.as_deref());
    let lang = lang
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LANG.to_string());

    let generated = state
        .generator
        .generate(&user.user_id, GenerationRequest { image, style, lang })
        .await?;

    Ok(Json(GenerateResponse {
        success: true,
        record_id: generated.record_id,
        image_url: generated.image_url,
        style,
        remaining_quota: generated.remaining_quota,
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid form field: {}", e)))
}
