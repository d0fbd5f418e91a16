use serde::Serialize;
use utoipa::ToSchema;

use super::StyleType;

/// Uploaded source image as received at the boundary.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image: Option<ImagePayload>,
    pub style: StyleType,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub record_id: String,
    pub image_url: String,
    pub remaining_quota: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub record_id: String,
    pub image_url: String,
    pub style: StyleType,
    pub remaining_quota: u32,
}
