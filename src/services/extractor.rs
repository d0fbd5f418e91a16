//! Pulls the generated image out of a provider reply.
//!
//! Providers disagree on where the image lives, so extraction is an ordered
//! chain of small strategies; the first one that recognises its shape wins.

use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    errors::{AppError, Result},
    utils::file::truncate_preview,
};

pub const PREVIEW_CHARS: usize = 200;

static DATA_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/_-]+={0,2})")
        .expect("data URL pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedImage {
    /// Base64 payload with its media type.
    Inline { mime_type: String, data: String },
    /// Directly usable pointer that still has to be fetched.
    Remote { url: String },
}

impl ExtractedImage {
    fn inline(mime_type: &str, data: &str) -> Self {
        ExtractedImage::Inline {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        }
    }
}

/// Decodes an inline payload, tolerating whitespace and the URL-safe alphabet.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(&compact)
        .or_else(|_| general_purpose::URL_SAFE.decode(&compact))
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(compact.trim_end_matches('=')))
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(compact.trim_end_matches('=')))
        .map_err(|e| AppError::MalformedProviderResponse(format!("image payload is not valid base64: {}", e)))
}

pub fn parse_data_url(value: &str) -> Option<ExtractedImage> {
    let (meta, payload) = value.trim().strip_prefix("data:")?.split_once(',')?;
    let mut meta = meta.split(';');
    let mime_type = meta.next().filter(|m| m.starts_with("image/"))?;
    if !meta.any(|p| p.eq_ignore_ascii_case("base64")) || payload.trim().is_empty() {
        return None;
    }
    Some(ExtractedImage::inline(mime_type, payload.trim()))
}

pub trait ImageExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspects `choices[0].message`.
    fn extract(&self, message: &Value) -> Option<ExtractedImage>;
}

fn content_parts(message: &Value) -> impl Iterator<Item = &Value> {
    let content = message.get("content").and_then(Value::as_array).into_iter().flatten();
    let images = message.get("images").and_then(Value::as_array).into_iter().flatten();
    content.chain(images)
}

fn inline_part(part: &Value, key: &str, mime_key: &str) -> Option<ExtractedImage> {
    let inline = part.get(key)?;
    let data = inline.get("data").and_then(Value::as_str)?.trim();
    if data.is_empty() {
        return None;
    }
    let mime_type = inline
        .get(mime_key)
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("image/png");
    Some(ExtractedImage::inline(mime_type, data))
}

/// `{"inline_data": {"mime_type": "image/png", "data": "..."}}`
pub struct InlineDataPart;

impl ImageExtractor for InlineDataPart {
    fn name(&self) -> &'static str {
        "inline_data"
    }

    fn extract(&self, message: &Value) -> Option<ExtractedImage> {
        content_parts(message).find_map(|part| inline_part(part, "inline_data", "mime_type"))
    }
}

/// `{"inlineData": {"mimeType": "image/png", "data": "..."}}`
pub struct CamelInlineDataPart;

impl ImageExtractor for CamelInlineDataPart {
    fn name(&self) -> &'static str {
        "inlineData"
    }

    fn extract(&self, message: &Value) -> Option<ExtractedImage> {
        content_parts(message).find_map(|part| inline_part(part, "inlineData", "mimeType"))
    }
}

/// `{"type": "image_url", "image_url": {"url": "..."}}`, where the url is
/// either a data URL or an http(s) pointer.
pub struct ImageUrlPart;

impl ImageExtractor for ImageUrlPart {
    fn name(&self) -> &'static str {
        "image_url"
    }

    fn extract(&self, message: &Value) -> Option<ExtractedImage> {
        content_parts(message).find_map(|part| {
            let wrapper = part.get("image_url")?;
            let url = wrapper
                .as_str()
                .or_else(|| wrapper.get("url").and_then(Value::as_str))?
                .trim();

            if url.starts_with("data:") {
                parse_data_url(url)
            } else if url.starts_with("https://") || url.starts_with("http://") {
                Some(ExtractedImage::Remote { url: url.to_string() })
            } else {
                None
            }
        })
    }
}

/// Last resort: a `data:image/...;base64,...` buried in text content.
pub struct EmbeddedDataUrl;

impl ImageExtractor for EmbeddedDataUrl {
    fn name(&self) -> &'static str {
        "embedded_data_url"
    }

    fn extract(&self, message: &Value) -> Option<ExtractedImage> {
        let plain = message.get("content").and_then(Value::as_str).into_iter();
        let texts = content_parts(message).filter_map(|part| part.get("text").and_then(Value::as_str));

        plain.chain(texts).find_map(|text| {
            let captures = DATA_URL_PATTERN.captures(text)?;
            Some(ExtractedImage::inline(&captures[1], &captures[2]))
        })
    }
}

pub struct ExtractionChain {
    extractors: Vec<Box<dyn ImageExtractor>>,
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self {
            extractors: vec![
                Box::new(InlineDataPart),
                Box::new(CamelInlineDataPart),
                Box::new(ImageUrlPart),
                Box::new(EmbeddedDataUrl),
            ],
        }
    }
}

impl ExtractionChain {
    pub fn new(extractors: Vec<Box<dyn ImageExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn extract(&self, message: &Value) -> Option<(&'static str, ExtractedImage)> {
        self.extractors
            .iter()
            .find_map(|extractor| extractor.extract(message).map(|image| (extractor.name(), image)))
    }

    /// Classifies a raw success body from the provider.
    pub fn classify(&self, body: &str) -> Result<ExtractedImage> {
        let response: Value = serde_json::from_str(body).map_err(|_| {
            AppError::MalformedProviderResponse(format!(
                "body is not JSON: {}",
                truncate_preview(body, PREVIEW_CHARS)
            ))
        })?;

        let choice = response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| {
                AppError::MalformedProviderResponse(format!(
                    "no choices in response: {}",
                    truncate_preview(body, PREVIEW_CHARS)
                ))
            })?;

        let message = choice
            .get("message")
            .filter(|m| m.is_object())
            .ok_or_else(|| AppError::MalformedProviderResponse("choice has no message".to_string()))?;

        match self.extract(message) {
            Some((name, image)) => {
                tracing::debug!(extractor = name, "Extracted image from provider response");
                Ok(image)
            }
            None => Err(AppError::NoImageReturned(message_preview(message))),
        }
    }
}

fn message_preview(message: &Value) -> String {
    let text = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => message.to_string(),
    };
    truncate_preview(&text, PREVIEW_CHARS)
}
