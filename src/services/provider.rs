use reqwest::{Client, Url};
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    config::ProviderConfig,
    errors::{AppError, Result},
    services::extractor::PREVIEW_CHARS,
    utils::file::truncate_preview,
};

/// Client for the multimodal image model (OpenAI-compatible chat endpoint).
///
/// Deadlines are enforced by the caller; this type only knows how to talk
/// to the provider.
pub struct ProviderClient {
    client: Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Sends one generation request and returns the raw success body.
    pub async fn generate(&self, prompt: &str, image_ref: &str) -> Result<String> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| AppError::Provider {
            status: None,
            message: "Image provider API key is not configured".to_string(),
        })?;

        let url = format!("{}/v1/chat/completions", self.config.api_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image_ref } }
                ]
            }],
            "modalities": ["text", "image"],
            "size": self.config.output_size,
        });

        debug!(model = %self.config.model, "Calling image provider");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Provider {
                status: None,
                message: format!("Provider request failed: {}", network_reason(&e)),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AppError::Provider {
            status: Some(status.as_u16()),
            message: format!("Failed to read provider response: {}", network_reason(&e)),
        })?;

        debug!(
            status = status.as_u16(),
            preview = %truncate_preview(&body, PREVIEW_CHARS),
            "Provider responded"
        );

        if !status.is_success() {
            warn!(status = status.as_u16(), "Provider returned error status");
            return Err(AppError::Provider {
                status: Some(status.as_u16()),
                message: truncate_preview(&body, PREVIEW_CHARS),
            });
        }

        Ok(body)
    }

    /// Downloads an image the provider pointed at instead of inlining it.
    ///
    /// The body is read in chunks and abandoned once it passes
    /// `max_image_bytes`. Links to loopback, private or link-local hosts are
    /// refused unless `allow_private_image_hosts` is set.
    pub async fn fetch_image(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let parsed = Url::parse(url).map_err(|_| AppError::NoImageReturned(format!(
            "provider image link is not a valid URL: {}",
            truncate_preview(url, PREVIEW_CHARS)
        )))?;
        if !self.config.allow_private_image_hosts && is_internal_host(&parsed) {
            warn!(host = parsed.host_str().unwrap_or_default(), "Refusing provider image link to internal host");
            return Err(AppError::Provider {
                status: None,
                message: "Provider image link points at an internal address".to_string(),
            });
        }

        let limit = self.config.max_image_bytes;
        let too_large = || AppError::Provider {
            status: None,
            message: format!("Generated image exceeds {} bytes", limit),
        };

        let mut response = self.client.get(parsed).send().await.map_err(|e| AppError::Provider {
            status: None,
            message: format!("Failed to download generated image: {}", network_reason(&e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Provider {
                status: Some(status.as_u16()),
                message: "Failed to download generated image".to_string(),
            });
        }

        if response.content_length().map_or(false, |len| len > limit as u64) {
            return Err(too_large());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| AppError::Provider {
            status: Some(status.as_u16()),
            message: format!("Failed to read generated image: {}", network_reason(&e)),
        })? {
            if bytes.len() + chunk.len() > limit {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok((bytes, content_type))
    }
}

fn is_internal_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") || host.to_ascii_lowercase().ends_with(".localhost") {
        return true;
    }

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => is_internal_v4(ip),
        Ok(IpAddr::V6(ip)) => {
            let first = ip.segments()[0];
            ip.is_loopback()
                || ip.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || ip.to_ipv4_mapped().map_or(false, is_internal_v4)
        }
        Err(_) => false,
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast()
}

fn network_reason(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_decode() || error.is_body() {
        "body could not be read"
    } else {
        "network error"
    }
}
