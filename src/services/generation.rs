use chrono::Utc;
use image::ImageFormat;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    errors::{AppError, Result},
    models::{
        GeneratedImage, GenerationRequest, HistoryRecord, HistoryUpdate, ImagePayload,
        NewHistoryRecord, StyleType,
    },
    services::{
        extractor::{decode_payload, ExtractedImage, ExtractionChain},
        history_ledger::HistoryLedger,
        metrics::MetricsService,
        prompts::select_prompt,
        provider::ProviderClient,
        quota_ledger::QuotaLedger,
    },
    storage::DynObjectStore,
    utils::file::{generated_key, to_data_url, truncate_preview, upload_key},
};

const HISTORY_ERROR_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_upload_bytes: usize,
    pub store_originals: bool,
}

impl From<&Config> for GenerationSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            store_originals: config.store_originals,
        }
    }
}

/// Validated upload, ready to send.
struct SourceImage {
    bytes: Vec<u8>,
    mime_type: String,
}

/// Drives one generation attempt from upload to finalised ledgers.
///
/// Every attempt that passes validation and the quota gate leaves exactly one
/// history record behind. It is created as failed before the provider is
/// called and flipped to success only once the output is stored. Credits are
/// taken only on success.
pub struct GenerationService {
    store: DynObjectStore,
    quota: QuotaLedger,
    history: HistoryLedger,
    provider: ProviderClient,
    extractors: ExtractionChain,
    metrics: Arc<MetricsService>,
    settings: GenerationSettings,
}

impl GenerationService {
    pub fn new(
        store: DynObjectStore,
        quota: QuotaLedger,
        history: HistoryLedger,
        provider: ProviderClient,
        metrics: Arc<MetricsService>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            quota,
            history,
            provider,
            extractors: ExtractionChain::default(),
            metrics,
            settings,
        }
    }

    #[tracing::instrument(skip(self, request), fields(style = %request.style, lang = %request.lang))]
    pub async fn generate(&self, user_id: &str, request: GenerationRequest) -> Result<GeneratedImage> {
        let source = match self.validate(request.image) {
            Ok(source) => source,
            Err(e) => {
                self.metrics.record_generation(outcome_label(&e));
                return Err(e);
            }
        };

        if !self.quota.has(user_id).await? {
            info!(user_id, "Generation refused, no credits left");
            self.metrics.record_generation(outcome_label(&AppError::InsufficientQuota));
            return Err(AppError::InsufficientQuota);
        }

        let data_url = to_data_url(&source.mime_type, &source.bytes);
        let original_url = if self.settings.store_originals {
            let key = upload_key(user_id, Utc::now(), &source.mime_type);
            self.store.put(&key, source.bytes, &source.mime_type).await?
        } else {
            data_url.clone()
        };

        let record = self
            .history
            .append(
                user_id,
                NewHistoryRecord::pending(request.style, original_url, &request.lang),
            )
            .await?;

        let prompt = select_prompt(request.style, &request.lang);
        info!(user_id, record_id = %record.id, "Calling provider for generation");

        match self.produce(prompt, &data_url).await {
            Ok((bytes, mime_type)) => {
                self.finish_success(user_id, &record, request.style, bytes, mime_type)
                    .await
            }
            Err(e) => self.finish_failure(user_id, &record.id, e).await,
        }
    }

    fn validate(&self, image: Option<ImagePayload>) -> Result<SourceImage> {
        let image = image
            .filter(|image| !image.bytes.is_empty())
            .ok_or_else(|| AppError::InvalidInput("No image provided".to_string()))?;

        if image.bytes.len() > self.settings.max_upload_bytes {
            return Err(AppError::FileTooLarge {
                size: image.bytes.len(),
                limit: self.settings.max_upload_bytes,
            });
        }

        let declared = image
            .content_type
            .as_deref()
            .filter(|ct| ct.starts_with("image/"))
            .map(str::to_string);
        let mime_type = sniff_mime(&image.bytes)
            .map(str::to_string)
            .or(declared)
            .ok_or_else(|| AppError::InvalidInput("Uploaded file is not an image".to_string()))?;

        Ok(SourceImage {
            bytes: image.bytes,
            mime_type,
        })
    }

    /// Provider call plus any follow-up download, under one deadline.
    async fn produce(&self, prompt: &str, image_ref: &str) -> Result<(Vec<u8>, String)> {
        let deadline = self.provider.timeout();
        let _timer = self.metrics.start_provider_timer();

        tokio::time::timeout(deadline, self.call_provider(prompt, image_ref))
            .await
            .map_err(|_| AppError::ProviderTimeout(deadline))?
    }

    async fn call_provider(&self, prompt: &str, image_ref: &str) -> Result<(Vec<u8>, String)> {
        let body = self.provider.generate(prompt, image_ref).await?;

        match self.extractors.classify(&body)? {
            ExtractedImage::Inline { mime_type, data } => Ok((decode_payload(&data)?, mime_type)),
            ExtractedImage::Remote { url } => {
                let (bytes, content_type) = self.provider.fetch_image(&url).await?;
                if bytes.is_empty() {
                    return Err(AppError::NoImageReturned(
                        "provider image link returned an empty body".to_string(),
                    ));
                }
                let mime_type = sniff_mime(&bytes)
                    .map(str::to_string)
                    .or(content_type.filter(|ct| ct.starts_with("image/")))
                    .unwrap_or_else(|| "image/png".to_string());
                Ok((bytes, mime_type))
            }
        }
    }

    async fn finish_success(
        &self,
        user_id: &str,
        record: &HistoryRecord,
        style: StyleType,
        bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<GeneratedImage> {
        let key = generated_key(user_id, Utc::now(), style, &mime_type);
        let image_url = match self.store.put(&key, bytes, &mime_type).await {
            Ok(url) => url,
            Err(e) => return self.finish_failure(user_id, &record.id, e).await,
        };

        if !self
            .history
            .update(user_id, &record.id, HistoryUpdate::succeeded(image_url.clone()))
            .await?
        {
            warn!(user_id, record_id = %record.id, "History record vanished before success was recorded");
        }

        let deducted = self.quota.deduct(user_id).await?;
        if !deducted.ok {
            warn!(user_id, record_id = %record.id, "Generation succeeded but no credit was left to deduct");
        }

        self.metrics.record_generation("success");
        info!(user_id, record_id = %record.id, remaining = deducted.remaining, "Generation succeeded");

        Ok(GeneratedImage {
            record_id: record.id.clone(),
            image_url,
            remaining_quota: deducted.remaining,
        })
    }

    async fn finish_failure(&self, user_id: &str, record_id: &str, error: AppError) -> Result<GeneratedImage> {
        let message = truncate_preview(&error.history_message(), HISTORY_ERROR_CHARS);
        warn!(user_id, record_id, error = %message, "Generation failed");

        // The record was created as failed, so it stays correct even if this write fails.
        if let Err(e) = self
            .history
            .update(user_id, record_id, HistoryUpdate::failed(message))
            .await
        {
            error!(user_id, record_id, error = %e, "Failed to record generation failure");
        }

        self.metrics.record_generation(outcome_label(&error));
        Err(error)
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

fn outcome_label(error: &AppError) -> &'static str {
    match error {
        AppError::InvalidInput(_) | AppError::FileTooLarge { .. } => "invalid_input",
        AppError::InsufficientQuota => "insufficient_quota",
        AppError::Provider { .. } => "provider_error",
        AppError::ProviderTimeout(_) => "provider_timeout",
        AppError::MalformedProviderResponse(_) => "malformed_response",
        AppError::NoImageReturned(_) => "no_image",
        AppError::Storage(_) => "storage_error",
        _ => "internal_error",
    }
}
