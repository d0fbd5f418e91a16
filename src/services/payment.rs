use reqwest::{Client, Url};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::PaymentConfig,
    errors::{AppError, Result},
    models::{
        product_by_id, CheckoutProduct, CheckoutResponse, CheckoutSessionEnvelope, WebhookEvent,
    },
    services::{metrics::MetricsService, quota_ledger::QuotaLedger},
    utils::crypto::verify_hmac_sha256_hex,
};

pub const SIGNATURE_HEADER: &str = "creem-signature";
const CHECKOUT_COMPLETED: &str = "checkout.completed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Credited {
        user_id: String,
        product_id: String,
        amount: u32,
        remaining: u32,
    },
    Ignored {
        event: String,
    },
}

/// Checkout creation and purchase crediting against the payment provider.
pub struct PaymentService {
    client: Client,
    config: PaymentConfig,
    quota: QuotaLedger,
    metrics: Arc<MetricsService>,
}

impl PaymentService {
    pub fn new(config: PaymentConfig, quota: QuotaLedger, metrics: Arc<MetricsService>) -> Self {
        if config.webhook_secret.is_none() {
            warn!("CREEM_WEBHOOK_SECRET is not set; payment webhooks will be trusted without verification");
        }

        Self {
            client: Client::new(),
            config,
            quota,
            metrics,
        }
    }

    pub async fn create_checkout(&self, user_id: &str, product_id: Option<&str>) -> Result<CheckoutResponse> {
        let product_id = product_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidInput("Product ID required".to_string()))?;
        let product =
            product_by_id(product_id).ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("CREEM_API_KEY not configured".to_string()))?;

        let base_url = self.config.app_base_url.trim_end_matches('/');
        let payload = json!({
            "product_id": product.id,
            "success_url": format!("{}/quota?success=true", base_url),
            "cancel_url": format!("{}/quota?canceled=true", base_url),
            "metadata": { "userId": user_id },
        });

        let response = self
            .client
            .post(format!("{}/checkout", self.config.api_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("checkout request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Payment(format!(
                "checkout returned {}: {}",
                status,
                crate::utils::file::truncate_preview(&text, 200)
            )));
        }

        let envelope: CheckoutSessionEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("unreadable checkout response: {}", e)))?;

        let mut checkout_url = Url::parse(&envelope.session.checkout_url)
            .map_err(|e| AppError::Payment(format!("invalid checkout url: {}", e)))?;
        checkout_url
            .query_pairs_mut()
            .append_pair("metadata", &json!({ "userId": user_id }).to_string());

        info!(user_id, product_id = product.id, session_id = %envelope.session.id, "Created checkout session");

        Ok(CheckoutResponse {
            checkout_url: checkout_url.to_string(),
            product: CheckoutProduct::from(product),
        })
    }

    /// Passes when no secret is configured.
    pub fn verify_signature(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let Some(secret) = self.config.webhook_secret.as_deref() else {
            return Ok(());
        };

        match signature {
            Some(signature) if verify_hmac_sha256_hex(secret, body, signature) => Ok(()),
            _ => Err(AppError::InvalidSignature),
        }
    }

    pub async fn handle_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        self.verify_signature(body, signature)?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;

        if event.event != CHECKOUT_COMPLETED {
            info!(event = %event.event, "Ignoring payment webhook event");
            return Ok(WebhookOutcome::Ignored { event: event.event });
        }

        let checkout = event
            .checkout()
            .ok_or_else(|| AppError::InvalidInput("Webhook has no checkout".to_string()))?;
        let user_id = checkout
            .user_id()
            .ok_or_else(|| AppError::InvalidInput("No userId provided".to_string()))?;
        let product_id = checkout.product_id.as_deref().unwrap_or_default();
        let product = product_by_id(product_id).ok_or_else(|| {
            warn!(product_id, "Webhook for unknown product");
            AppError::NotFound("Product".to_string())
        })?;

        let remaining = self.quota.add(user_id, product.quota).await?;
        self.metrics.record_credits_added(product.quota);

        info!(user_id, product_id, amount = product.quota, remaining, "Credited purchase");
        Ok(WebhookOutcome::Credited {
            user_id: user_id.to_string(),
            product_id: product.id.to_string(),
            amount: product.quota,
            remaining,
        })
    }
}
