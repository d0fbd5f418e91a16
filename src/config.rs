use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub free_credits: u32,
    pub store_originals: bool,
    pub jwt_secret: String,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// `local`, `s3` or `memory`.
    pub storage_type: String,
    pub local_path: String,
    pub public_base_url: String,
    pub s3_endpoint: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub output_size: String,
    /// Upper bound for an image downloaded from a link in the provider reply.
    pub max_image_bytes: usize,
    /// Lets image links point at loopback, private or link-local addresses.
    pub allow_private_image_hosts: bool,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub app_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 3000,
            max_upload_bytes: 8 * 1024 * 1024,
            free_credits: 1,
            store_originals: false,
            jwt_secret: "change-me-in-production".to_string(),
            storage: StorageConfig {
                storage_type: "local".to_string(),
                local_path: "./data".to_string(),
                public_base_url: "http://localhost:3000/files".to_string(),
                s3_endpoint: None,
                s3_bucket: None,
                s3_access_key: None,
                s3_secret_key: None,
                s3_region: "auto".to_string(),
            },
            provider: ProviderConfig {
                api_url: "https://aihubmix.com".to_string(),
                api_key: None,
                model: "gemini-3-pro-image-preview".to_string(),
                timeout_secs: 150,
                output_size: "1024x1024".to_string(),
                max_image_bytes: 20 * 1024 * 1024,
                allow_private_image_hosts: false,
            },
            payment: PaymentConfig {
                api_url: "https://api.creem.io/v1".to_string(),
                api_key: None,
                webhook_secret: None,
                app_base_url: "http://localhost:3000".to_string(),
            },
        }
    }
}

impl Config {
    /// Defaults overlaid with whatever the environment (and `.env`) provides.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            port: parse_var("PORT", defaults.port)?,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            free_credits: parse_var("FREE_CREDITS", defaults.free_credits)?,
            store_originals: parse_var("STORE_ORIGINALS", defaults.store_originals)?,
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            storage: StorageConfig {
                storage_type: env::var("STORAGE_TYPE").unwrap_or(defaults.storage.storage_type),
                local_path: env::var("STORAGE_LOCAL_PATH").unwrap_or(defaults.storage.local_path),
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .or_else(|_| env::var("R2_PUBLIC_URL"))
                    .unwrap_or(defaults.storage.public_base_url),
                s3_endpoint: optional_var("R2_ENDPOINT"),
                s3_bucket: optional_var("R2_BUCKET"),
                s3_access_key: optional_var("R2_ACCESS_KEY"),
                s3_secret_key: optional_var("R2_SECRET_KEY"),
                s3_region: env::var("R2_REGION").unwrap_or(defaults.storage.s3_region),
            },
            provider: ProviderConfig {
                api_url: env::var("AIHUBMIX_API_URL").unwrap_or(defaults.provider.api_url),
                api_key: optional_var("AIHUBMIX_API_KEY"),
                model: env::var("AI_MODEL").unwrap_or(defaults.provider.model),
                timeout_secs: parse_var("PROVIDER_TIMEOUT_SECS", defaults.provider.timeout_secs)?,
                output_size: env::var("PROVIDER_OUTPUT_SIZE")
                    .unwrap_or(defaults.provider.output_size),
                max_image_bytes: parse_var("PROVIDER_MAX_IMAGE_BYTES", defaults.provider.max_image_bytes)?,
                allow_private_image_hosts: parse_var(
                    "PROVIDER_ALLOW_PRIVATE_IMAGE_HOSTS",
                    defaults.provider.allow_private_image_hosts,
                )?,
            },
            payment: PaymentConfig {
                api_url: env::var("CREEM_API_URL").unwrap_or(defaults.payment.api_url),
                api_key: optional_var("CREEM_API_KEY"),
                webhook_secret: optional_var("CREEM_WEBHOOK_SECRET"),
                app_base_url: env::var("APP_BASE_URL").unwrap_or(defaults.payment.app_base_url),
            },
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
