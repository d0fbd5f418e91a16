use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};

pub mod local;
pub mod memory;
pub mod s3;

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use s3::S3Storage;

/// Key/value blob storage for images and ledger documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `data` under `key` and returns the object's public URL.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    fn public_url(&self, key: &str) -> String;

    /// Inverse of [`ObjectStore::public_url`] for objects living in this store.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

pub type DynObjectStore = Arc<dyn ObjectStore>;

pub async fn read_json<T: DeserializeOwned>(store: &dyn ObjectStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(bytes) if !bytes.is_empty() => Ok(Some(serde_json::from_slice(&bytes)?)),
        _ => Ok(None),
    }
}

pub async fn write_json<T: Serialize>(store: &dyn ObjectStore, key: &str, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    store.put(key, body, "application/json").await?;
    Ok(())
}

pub(crate) fn join_public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

pub(crate) fn strip_public_url(base: &str, url: &str) -> Option<String> {
    let prefix = format!("{}/", base.trim_end_matches('/'));
    url.strip_prefix(&prefix)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

pub fn create_storage(config: &StorageConfig) -> Result<DynObjectStore> {
    match config.storage_type.as_str() {
        "local" => {
            let storage = LocalStorage::new(&config.local_path, &config.public_base_url)?;
            Ok(Arc::new(storage))
        }
        "memory" => Ok(Arc::new(MemoryStorage::new(&config.public_base_url))),
        "s3" => {
            let require = |value: &Option<String>, name: &str| {
                value
                    .clone()
                    .ok_or_else(|| AppError::Configuration(format!("{} is required for s3 storage", name)))
            };
            let storage = S3Storage::new(
                &require(&config.s3_endpoint, "R2_ENDPOINT")?,
                &require(&config.s3_bucket, "R2_BUCKET")?,
                &require(&config.s3_access_key, "R2_ACCESS_KEY")?,
                &require(&config.s3_secret_key, "R2_SECRET_KEY")?,
                &config.s3_region,
                &config.public_base_url,
            )?;
            Ok(Arc::new(storage))
        }
        other => Err(AppError::Configuration(format!(
            "Unsupported storage type: {}",
            other
        ))),
    }
}
