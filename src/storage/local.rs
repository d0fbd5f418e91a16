use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    storage::{join_public_url, strip_public_url, ObjectStore},
};

/// Filesystem-backed store. Keys map to paths below `base_path`.
pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(base_path: P, public_base_url: &str) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn get_full_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp-{}", name, Uuid::new_v4().simple()))
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<String> {
        let full_path = self.get_full_path(key)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        // Readers only ever see the old or the new contents.
        let temp_path = temp_path_for(&full_path);
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::Storage(format!("Failed to write file: {}", e)));
        }
        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::Storage(format!("Failed to move file into place: {}", e)));
        }

        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let full_path = self.get_full_path(key)?;

        match fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read file: {}", e))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.get_full_path(key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {}", e))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base_url, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        strip_public_url(&self.public_base_url, url)
    }
}
