use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    errors::Result,
    storage::{join_public_url, strip_public_url, ObjectStore},
};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Process-local store for tests and throwaway runs.
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
    public_base_url: String,
}

impl MemoryStorage {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            public_base_url: public_base_url.to_string(),
        }
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().await.get(key).map(|o| o.data.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base_url, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        strip_public_url(&self.public_base_url, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_keeps_content_type() {
        let storage = MemoryStorage::new("http://localhost/files");
        storage.put("uploads/a.png", vec![1, 2, 3], "image/png").await.unwrap();
        storage.put("uploads/b.png", vec![4], "image/png").await.unwrap();
        storage.put("history/a.json", b"{}".to_vec(), "application/json").await.unwrap();

        let object = storage.object("uploads/a.png").await.unwrap();
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.data, vec![1, 2, 3]);
        assert_eq!(
            storage.keys_with_prefix("uploads/").await,
            vec!["uploads/a.png".to_string(), "uploads/b.png".to_string()]
        );
    }
}
