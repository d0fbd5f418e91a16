use async_trait::async_trait;
use aws_sdk_s3::{
    config::{http::HttpResponse, retry::RetryConfig, BehaviorVersion, Builder, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    Client,
};
use reqwest::Url;

use crate::{
    errors::{AppError, Result},
    storage::{join_public_url, strip_public_url, ObjectStore},
};

/// S3-compatible store (Cloudflare R2, MinIO, AWS) with path-style addressing.
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        public_base_url: &str,
    ) -> Result<Self> {
        Self::with_retry(
            endpoint,
            bucket,
            access_key,
            secret_key,
            region,
            public_base_url,
            RetryConfig::standard(),
        )
    }

    fn with_retry(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        public_base_url: &str,
        retry: RetryConfig,
    ) -> Result<Self> {
        Url::parse(endpoint)
            .map_err(|e| AppError::Configuration(format!("Invalid S3 endpoint {}: {}", endpoint, e)))?;

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(access_key, secret_key, None, None, "static"))
            .endpoint_url(endpoint)
            .force_path_style(true)
            .retry_config(retry)
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            bucket: bucket.to_string(),
            public_base_url: public_base_url.to_string(),
        })
    }
}

/// HTTP status of the raw response, when one arrived.
fn status_of<E>(error: &SdkError<E, HttpResponse>) -> Option<u16> {
    error.raw_response().map(|response| response.status().as_u16())
}

fn storage_error<E>(operation: &str, key: &str, error: &E) -> AppError
where
    E: std::error::Error,
{
    AppError::Storage(format!("S3 {} {} failed: {}", operation, key, DisplayErrorContext(error)))
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| storage_error("PUT", key, &e))?;

        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let missing = e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false)
                    || status_of(&e) == Some(404);
                if missing {
                    return Ok(None);
                }
                return Err(storage_error("GET", key, &e));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read S3 object {}: {}", key, e)))?;
        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if status_of(&e) == Some(404) => Ok(()),
            Err(e) => Err(storage_error("DELETE", key, &e)),
        }
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
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn storage(server: &MockServer) -> S3Storage {
        S3Storage::with_retry(
            &server.uri(),
            "portraits",
            "ak",
            "sk",
            "auto",
            "https://cdn.test",
            RetryConfig::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let result = S3Storage::new("not a url", "b", "ak", "sk", "auto", "https://cdn.test");
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_get_missing_object_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portraits/quotas/u1.json"))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(
                        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                         <Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>",
                    ),
            )
            .mount(&server)
            .await;

        assert_eq!(storage(&server).get("quotas/u1.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portraits/history/u1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"records\":[]}".to_vec()))
            .mount(&server)
            .await;

        let body = storage(&server).get("history/u1.json").await.unwrap();
        assert_eq!(body.as_deref(), Some(&b"{\"records\":[]}"[..]));
    }

    #[tokio::test]
    async fn test_put_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/portraits/generated/u1/1-id.png"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = storage(&server)
            .put("generated/u1/1-id.png", vec![0x89, 0x50], "image/png")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.test/generated/u1/1-id.png");
    }

    #[tokio::test]
    async fn test_server_error_is_storage_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(matches!(
            storage(&server).get("history/u1.json").await,
            Err(AppError::Storage(_))
        ));
    }
}
