use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use silver_portrait_studio::{
    config::Config,
    errors::AppError,
    models::{GenerationRequest, ImagePayload, Outcome, StyleType},
    services::{
        GenerationService, GenerationSettings, HistoryLedger, MetricsService, ProviderClient,
        QuotaLedger,
    },
    storage::MemoryStorage,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "user_2portrait";

// PNG signature followed by an IHDR chunk header
const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

struct Harness {
    generator: GenerationService,
    store: Arc<MemoryStorage>,
    quota: QuotaLedger,
    history: HistoryLedger,
    metrics: Arc<MetricsService>,
}

fn harness(server: &MockServer, timeout_secs: u64, max_upload_bytes: usize) -> Harness {
    let mut config = Config::default();
    config.max_upload_bytes = max_upload_bytes;
    config.provider.api_url = server.uri();
    config.provider.api_key = Some("test-key".to_string());
    config.provider.timeout_secs = timeout_secs;
    // wiremock listens on loopback
    config.provider.allow_private_image_hosts = true;
    build(config)
}

fn build(config: Config) -> Harness {
    let store = Arc::new(MemoryStorage::new("https://cdn.test"));
    let quota = QuotaLedger::new(store.clone(), config.free_credits);
    let history = HistoryLedger::new(store.clone());
    let metrics = Arc::new(MetricsService::new().unwrap());
    let provider = ProviderClient::new(config.provider.clone()).unwrap();

    let generator = GenerationService::new(
        store.clone(),
        quota.clone(),
        history.clone(),
        provider,
        metrics.clone(),
        GenerationSettings::from(&config),
    );

    Harness {
        generator,
        store,
        quota,
        history,
        metrics,
    }
}

fn request(bytes: &[u8]) -> GenerationRequest {
    GenerationRequest {
        image: Some(ImagePayload {
            bytes: bytes.to_vec(),
            content_type: Some("image/png".to_string()),
            file_name: Some("me.png".to_string()),
        }),
        style: StyleType::Memorial,
        lang: "en".to_string(),
    }
}

fn inline_reply(bytes: &[u8]) -> serde_json::Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "Done"},
                    {"inline_data": {"mime_type": "image/png", "data": general_purpose::STANDARD.encode(bytes)}}
                ]
            }
        }]
    })
}

async fn mount_provider(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_inline_success_stores_image_and_spends_one_credit() {
    let server = MockServer::start().await;
    mount_provider(&server, ResponseTemplate::new(200).set_body_json(inline_reply(PNG_BYTES))).await;
    let h = harness(&server, 30, 1024);

    let generated = h.generator.generate(USER, request(PNG_BYTES)).await.unwrap();
    assert_eq!(generated.remaining_quota, 0);
    assert!(generated.image_url.starts_with("https://cdn.test/generated/user_2portrait/"));
    assert!(generated.image_url.ends_with("-memorial.png"));

    let keys = h.store.keys_with_prefix("generated/").await;
    assert_eq!(keys.len(), 1);
    assert_eq!(h.store.object(&keys[0]).await.unwrap().data, PNG_BYTES);

    let records = h.history.list(USER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, generated.record_id);
    assert_eq!(records[0].style, StyleType::Memorial);
    assert_eq!(records[0].lang, "en");
    assert_eq!(records[0].outcome.generated_url(), Some(generated.image_url.as_str()));

    let quota = h.quota.get_or_init(USER).await.unwrap();
    assert_eq!(quota.remaining_quota, 0);
    assert_eq!(quota.total_generated, 1);
    assert_eq!(h.metrics.generation_count("success"), 1);
}

#[tokio::test]
async fn test_provider_error_records_failure_and_keeps_credit() {
    let server = MockServer::start().await;
    mount_provider(&server, ResponseTemplate::new(500).set_body_string("upstream exploded")).await;
    let h = harness(&server, 30, 1024);

    let result = h.generator.generate(USER, request(PNG_BYTES)).await;
    assert!(matches!(result, Err(AppError::Provider { status: Some(500), .. })));

    let records = h.history.list(USER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].outcome,
        Outcome::Failed {
            error: Some("Provider returned HTTP 500".to_string())
        }
    );

    assert_eq!(h.quota.get_or_init(USER).await.unwrap().remaining_quota, 1);
    assert!(h.store.keys_with_prefix("generated/").await.is_empty());
}

#[tokio::test]
async fn test_oversize_upload_is_rejected_before_any_side_effect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let h = harness(&server, 30, 8);

    let result = h.generator.generate(USER, request(PNG_BYTES)).await;
    assert!(matches!(result, Err(AppError::FileTooLarge { size: 16, limit: 8 })));

    assert!(h.history.list(USER).await.unwrap().is_empty());
    assert!(h.store.keys_with_prefix("quotas/").await.is_empty());
}

#[tokio::test]
async fn test_missing_or_non_image_upload_is_invalid() {
    let server = MockServer::start().await;
    let h = harness(&server, 30, 1024);

    let mut missing = request(PNG_BYTES);
    missing.image = None;
    assert!(matches!(
        h.generator.generate(USER, missing).await,
        Err(AppError::InvalidInput(_))
    ));

    let mut text = request(b"just some text");
    if let Some(image) = text.image.as_mut() {
        image.content_type = Some("text/plain".to_string());
    }
    assert!(matches!(
        h.generator.generate(USER, text).await,
        Err(AppError::InvalidInput(_))
    ));

    assert!(h.history.list(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_no_credits_refuses_without_calling_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let h = harness(&server, 30, 1024);
    assert!(h.quota.deduct(USER).await.unwrap().ok);

    let result = h.generator.generate(USER, request(PNG_BYTES)).await;
    assert!(matches!(result, Err(AppError::InsufficientQuota)));
    assert!(h.history.list(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_timeout_is_recorded() {
    let server = MockServer::start().await;
    mount_provider(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(inline_reply(PNG_BYTES))
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    let h = harness(&server, 1, 1024);

    let result = h.generator.generate(USER, request(PNG_BYTES)).await;
    assert!(matches!(result, Err(AppError::ProviderTimeout(_))));

    let records = h.history.list(USER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].outcome,
        Outcome::Failed {
            error: Some("Provider timed out after 1s".to_string())
        }
    );
    assert_eq!(h.quota.get_or_init(USER).await.unwrap().remaining_quota, 1);
    assert_eq!(h.metrics.generation_count("provider_timeout"), 1);
}

#[tokio::test]
async fn test_text_only_reply_is_no_image() {
    let server = MockServer::start().await;
    mount_provider(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "I can't help with that photo."}}]
        })),
    )
    .await;
    let h = harness(&server, 30, 1024);

    let result = h.generator.generate(USER, request(PNG_BYTES)).await;
    assert!(matches!(result, Err(AppError::NoImageReturned(_))));

    let records = h.history.list(USER).await.unwrap();
    match &records[0].outcome {
        Outcome::Failed { error: Some(error) } => {
            assert!(error.starts_with("No image returned: I can't help"))
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.quota.get_or_init(USER).await.unwrap().remaining_quota, 1);
}

#[tokio::test]
async fn test_remote_image_url_is_downloaded_and_stored() {
    let server = MockServer::start().await;
    let image_url = format!("{}/outputs/portrait.png", server.uri());
    mount_provider(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": [
                {"type": "image_url", "image_url": {"url": image_url}}
            ]}}]
        })),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/outputs/portrait.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG_BYTES),
        )
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&server, 30, 1024);

    let generated = h.generator.generate(USER, request(PNG_BYTES)).await.unwrap();

    let key = generated.image_url.trim_start_matches("https://cdn.test/");
    let stored = h.store.object(key).await.unwrap();
    assert_eq!(stored.data, PNG_BYTES);
    assert_eq!(stored.content_type, "image/png");
    assert!(h.history.list(USER).await.unwrap()[0].outcome.is_success());
}

#[tokio::test]
async fn test_oversized_remote_image_fails_and_keeps_credit() {
    let server = MockServer::start().await;
    let image_url = format!("{}/outputs/huge.png", server.uri());
    mount_provider(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": [
                {"type": "image_url", "image_url": {"url": image_url}}
            ]}}]
        })),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/outputs/huge.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0xAB; 64 * 1024]),
        )
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.max_upload_bytes = 1024;
    config.provider.api_url = server.uri();
    config.provider.api_key = Some("test-key".to_string());
    config.provider.allow_private_image_hosts = true;
    config.provider.max_image_bytes = 4096;
    let h = build(config);

    let result = h.generator.generate(USER, request(PNG_BYTES)).await;
    assert!(matches!(result, Err(AppError::Provider { status: None, .. })));

    let records = h.history.list(USER).await.unwrap();
    assert_eq!(
        records[0].outcome,
        Outcome::Failed {
            error: Some("Generated image exceeds 4096 bytes".to_string())
        }
    );
    assert_eq!(h.quota.get_or_init(USER).await.unwrap().remaining_quota, 1);
    assert!(h.store.keys_with_prefix("generated/").await.is_empty());
}

#[tokio::test]
async fn test_remote_image_on_internal_host_is_refused_by_default() {
    let server = MockServer::start().await;
    mount_provider(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": [
                {"type": "image_url", "image_url": {"url": "http://169.254.169.254/latest/meta-data"}}
            ]}}]
        })),
    )
    .await;

    let mut config = Config::default();
    config.max_upload_bytes = 1024;
    config.provider.api_url = server.uri();
    config.provider.api_key = Some("test-key".to_string());
    let h = build(config);

    let result = h.generator.generate(USER, request(PNG_BYTES)).await;
    assert!(matches!(result, Err(AppError::Provider { status: None, .. })));
    assert_eq!(h.quota.get_or_init(USER).await.unwrap().remaining_quota, 1);
}

#[tokio::test]
async fn test_originals_are_stored_when_enabled() {
    let server = MockServer::start().await;
    mount_provider(&server, ResponseTemplate::new(200).set_body_json(inline_reply(PNG_BYTES))).await;

    let mut config = Config::default();
    config.store_originals = true;
    config.provider.api_url = server.uri();
    config.provider.api_key = Some("test-key".to_string());

    let store = Arc::new(MemoryStorage::new("https://cdn.test"));
    let quota = QuotaLedger::new(store.clone(), 1);
    let history = HistoryLedger::new(store.clone());
    let generator = GenerationService::new(
        store.clone(),
        quota,
        history.clone(),
        ProviderClient::new(config.provider.clone()).unwrap(),
        Arc::new(MetricsService::new().unwrap()),
        GenerationSettings::from(&config),
    );

    generator.generate(USER, request(PNG_BYTES)).await.unwrap();

    let uploads = store.keys_with_prefix("uploads/user_2portrait/").await;
    assert_eq!(uploads.len(), 1);
    let record = &history.list(USER).await.unwrap()[0];
    assert_eq!(record.original_url, format!("https://cdn.test/{}", uploads[0]));
}
