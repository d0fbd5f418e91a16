use axum::http::StatusCode;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramTimer, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use crate::errors::{AppError, Result};

pub struct MetricsService {
    registry: Registry,
    generations: IntCounterVec,
    provider_duration: Histogram,
    credits_added: IntCounter,
    http_responses: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let generations = IntCounterVec::new(
            Opts::new("generations_total", "Generation attempts by outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let provider_duration = Histogram::with_opts(
            HistogramOpts::new(
                "provider_request_duration_seconds",
                "Time spent waiting on the image provider",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 90.0, 120.0, 180.0]),
        )
        .map_err(metrics_error)?;
        let credits_added = IntCounter::new("quota_credits_added_total", "Credits added by purchases")
            .map_err(metrics_error)?;
        let http_responses = IntCounterVec::new(
            Opts::new("http_responses_total", "HTTP responses by status class"),
            &["class"],
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(generations.clone())).map_err(metrics_error)?;
        registry.register(Box::new(provider_duration.clone())).map_err(metrics_error)?;
        registry.register(Box::new(credits_added.clone())).map_err(metrics_error)?;
        registry.register(Box::new(http_responses.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            generations,
            provider_duration,
            credits_added,
            http_responses,
        })
    }

    pub fn record_generation(&self, outcome: &str) {
        self.generations.with_label_values(&[outcome]).inc();
    }

    pub fn generation_count(&self, outcome: &str) -> u64 {
        self.generations.with_label_values(&[outcome]).get()
    }

    /// Observes the provider wait when the returned timer is dropped.
    pub fn start_provider_timer(&self) -> HistogramTimer {
        self.provider_duration.start_timer()
    }

    pub fn record_credits_added(&self, amount: u32) {
        self.credits_added.inc_by(u64::from(amount));
    }

    pub fn record_response(&self, status: StatusCode) {
        let class = if status.is_server_error() {
            "5xx"
        } else if status.is_client_error() {
            "4xx"
        } else if status.is_redirection() {
            "3xx"
        } else {
            "2xx"
        };
        self.http_responses.with_label_values(&[class]).inc();
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.into()))
    }
}

fn metrics_error(e: prometheus::Error) -> AppError {
    AppError::Internal(anyhow::anyhow!("metrics: {}", e))
}
