use std::sync::Arc;

use crate::{
    auth::JwtService,
    config::Config,
    errors::Result,
    services::{
        GenerationService, GenerationSettings, HistoryLedger, MetricsService, PaymentService,
        ProviderClient, QuotaLedger,
    },
    storage::DynObjectStore,
};

pub mod docs;
pub mod generate;
pub mod health;
pub mod history;
pub mod metrics;
pub mod payment;
pub mod quota;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: DynObjectStore,
    pub jwt: Arc<JwtService>,
    pub quota: QuotaLedger,
    pub history: HistoryLedger,
    pub generator: Arc<GenerationService>,
    pub payments: Arc<PaymentService>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(config: Config, store: DynObjectStore) -> Result<Self> {
        let metrics = Arc::new(MetricsService::new()?);
        let quota = QuotaLedger::new(store.clone(), config.free_credits);
        let history = HistoryLedger::new(store.clone());
        let provider = ProviderClient::new(config.provider.clone())?;

        let generator = GenerationService::new(
            store.clone(),
            quota.clone(),
            history.clone(),
            provider,
            metrics.clone(),
            GenerationSettings::from(&config),
        );
        let payments = PaymentService::new(config.payment.clone(), quota.clone(), metrics.clone());

        Ok(Self {
            jwt: Arc::new(JwtService::new(&config.jwt_secret)),
            config: Arc::new(config),
            store,
            quota,
            history,
            generator: Arc::new(generator),
            payments: Arc::new(payments),
            metrics,
        })
    }
}
