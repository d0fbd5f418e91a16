use chrono::Utc;
use tracing::{debug, info};

use crate::{
    errors::{AppError, Result},
    models::{DeductOutcome, QuotaRecord},
    services::user_locks::UserLocks,
    storage::{read_json, write_json, DynObjectStore},
    utils::file::quota_key,
};

/// Per-user credit counters kept as one JSON document per user.
#[derive(Clone)]
pub struct QuotaLedger {
    store: DynObjectStore,
    locks: UserLocks,
    free_credits: u32,
}

impl QuotaLedger {
    pub fn new(store: DynObjectStore, free_credits: u32) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
            free_credits,
        }
    }

    /// Reads the user's record, creating it with the free trial credits on first use.
    pub async fn get_or_init(&self, user_id: &str) -> Result<QuotaRecord> {
        let _guard = self.locks.lock(&quota_key(user_id)).await;
        self.load_or_init(user_id).await
    }

    pub async fn has(&self, user_id: &str) -> Result<bool> {
        Ok(self.get_or_init(user_id).await?.remaining_quota > 0)
    }

    /// Takes one credit. Refuses without writing when none are left.
    pub async fn deduct(&self, user_id: &str) -> Result<DeductOutcome> {
        let _guard = self.locks.lock(&quota_key(user_id)).await;
        let mut record = self.load_or_init(user_id).await?;

        if record.remaining_quota == 0 {
            debug!(user_id, "Deduct refused, no credits left");
            return Ok(DeductOutcome {
                ok: false,
                remaining: 0,
            });
        }

        record.remaining_quota -= 1;
        record.total_generated += 1;
        self.save(&mut record).await?;

        debug!(user_id, remaining = record.remaining_quota, "Deducted one credit");
        Ok(DeductOutcome {
            ok: true,
            remaining: record.remaining_quota,
        })
    }

    /// Credits `amount` purchased units and returns the new balance.
    pub async fn add(&self, user_id: &str, amount: u32) -> Result<u32> {
        if amount == 0 {
            return Err(AppError::InvalidInput("Credit amount must be positive".to_string()));
        }

        let _guard = self.locks.lock(&quota_key(user_id)).await;
        let mut record = self.load_or_init(user_id).await?;

        record.remaining_quota = record.remaining_quota.saturating_add(amount);
        record.total_purchased = record.total_purchased.saturating_add(amount);
        self.save(&mut record).await?;

        info!(user_id, amount, remaining = record.remaining_quota, "Added credits");
        Ok(record.remaining_quota)
    }

    async fn load_or_init(&self, user_id: &str) -> Result<QuotaRecord> {
        let key = quota_key(user_id);
        if let Some(record) = read_json::<QuotaRecord>(self.store.as_ref(), &key).await? {
            return Ok(record);
        }

        let mut record = QuotaRecord::new(user_id, self.free_credits, Utc::now());
        self.save(&mut record).await?;
        info!(user_id, credits = self.free_credits, "Initialised quota for new user");
        Ok(record)
    }

    async fn save(&self, record: &mut QuotaRecord) -> Result<()> {
        record.last_updated = Utc::now();
        write_json(self.store.as_ref(), &quota_key(&record.user_id), record).await
    }
}
