use chrono::{SubsecRound, Utc};
use tracing::{debug, warn};

use crate::{
    errors::Result,
    models::{HistoryDocument, HistoryRecord, HistoryUpdate, NewHistoryRecord},
    services::user_locks::UserLocks,
    storage::{read_json, write_json, DynObjectStore},
    utils::{crypto::generate_record_id, file::history_key},
};

/// Per-user list of generation attempts, newest first.
#[derive(Clone)]
pub struct HistoryLedger {
    store: DynObjectStore,
    locks: UserLocks,
}

impl HistoryLedger {
    pub fn new(store: DynObjectStore) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<HistoryRecord>> {
        Ok(self.load(user_id).await?.records)
    }

    /// Assigns id and timestamp, then inserts at the head of the list.
    pub async fn append(&self, user_id: &str, fields: NewHistoryRecord) -> Result<HistoryRecord> {
        let _guard = self.locks.lock(&history_key(user_id)).await;
        let mut document = self.load(user_id).await?;

        // stored with millisecond precision
        let now = Utc::now().trunc_subsecs(3);
        let record = HistoryRecord {
            id: generate_record_id(now.timestamp_millis()),
            timestamp: now,
            style: fields.style,
            original_url: fields.original_url,
            outcome: fields.outcome,
            lang: fields.lang,
        };

        document.records.insert(0, record.clone());
        self.save(user_id, &document).await?;

        debug!(user_id, record_id = %record.id, "Appended history record");
        Ok(record)
    }

    /// Returns `false` when no record has `id`.
    pub async fn update(&self, user_id: &str, id: &str, update: HistoryUpdate) -> Result<bool> {
        let _guard = self.locks.lock(&history_key(user_id)).await;
        let mut document = self.load(user_id).await?;

        let Some(record) = document.records.iter_mut().find(|r| r.id == id) else {
            warn!(user_id, record_id = id, "History record to update not found");
            return Ok(false);
        };
        update.apply(record);

        self.save(user_id, &document).await?;
        Ok(true)
    }

    /// Removes the record and hands it back; `None` leaves the list untouched.
    pub async fn remove(&self, user_id: &str, id: &str) -> Result<Option<HistoryRecord>> {
        let _guard = self.locks.lock(&history_key(user_id)).await;
        let mut document = self.load(user_id).await?;

        let Some(position) = document.records.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let removed = document.records.remove(position);

        self.save(user_id, &document).await?;
        debug!(user_id, record_id = id, "Deleted history record");
        Ok(Some(removed))
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        Ok(self.remove(user_id, id).await?.is_some())
    }

    async fn load(&self, user_id: &str) -> Result<HistoryDocument> {
        Ok(read_json(self.store.as_ref(), &history_key(user_id))
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, document: &HistoryDocument) -> Result<()> {
        write_json(self.store.as_ref(), &history_key(user_id), document).await
    }
}
