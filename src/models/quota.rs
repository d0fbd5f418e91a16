use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-user credit counters, persisted as `quotas/<user>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    pub user_id: String,
    pub remaining_quota: u32,
    pub total_purchased: u32,
    pub total_generated: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl QuotaRecord {
    pub fn new(user_id: &str, free_credits: u32, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            remaining_quota: free_credits,
            total_purchased: 0,
            total_generated: 0,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeductOutcome {
    pub ok: bool,
    pub remaining: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    pub remaining_quota: u32,
    pub total_purchased: u32,
    pub total_generated: u32,
}

impl From<&QuotaRecord> for QuotaResponse {
    fn from(record: &QuotaRecord) -> Self {
        Self {
            remaining_quota: record.remaining_quota,
            total_purchased: record.total_purchased,
            total_generated: record.total_generated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_document_shape() {
        let now = Utc.timestamp_millis_opt(1_718_000_000_000).unwrap();
        let record = QuotaRecord::new("user_1", 1, now);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["userId"], "user_1");
        assert_eq!(json["remainingQuota"], 1);
        assert_eq!(json["totalPurchased"], 0);
        assert_eq!(json["lastUpdated"], 1_718_000_000_000i64);
    }

    #[test]
    fn test_negative_counter_is_rejected() {
        let raw = r#"{"userId":"u","remainingQuota":-1,"totalPurchased":0,"totalGenerated":0,"lastUpdated":0}"#;
        assert!(serde_json::from_str::<QuotaRecord>(raw).is_err());
    }
}
