use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Style preset; decides which prompt is sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StyleType {
    #[default]
    Id,
    Festival,
    Memorial,
}

impl StyleType {
    /// Unknown or missing values fall back to [`StyleType::Id`].
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("festival") => StyleType::Festival,
            Some("memorial") => StyleType::Memorial,
            _ => StyleType::Id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleType::Id => "id",
            StyleType::Festival => "festival",
            StyleType::Memorial => "memorial",
        }
    }
}

impl fmt::Display for StyleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one attempt. Stored flattened as `status` plus
/// `generatedUrl` / `error`, so a success always carries its image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success {
        #[serde(rename = "generatedUrl")]
        generated_url: String,
    },
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn generated_url(&self) -> Option<&str> {
        match self {
            Outcome::Success { generated_url } => Some(generated_url),
            Outcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub style: StyleType,
    pub original_url: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub lang: String,
}

/// Caller-supplied fields for [`crate::services::HistoryLedger::append`].
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub style: StyleType,
    pub original_url: String,
    pub outcome: Outcome,
    pub lang: String,
}

impl NewHistoryRecord {
    /// Pessimistic default: the attempt reads as failed until proven otherwise.
    pub fn pending(style: StyleType, original_url: String, lang: &str) -> Self {
        Self {
            style,
            original_url,
            outcome: Outcome::Failed { error: None },
            lang: lang.to_string(),
        }
    }
}

/// Shallow merge; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct HistoryUpdate {
    pub outcome: Option<Outcome>,
    pub original_url: Option<String>,
}

impl HistoryUpdate {
    pub fn succeeded(generated_url: String) -> Self {
        Self {
            outcome: Some(Outcome::Success { generated_url }),
            ..Default::default()
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            outcome: Some(Outcome::Failed { error: Some(error) }),
            ..Default::default()
        }
    }

    pub fn apply(self, record: &mut HistoryRecord) {
        if let Some(outcome) = self.outcome {
            record.outcome = outcome;
        }
        if let Some(original_url) = self.original_url {
            record.original_url = original_url;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default)]
    pub records: Vec<HistoryRecord>,
}
