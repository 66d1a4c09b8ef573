use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::lookup::{GatedOutcome, Query};

/// Placeholder written for fields a successful response left out.
pub const MISSING_FIELD: &str = "N/A";

pub const FIELD_NAME: &str = "namapeserta";
pub const FIELD_STATUS: &str = "nmstatuspeserta";
pub const FIELD_CATEGORY: &str = "nmjenispeserta";
pub const FIELD_FACILITY: &str = "faskesterdaftar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    Success,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

/// One line of output per processed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub subject_id: String,
    pub birth_date: NaiveDate,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_label: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ResultRecord {
    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }

    /// Same record with the timestamp cleared, for comparisons.
    pub fn without_timestamp(&self) -> Self {
        Self {
            timestamp: DateTime::<Utc>::default(),
            ..self.clone()
        }
    }
}

pub fn format_result(query: &Query, outcome: &GatedOutcome) -> ResultRecord {
    format_result_at(query, outcome, Utc::now())
}

/// Total: failures and missing response fields map to placeholders, never errors.
pub fn format_result_at(
    query: &Query,
    outcome: &GatedOutcome,
    timestamp: DateTime<Utc>,
) -> ResultRecord {
    let Some(record) = outcome.record() else {
        return ResultRecord {
            subject_id: query.subject_id.clone(),
            birth_date: query.birth_date,
            status: RecordStatus::Failed,
            name: None,
            status_label: None,
            category_label: None,
            facility_label: None,
            timestamp,
        };
    };
    let field = |key: &str| {
        Some(
            record
                .response_field(key)
                .unwrap_or_else(|| MISSING_FIELD.to_string()),
        )
    };
    ResultRecord {
        subject_id: query.subject_id.clone(),
        birth_date: query.birth_date,
        status: RecordStatus::Success,
        name: field(FIELD_NAME),
        status_label: field(FIELD_STATUS),
        category_label: field(FIELD_CATEGORY),
        facility_label: field(FIELD_FACILITY),
        timestamp,
    }
}

/// Counts printed after a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_records(records: &[ResultRecord]) -> Self {
        let succeeded = records.iter().filter(|r| r.is_success()).count();
        Self {
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
        }
    }

    /// Fraction of queries that succeeded, `0.0` for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
