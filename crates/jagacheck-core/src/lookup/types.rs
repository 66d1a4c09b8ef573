use chrono::NaiveDate;

use super::LookupFailure;

/// Date layout the detail endpoint expects for `tgl_lahir`.
pub const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_CAPTCHA_REGENERATIONS: u32 = 2;

/// One captcha challenge. Its id is only ever submitted with an answer derived
/// from its own image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: String,
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub subject_id: String,
    pub birth_date: NaiveDate,
}

impl Query {
    pub fn new(subject_id: impl Into<String>, birth_date: NaiveDate) -> Self {
        Self {
            subject_id: subject_id.into(),
            birth_date,
        }
    }

    pub fn parse(subject_id: &str, birth_date: &str) -> Result<Self, String> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() {
            return Err("subject id is empty".to_string());
        }
        let birth_date = NaiveDate::parse_from_str(birth_date.trim(), BIRTH_DATE_FORMAT)
            .map_err(|err| format!("invalid birth date {birth_date:?}: {err}"))?;
        Ok(Self::new(subject_id, birth_date))
    }

    pub fn birth_date_param(&self) -> String {
        self.birth_date.format(BIRTH_DATE_FORMAT).to_string()
    }
}

/// The `data` object of a successful detail response. Kept as raw JSON because
/// the remote schema is not guaranteed; fields are read leniently.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LookupRecord {
    pub payload: serde_json::Value,
}

impl LookupRecord {
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }

    /// Reads `data.response.<key>` as display text. Null, empty and missing
    /// values all come back as `None`.
    pub fn response_field(&self, key: &str) -> Option<String> {
        let value = self.payload.get("response")?.get(key)?;
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            other => Some(other.to_string()),
        }
    }
}

/// Result of a single gated submission.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Success(LookupRecord),
    CaptchaRejected(String),
    OtherFailure(String),
    TransportFailure(String),
}

/// Result of a whole orchestrator run for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum GatedOutcome {
    Success {
        record: LookupRecord,
        challenge_id: String,
        answer: String,
    },
    Failure(LookupFailure),
}

impl GatedOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn record(&self) -> Option<&LookupRecord> {
        match self {
            Self::Success { record, .. } => Some(record),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&LookupFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Attempt budget for one query. A single value so the worst case stays
/// visible: `max_attempts` outer attempts, each allowed
/// `captcha_regenerations` fresh challenges after a rejected answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub captcha_regenerations: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, captcha_regenerations: u32) -> Self {
        Self {
            max_attempts,
            captcha_regenerations,
        }
    }

    pub fn submissions_per_attempt(&self) -> u32 {
        self.captcha_regenerations.saturating_add(1)
    }

    /// Upper bound on submissions (and challenges) for one query.
    pub fn submission_ceiling(&self) -> u32 {
        self.max_attempts
            .saturating_mul(self.submissions_per_attempt())
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_CAPTCHA_REGENERATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_parse_trims_and_validates() {
        let query = Query::parse(" 3317110608050001 ", "2005-08-06 ").expect("parse");
        assert_eq!(query.subject_id, "3317110608050001");
        assert_eq!(query.birth_date_param(), "2005-08-06");

        assert!(Query::parse("", "2005-08-06").is_err());
        assert!(Query::parse("1234", "06-08-2005").is_err());
        assert!(Query::parse("1234", "2005-02-30").is_err());
    }

    #[test]
    fn response_field_is_lenient() {
        let record = LookupRecord::new(json!({
            "response": {
                "namapeserta": " BUDI ",
                "nmstatuspeserta": "",
                "nmjenispeserta": null,
                "kelas": 3
            }
        }));
        assert_eq!(record.response_field("namapeserta").as_deref(), Some("BUDI"));
        assert_eq!(record.response_field("nmstatuspeserta"), None);
        assert_eq!(record.response_field("nmjenispeserta"), None);
        assert_eq!(record.response_field("faskesterdaftar"), None);
        assert_eq!(record.response_field("kelas").as_deref(), Some("3"));

        let empty = LookupRecord::default();
        assert_eq!(empty.response_field("namapeserta"), None);
    }

    #[test]
    fn default_budget_ceiling() {
        let budget = RetryBudget::default();
        assert_eq!(budget.max_attempts, 5);
        assert_eq!(budget.submissions_per_attempt(), 3);
        assert_eq!(budget.submission_ceiling(), 15);
        assert_eq!(RetryBudget::new(2, 0).submission_ceiling(), 2);
    }
}
