use jagacheck_core::lookup::{LookupOutcome, LookupRecord};
use serde::Deserialize;
use serde_json::Value;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Envelope shared by every jaga.id endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl ApiEnvelope {
    pub(super) fn parse(body: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(body).map_err(|err| err.to_string())
    }

    pub(super) fn message_text(&self) -> String {
        match &self.message {
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
            Some(Value::String(_)) => UNKNOWN_ERROR.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Heuristic: the API has no error codes, so a rejected answer is recognised
/// only by the word "captcha" in its message. Keep every such check here.
pub fn is_captcha_rejection(message: &str) -> bool {
    message.to_ascii_lowercase().contains("captcha")
}

/// Maps a raw detail response onto the submission outcome.
///
/// A `success: false` envelope is classified by its message even on a 4xx
/// status. 5xx statuses and bodies that are not an envelope are transport
/// failures. A success envelope is a success whatever its payload holds.
pub fn classify_detail_response(status: u16, body: &[u8]) -> LookupOutcome {
    if status >= 500 {
        return LookupOutcome::TransportFailure(format!("detail endpoint returned status {status}"));
    }
    let envelope = match ApiEnvelope::parse(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            return if (200..300).contains(&status) {
                LookupOutcome::TransportFailure(format!("malformed detail response: {err}"))
            } else {
                LookupOutcome::TransportFailure(format!("detail endpoint returned status {status}"))
            };
        }
    };
    if envelope.success {
        if !(200..300).contains(&status) {
            return LookupOutcome::TransportFailure(format!(
                "detail endpoint returned status {status}"
            ));
        }
        return LookupOutcome::Success(LookupRecord::new(envelope.data.unwrap_or(Value::Null)));
    }
    let message = envelope.message_text();
    if is_captcha_rejection(&message) {
        LookupOutcome::CaptchaRejected(message)
    } else {
        LookupOutcome::OtherFailure(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_heuristic_is_case_insensitive() {
        assert!(is_captcha_rejection("Captcha salah"));
        assert!(is_captcha_rejection("invalid CAPTCHA answer"));
        assert!(is_captcha_rejection("wrong captcha"));
        assert!(!is_captcha_rejection("Data peserta tidak ditemukan"));
        assert!(!is_captcha_rejection(""));
    }

    #[test]
    fn success_envelope_is_success_even_without_fields() {
        let outcome = classify_detail_response(200, br#"{"success":true,"data":{}}"#);
        assert_eq!(outcome, LookupOutcome::Success(LookupRecord::new(serde_json::json!({}))));

        let outcome = classify_detail_response(200, br#"{"success":true}"#);
        assert_eq!(outcome, LookupOutcome::Success(LookupRecord::default()));
    }

    #[test]
    fn failure_envelope_is_split_by_message() {
        assert_eq!(
            classify_detail_response(200, br#"{"success":false,"message":"Captcha tidak valid"}"#),
            LookupOutcome::CaptchaRejected("Captcha tidak valid".to_string())
        );
        assert_eq!(
            classify_detail_response(422, br#"{"success":false,"message":"wrong captcha"}"#),
            LookupOutcome::CaptchaRejected("wrong captcha".to_string())
        );
        assert_eq!(
            classify_detail_response(404, br#"{"success":false,"message":"record not found"}"#),
            LookupOutcome::OtherFailure("record not found".to_string())
        );
        assert_eq!(
            classify_detail_response(200, br#"{"success":false}"#),
            LookupOutcome::OtherFailure(UNKNOWN_ERROR.to_string())
        );
    }

    #[test]
    fn server_errors_and_garbage_are_transport_failures() {
        assert!(matches!(
            classify_detail_response(502, br#"{"success":false,"message":"captcha"}"#),
            LookupOutcome::TransportFailure(_)
        ));
        assert!(matches!(
            classify_detail_response(200, b"<html>blocked</html>"),
            LookupOutcome::TransportFailure(_)
        ));
        assert!(matches!(
            classify_detail_response(403, b"forbidden"),
            LookupOutcome::TransportFailure(_)
        ));
    }
}
