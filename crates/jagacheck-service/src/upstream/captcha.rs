use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::outcome::ApiEnvelope;

pub(super) struct CaptchaPayload {
    pub uuid: String,
    pub inline_image: String,
}

pub(super) fn parse_captcha_response(status: u16, body: &[u8]) -> Result<CaptchaPayload, String> {
    if !(200..300).contains(&status) {
        return Err(format!("captcha endpoint returned status {status}"));
    }
    let envelope =
        ApiEnvelope::parse(body).map_err(|err| format!("malformed captcha response: {err}"))?;
    if !envelope.success {
        return Err(format!(
            "captcha endpoint reported failure: {}",
            envelope.message_text()
        ));
    }
    let data = envelope
        .data
        .ok_or_else(|| "captcha response missing data".to_string())?;
    let field = |key: &str| {
        data.get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("captcha response missing {key}"))
    };
    Ok(CaptchaPayload {
        uuid: field("uuid")?,
        inline_image: field("inline_image")?,
    })
}

/// Accepts a data URI (`data:image/jpeg;base64,...`) or bare base64.
pub fn decode_inline_image(inline_image: &str) -> Result<Vec<u8>, String> {
    let encoded = match inline_image.split_once(',') {
        Some((_, rest)) => rest,
        None => inline_image,
    };
    let compact: String = encoded.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return Err("inline image is empty".to_string());
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| format!("inline image is not valid base64: {err}"))
}
