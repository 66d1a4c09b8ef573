const SEC_CH_UA: &str = "\"Chromium\";v=\"137\", \"Not/A)Brand\";v=\"24\"";
const SEC_CH_UA_MOBILE: &str = "?1";
const SEC_CH_UA_PLATFORM: &str = "\"Android\"";

pub struct JagaHeaderInput<'a> {
    pub auth_token: &'a str,
    pub user_agent: &'a str,
    pub referer: &'a str,
    pub has_body: bool,
}

/// Header set the jaga.id web client sends; identical for every request of a
/// session apart from `Content-Type`.
pub fn build_jaga_headers(input: JagaHeaderInput<'_>) -> Vec<(String, String)> {
    let mut headers = Vec::with_capacity(8);
    headers.push(("Accept".to_string(), "application/json".to_string()));
    headers.push((
        "Authorization".to_string(),
        format!("Bearer {}", input.auth_token.trim()),
    ));
    if input.has_body {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    headers.push(("User-Agent".to_string(), input.user_agent.to_string()));
    if !input.referer.trim().is_empty() {
        headers.push(("Referer".to_string(), input.referer.trim().to_string()));
    }
    headers.push(("sec-ch-ua".to_string(), SEC_CH_UA.to_string()));
    headers.push(("sec-ch-ua-mobile".to_string(), SEC_CH_UA_MOBILE.to_string()));
    headers.push(("sec-ch-ua-platform".to_string(), SEC_CH_UA_PLATFORM.to_string()));
    headers
}
