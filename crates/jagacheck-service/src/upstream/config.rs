use std::time::Duration;

use jagacheck_core::lookup::Query;
use reqwest::blocking::Client;

const CAPTCHA_GENERATE_PATH: &str = "/captchas/generate";
const DETAIL_PATH: &str = "/bpjs/detail";

pub fn normalize_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

pub(super) fn captcha_generate_url(base: &str) -> String {
    format!("{base}{CAPTCHA_GENERATE_PATH}")
}

pub(super) fn detail_url(base: &str, query: &Query, challenge_id: &str, answer: &str) -> String {
    format!(
        "{base}{DETAIL_PATH}?nik={}&tgl_lahir={}&captcha_uuid={}&captcha_answer={}",
        urlencoding::encode(&query.subject_id),
        urlencoding::encode(&query.birth_date_param()),
        urlencoding::encode(challenge_id),
        urlencoding::encode(answer),
    )
}

pub(super) fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        // Overall cap so a stalled upstream cannot block the batch forever.
        .timeout(request_timeout)
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .build()
}
