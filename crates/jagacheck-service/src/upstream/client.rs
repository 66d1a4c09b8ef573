use jagacheck_core::lookup::{Challenge, LookupFailure, LookupOutcome, Query};
use reqwest::blocking::Client;
use reqwest::Method;
use thiserror::Error;

use super::captcha::{decode_inline_image, parse_captcha_response};
use super::config::{build_http_client, captcha_generate_url, detail_url, normalize_base_url};
use super::outcome::classify_detail_response;
use super::transport::{send_jaga_request, RequestProfile};
use crate::config::CheckerConfig;
use crate::gate::{CaptchaProvider, LookupSubmitter};

const EMPTY_JSON_BODY: &[u8] = b"{}";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Authenticated jaga.id session. Cheap to clone; clones share the connection
/// pool and the read-only header set.
#[derive(Clone)]
pub struct JagaClient {
    http: Client,
    base_url: String,
    auth_token: String,
    user_agent: String,
    referer: String,
}

impl JagaClient {
    pub fn new(config: &CheckerConfig) -> Result<Self, ClientError> {
        let http = build_http_client(config.connect_timeout, config.request_timeout)?;
        Ok(Self {
            http,
            base_url: normalize_base_url(&config.base_url),
            auth_token: config.bearer_token.clone(),
            user_agent: config.user_agent.clone(),
            referer: config.referer.clone(),
        })
    }

    fn profile(&self) -> RequestProfile<'_> {
        RequestProfile {
            auth_token: &self.auth_token,
            user_agent: &self.user_agent,
            referer: &self.referer,
        }
    }
}

impl CaptchaProvider for JagaClient {
    fn generate(&self) -> Result<Challenge, LookupFailure> {
        let url = captcha_generate_url(&self.base_url);
        let response = send_jaga_request(
            &self.http,
            Method::POST,
            &url,
            &self.profile(),
            Some(EMPTY_JSON_BODY),
        )
        .map_err(|err| LookupFailure::Transport(format!("captcha request failed: {}", err.without_url())))?;
        let payload =
            parse_captcha_response(response.status, &response.body).map_err(LookupFailure::Transport)?;
        let image = decode_inline_image(&payload.inline_image).map_err(LookupFailure::Transport)?;
        log::info!("captcha generated: uuid={}", payload.uuid);
        Ok(Challenge {
            id: payload.uuid,
            image,
        })
    }
}

impl LookupSubmitter for JagaClient {
    fn submit(&self, query: &Query, challenge_id: &str, answer: &str) -> LookupOutcome {
        let url = detail_url(&self.base_url, query, challenge_id, answer);
        match send_jaga_request(&self.http, Method::GET, &url, &self.profile(), None) {
            Ok(response) => classify_detail_response(response.status, &response.body),
            // The url carries the subject id, keep it out of the message.
            Err(err) => LookupOutcome::TransportFailure(format!(
                "detail request failed: {}",
                err.without_url()
            )),
        }
    }
}
