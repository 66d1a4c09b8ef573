use reqwest::blocking::{Client, Response};
use reqwest::Method;

use super::header_profile::{build_jaga_headers, JagaHeaderInput};

pub(super) struct RequestProfile<'a> {
    pub auth_token: &'a str,
    pub user_agent: &'a str,
    pub referer: &'a str,
}

pub(super) struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub(super) fn send_jaga_request(
    client: &Client,
    method: Method,
    target_url: &str,
    profile: &RequestProfile<'_>,
    body: Option<&[u8]>,
) -> Result<RawResponse, reqwest::Error> {
    let mut builder = client.request(method, target_url);
    let header_input = JagaHeaderInput {
        auth_token: profile.auth_token,
        user_agent: profile.user_agent,
        referer: profile.referer,
        has_body: body.is_some(),
    };
    for (name, value) in build_jaga_headers(header_input) {
        builder = builder.header(name, value);
    }
    if let Some(body) = body {
        builder = builder.body(body.to_vec());
    }
    let response: Response = builder.send()?;
    let status = response.status().as_u16();
    let body = response.bytes()?.to_vec();
    Ok(RawResponse { status, body })
}
