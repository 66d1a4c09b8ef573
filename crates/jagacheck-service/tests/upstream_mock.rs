use std::collections::VecDeque;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use jagacheck_core::lookup::{GatedOutcome, LookupFailure, LookupOutcome, Query, RetryBudget};
use jagacheck_service::{
    AnswerResolver, CaptchaProvider, CheckerConfig, GatedLookup, JagaClient, LookupSubmitter,
    Resolution,
};
use tiny_http::{Header, Response, Server};

const TOKEN: &str = "test-token";
// "GIF89a" so the payload looks like an image.
const IMAGE_B64: &str = "R0lGODlh";

#[derive(Debug, Clone)]
struct SeenRequest {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl SeenRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serves scripted `(status, body)` replies in order, recording each request.
struct MockUpstream {
    base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    join: Option<thread::JoinHandle<()>>,
}

impl MockUpstream {
    fn start(replies: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind mock upstream");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("mock upstream ip address");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_for_thread = seen.clone();
        let join = thread::spawn(move || {
            let mut replies: VecDeque<(u16, String)> = replies.into();
            while let Some((status, body)) = replies.pop_front() {
                let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(5)) else {
                    return;
                };
                let mut request_body = String::new();
                let _ = request.as_reader().read_to_string(&mut request_body);
                seen_for_thread.lock().expect("seen lock").push(SeenRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.to_string()))
                        .collect(),
                    body: request_body,
                });
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("content type header");
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });
        Self {
            base_url: format!("http://{addr}/api/v5/"),
            seen,
            join: Some(join),
        }
    }

    fn finish(mut self) -> Vec<SeenRequest> {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
        let seen = self.seen.lock().expect("seen lock");
        seen.clone()
    }
}

struct FixedAnswer(&'static str);

impl AnswerResolver for FixedAnswer {
    fn resolve(&mut self, _image: &[u8]) -> Resolution {
        Resolution::Answer(self.0.to_string())
    }
}

fn captcha_reply(uuid: &str) -> (u16, String) {
    (
        200,
        format!(
            r#"{{"success":true,"data":{{"uuid":"{uuid}","inline_image":"data:image/gif;base64,{IMAGE_B64}"}}}}"#
        ),
    )
}

fn detail_success() -> (u16, String) {
    (
        200,
        r#"{"success":true,"data":{"response":{"namapeserta":"BUDI SANTOSO","nmstatuspeserta":"AKTIF","nmjenispeserta":"PBI (APBN)","faskesterdaftar":"PUSKESMAS KOTA"}}}"#
            .to_string(),
    )
}

fn client_for(mock: &MockUpstream) -> JagaClient {
    let mut config = CheckerConfig::new(TOKEN);
    config.base_url = mock.base_url.clone();
    config.connect_timeout = Duration::from_secs(2);
    config.request_timeout = Duration::from_secs(5);
    JagaClient::new(&config).expect("build client")
}

fn lookup_for(mock: &MockUpstream) -> GatedLookup {
    let client = client_for(mock);
    GatedLookup::new(
        Box::new(client.clone()),
        Box::new(FixedAnswer("AB12")),
        Box::new(client),
    )
}

fn query() -> Query {
    Query::parse("3317110608050001", "2005-08-06").expect("query")
}

#[test]
fn end_to_end_success_sends_expected_requests() {
    let mock = MockUpstream::start(vec![captcha_reply("u-1"), detail_success()]);
    let mut lookup = lookup_for(&mock);
    let outcome = lookup.run(&query(), RetryBudget::default());
    let seen = mock.finish();

    match &outcome {
        GatedOutcome::Success {
            record,
            challenge_id,
            answer,
        } => {
            assert_eq!(challenge_id, "u-1");
            assert_eq!(answer, "AB12");
            assert_eq!(
                record.response_field("namapeserta").as_deref(),
                Some("BUDI SANTOSO")
            );
        }
        other => panic!("expected success, got {other:?}"),
    }

    assert_eq!(seen.len(), 2);
    let generate = &seen[0];
    assert_eq!(generate.method, "POST");
    assert_eq!(generate.url, "/api/v5/captchas/generate");
    assert_eq!(generate.body, "{}");
    assert_eq!(generate.header("Authorization"), Some("Bearer test-token"));
    assert_eq!(generate.header("Content-Type"), Some("application/json"));
    assert_eq!(generate.header("Accept"), Some("application/json"));

    let detail = &seen[1];
    assert_eq!(detail.method, "GET");
    assert_eq!(
        detail.url,
        "/api/v5/bpjs/detail?nik=3317110608050001&tgl_lahir=2005-08-06&captcha_uuid=u-1&captcha_answer=AB12"
    );
    assert_eq!(detail.header("Authorization"), Some("Bearer test-token"));
    assert!(detail.header("Content-Type").is_none());
    assert!(detail
        .header("User-Agent")
        .is_some_and(|ua| ua.contains("Mobile")));
    assert!(detail.header("Referer").is_some());
}

#[test]
fn rejected_captcha_on_4xx_is_regenerated() {
    let mock = MockUpstream::start(vec![
        captcha_reply("u-1"),
        (
            400,
            r#"{"success":false,"message":"Captcha tidak valid"}"#.to_string(),
        ),
        captcha_reply("u-2"),
        detail_success(),
    ]);
    let mut lookup = lookup_for(&mock);
    let outcome = lookup.run(&query(), RetryBudget::default());
    let seen = mock.finish();

    match outcome {
        GatedOutcome::Success { challenge_id, .. } => assert_eq!(challenge_id, "u-2"),
        other => panic!("expected success, got {other:?}"),
    }
    let generates = seen
        .iter()
        .filter(|r| r.url.ends_with("/captchas/generate"))
        .count();
    assert_eq!(generates, 2);
}

#[test]
fn other_api_failure_stops_after_one_submission() {
    let mock = MockUpstream::start(vec![
        captcha_reply("u-1"),
        (
            404,
            r#"{"success":false,"message":"Data peserta tidak ditemukan"}"#.to_string(),
        ),
    ]);
    let mut lookup = lookup_for(&mock);
    let outcome = lookup.run(&query(), RetryBudget::default());
    let seen = mock.finish();

    assert_eq!(
        outcome.failure(),
        Some(&LookupFailure::OtherApi(
            "Data peserta tidak ditemukan".to_string()
        ))
    );
    assert_eq!(seen.len(), 2);
}

#[test]
fn server_error_on_detail_is_a_transport_failure() {
    let mock = MockUpstream::start(vec![
        captcha_reply("u-1"),
        (502, "<html>bad gateway</html>".to_string()),
    ]);
    let client = client_for(&mock);
    let challenge = client.generate().expect("challenge");
    assert_eq!(challenge.id, "u-1");
    assert_eq!(challenge.image, b"GIF89a".to_vec());

    let outcome = client.submit(&query(), &challenge.id, "AB12");
    let _ = mock.finish();
    assert!(matches!(outcome, LookupOutcome::TransportFailure(_)));
}

#[test]
fn failing_provider_exhausts_the_budget() {
    let mock = MockUpstream::start(vec![
        (500, r#"{"success":false}"#.to_string()),
        (200, r#"{"success":false,"message":"rate limited"}"#.to_string()),
    ]);
    let mut lookup = lookup_for(&mock);
    let outcome = lookup.run(&query(), RetryBudget::new(2, 2));
    let seen = mock.finish();

    match outcome.failure() {
        Some(LookupFailure::Exhausted { attempts, last }) => {
            assert_eq!(*attempts, 2);
            assert!(matches!(last.as_deref(), Some(LookupFailure::Transport(_))));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|r| r.method == "POST"));
}
