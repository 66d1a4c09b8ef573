use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

static TRACE_FILE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static TRACE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Append-only `key=value` event file. Disabled when no path is configured.
///
/// Subject ids never reach the file; only a short SHA-256 fingerprint does.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    path: Option<PathBuf>,
}

impl TraceLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub(crate) fn query_start(&self, trace_id: &str, subject_id: &str, max_attempts: u32) {
        self.append(format!(
            "ts={} event=QUERY_START trace_id={} subject={} max_attempts={}",
            now_ts(),
            sanitize_text(trace_id),
            subject_fingerprint(subject_id),
            max_attempts,
        ));
    }

    pub(crate) fn attempt_result(
        &self,
        trace_id: &str,
        attempt: u32,
        submission: u32,
        outcome: &str,
        detail: Option<&str>,
    ) {
        self.append(format!(
            "ts={} event=ATTEMPT_RESULT trace_id={} attempt={} submission={} outcome={} detail={}",
            now_ts(),
            sanitize_text(trace_id),
            attempt,
            submission,
            sanitize_text(outcome),
            sanitize_text(detail.unwrap_or("-")),
        ));
    }

    pub(crate) fn query_final(&self, trace_id: &str, status: &str, submissions: u32) {
        self.append(format!(
            "ts={} event=QUERY_FINAL trace_id={} status={} submissions={}",
            now_ts(),
            sanitize_text(trace_id),
            sanitize_text(status),
            submissions,
        ));
    }

    fn append(&self, line: String) {
        let Some(file_path) = self.path.as_ref() else {
            return;
        };
        let lock = TRACE_FILE_LOCK.get_or_init(|| Mutex::new(()));
        let Ok(_guard) = lock.lock() else {
            return;
        };
        let mut file = match OpenOptions::new().create(true).append(true).open(file_path) {
            Ok(file) => file,
            Err(err) => {
                log::warn!(
                    "trace open failed: path={}, err={}",
                    file_path.display(),
                    err
                );
                return;
            }
        };
        if let Err(err) = writeln!(file, "{line}") {
            log::warn!(
                "trace write failed: path={}, err={}",
                file_path.display(),
                err
            );
        }
    }
}

pub(crate) fn next_trace_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|v| v.as_millis())
        .unwrap_or(0);
    let seq = TRACE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("trc_{millis}_{seq:x}")
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|v| v.as_secs())
        .unwrap_or(0)
}

fn sanitize_text(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn subject_fingerprint(subject_id: &str) -> String {
    let digest = Sha256::digest(subject_id.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}
