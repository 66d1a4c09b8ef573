use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use jagacheck_core::lookup::RetryBudget;
use thiserror::Error;

use crate::resolver::SolverMode;

pub const DEFAULT_BASE_URL: &str = "https://jaga.id/api/v5";
pub const DEFAULT_REFERER: &str = "https://jaga.id/pelayanan-publik/fasilitas-kesehatan";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Mobile Safari/537.36";
const DEFAULT_BACKOFF_MS: u64 = 2_000;
const DEFAULT_QUERY_DELAY_MS: u64 = 3_000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TESSERACT_BIN: &str = "tesseract";

pub const ENV_AUTH_TOKEN: &str = "JAGA_AUTH_TOKEN";
pub const ENV_BASE_URL: &str = "JAGA_BASE_URL";
const ENV_REFERER: &str = "JAGA_REFERER";
const ENV_USER_AGENT: &str = "JAGA_USER_AGENT";
const ENV_MAX_ATTEMPTS: &str = "JAGA_MAX_ATTEMPTS";
const ENV_CAPTCHA_REGENERATIONS: &str = "JAGA_CAPTCHA_REGENERATIONS";
const ENV_BACKOFF_MS: &str = "JAGA_BACKOFF_MS";
const ENV_QUERY_DELAY_MS: &str = "JAGA_QUERY_DELAY_MS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "JAGA_CONNECT_TIMEOUT_SECS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "JAGA_REQUEST_TIMEOUT_SECS";
const ENV_SOLVER: &str = "JAGA_SOLVER";
const ENV_CAPTCHA_DIR: &str = "JAGA_CAPTCHA_DIR";
const ENV_TESSERACT_BIN: &str = "JAGA_TESSERACT_BIN";
const ENV_TRACE_LOG: &str = "JAGA_TRACE_LOG";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bearer token is required: set JAGA_AUTH_TOKEN or pass --token")]
    MissingToken,
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct CheckerConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub referer: String,
    pub user_agent: String,
    pub budget: RetryBudget,
    pub backoff: Duration,
    pub query_delay: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub solver: SolverMode,
    pub captcha_dir: PathBuf,
    pub tesseract_bin: String,
    pub trace_log: Option<PathBuf>,
}

impl fmt::Debug for CheckerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckerConfig")
            .field("base_url", &self.base_url)
            .field("bearer_token", &"<redacted>")
            .field("referer", &self.referer)
            .field("user_agent", &self.user_agent)
            .field("budget", &self.budget)
            .field("backoff", &self.backoff)
            .field("query_delay", &self.query_delay)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("solver", &self.solver)
            .field("captcha_dir", &self.captcha_dir)
            .field("tesseract_bin", &self.tesseract_bin)
            .field("trace_log", &self.trace_log)
            .finish()
    }
}

impl CheckerConfig {
    /// Defaults for everything except the token.
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: bearer_token.into(),
            referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            budget: RetryBudget::default(),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            query_delay: Duration::from_millis(DEFAULT_QUERY_DELAY_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            solver: SolverMode::Ocr,
            captcha_dir: PathBuf::from("."),
            tesseract_bin: DEFAULT_TESSERACT_BIN.to_string(),
            trace_log: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let token = get(ENV_AUTH_TOKEN).ok_or(ConfigError::MissingToken)?;
        let mut config = Self::new(token);

        if let Some(base) = get(ENV_BASE_URL) {
            config.base_url = base;
        }
        if let Some(referer) = get(ENV_REFERER) {
            config.referer = referer;
        }
        if let Some(user_agent) = get(ENV_USER_AGENT) {
            config.user_agent = user_agent;
        }
        config.budget = RetryBudget::new(
            parse_or(get(ENV_MAX_ATTEMPTS), config.budget.max_attempts),
            parse_or(
                get(ENV_CAPTCHA_REGENERATIONS),
                config.budget.captcha_regenerations,
            ),
        );
        config.backoff = Duration::from_millis(parse_or(get(ENV_BACKOFF_MS), DEFAULT_BACKOFF_MS));
        config.query_delay =
            Duration::from_millis(parse_or(get(ENV_QUERY_DELAY_MS), DEFAULT_QUERY_DELAY_MS));
        config.connect_timeout = Duration::from_secs(parse_or(
            get(ENV_CONNECT_TIMEOUT_SECS),
            DEFAULT_CONNECT_TIMEOUT_SECS,
        ));
        config.request_timeout = Duration::from_secs(parse_or(
            get(ENV_REQUEST_TIMEOUT_SECS),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ));
        if let Some(solver) = get(ENV_SOLVER) {
            config.solver = solver.parse().map_err(|reason| ConfigError::Invalid {
                name: ENV_SOLVER,
                reason,
            })?;
        }
        if let Some(dir) = get(ENV_CAPTCHA_DIR) {
            config.captcha_dir = PathBuf::from(dir);
        }
        if let Some(bin) = get(ENV_TESSERACT_BIN) {
            config.tesseract_bin = bin;
        }
        config.trace_log = get(ENV_TRACE_LOG).map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bearer_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.budget.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_MAX_ATTEMPTS,
                reason: "must be at least 1".to_string(),
            });
        }
        let base = self.base_url.trim().to_ascii_lowercase();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: ENV_BASE_URL,
                reason: format!("expected an http(s) url, got {:?}", self.base_url),
            });
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
