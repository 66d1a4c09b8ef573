pub mod batch;
pub mod config;
pub mod gate;
pub mod resolver;
mod trace_log;
pub mod upstream;

pub use batch::{BatchDriver, BatchReport};
pub use config::{CheckerConfig, ConfigError};
pub use gate::{CaptchaProvider, GatedLookup, LookupSubmitter};
pub use resolver::{AnswerResolver, Resolution, SolverMode};
pub use trace_log::TraceLog;
pub use upstream::{ClientError, JagaClient};

/// Orchestrator against the live API with the configured resolver.
pub fn build_lookup(config: &CheckerConfig) -> Result<GatedLookup, ClientError> {
    let client = JagaClient::new(config)?;
    let lookup = GatedLookup::new(
        Box::new(client.clone()),
        resolver::build_resolver(config),
        Box::new(client),
    )
    .with_backoff(config.backoff)
    .with_trace(TraceLog::new(config.trace_log.clone()));
    log::info!(
        "lookup ready: base_url={}, solver={}, max_attempts={}",
        config.base_url,
        config.solver,
        config.budget.max_attempts
    );
    Ok(lookup)
}

pub fn build_batch_driver(config: &CheckerConfig) -> Result<BatchDriver, ClientError> {
    Ok(BatchDriver::new(
        build_lookup(config)?,
        config.budget,
        config.query_delay,
    ))
}
