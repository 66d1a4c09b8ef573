//! `jagacheck`: BPJS participant lookups through the jaga.id captcha gate.
//!
//! Configuration comes from `JAGA_*` environment variables, optionally loaded
//! from `jagacheck.env`/`.env`. Flags override the environment.

mod env_file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use jagacheck_core::lookup::Query;
use jagacheck_core::persist::{
  read_queries_csv, save_results_csv, save_results_json, write_sample_queries_csv, PersistError,
};
use jagacheck_core::record::{BatchSummary, ResultRecord};
use jagacheck_service::config::ENV_AUTH_TOKEN;
use jagacheck_service::{
  build_batch_driver, CheckerConfig, ClientError, ConfigError, SolverMode,
};
use thiserror::Error;

const DEFAULT_SAMPLE_PATH: &str = "input_nik.csv";
const DEFAULT_BATCH_JSON: &str = "bpjs_results.json";
const DEFAULT_BATCH_CSV: &str = "bpjs_results.csv";

#[derive(Debug, Parser)]
#[command(
  name = "jagacheck",
  version,
  about = "Check BPJS participant status through the jaga.id captcha-gated API"
)]
struct Cli {
  /// Bearer token; overrides JAGA_AUTH_TOKEN.
  #[arg(long, global = true)]
  token: Option<String>,
  /// Env file to load instead of searching for jagacheck.env/.env.
  #[arg(long, global = true)]
  env_file: Option<PathBuf>,
  /// Type captcha answers by hand instead of running OCR.
  #[arg(long, global = true)]
  manual: bool,
  #[arg(long, global = true)]
  max_attempts: Option<u32>,
  /// Pause between batch queries, in milliseconds.
  #[arg(long, global = true)]
  delay_ms: Option<u64>,
  /// Write results as JSON (batch default: bpjs_results.json).
  #[arg(long, global = true)]
  json: Option<PathBuf>,
  /// Write results as CSV (batch default: bpjs_results.csv).
  #[arg(long, global = true)]
  csv: Option<PathBuf>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Look up a single participant.
  Check {
    #[arg(long)]
    nik: String,
    /// Birth date, YYYY-MM-DD.
    #[arg(long)]
    dob: String,
  },
  /// Look up every row of a CSV file with subject_id,birth_date columns.
  Batch { input: PathBuf },
  /// Write a sample input CSV.
  Sample {
    #[arg(default_value = DEFAULT_SAMPLE_PATH)]
    path: PathBuf,
  },
}

#[derive(Debug, Error)]
enum CliError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Client(#[from] ClientError),
  #[error(transparent)]
  Persist(#[from] PersistError),
  #[error("invalid query: {0}")]
  InvalidQuery(String),
  #[error("failed to render output: {0}")]
  Render(#[from] serde_json::Error),
}

impl CliError {
  fn exit_code(&self) -> i32 {
    2
  }
}

fn main() {
  let cli = Cli::parse();
  // Before the subscriber, so RUST_LOG from the env file takes effect.
  let env = env_file::load_env_file(cli.env_file.as_deref());
  init_logging();
  env.log();

  if let Err(err) = run(cli) {
    eprintln!("Error: {err}");
    std::process::exit(err.exit_code());
  }
}

fn init_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into()),
    )
    .with_writer(std::io::stderr)
    .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
  match &cli.command {
    Command::Sample { path } => {
      let rows = write_sample_queries_csv(path)?;
      println!("wrote {rows} sample rows to {}", path.display());
      Ok(())
    }
    Command::Check { nik, dob } => {
      let query = Query::parse(nik, dob).map_err(CliError::InvalidQuery)?;
      let config = build_config(&cli)?;
      let mut driver = build_batch_driver(&config)?;
      let record = driver.check(&query);
      println!("{}", serde_json::to_string_pretty(&record)?);
      save_outputs(cli.json.as_deref(), cli.csv.as_deref(), &[record])
    }
    Command::Batch { input } => {
      let batch = read_queries_csv(input)?;
      for skipped in &batch.skipped {
        log::warn!(
          "skipping {} line {}: {}",
          input.display(),
          skipped.line,
          skipped.reason
        );
      }
      log::info!("loaded {} queries from {}", batch.queries.len(), input.display());
      let config = build_config(&cli)?;
      let mut driver = build_batch_driver(&config)?;
      let report = driver.run_with(&batch.queries, |_, record| {
        match serde_json::to_string(record) {
          Ok(line) => println!("{line}"),
          Err(err) => log::warn!("failed to render record: {err}"),
        }
      });
      let (json, csv) = batch_output_paths(&cli);
      save_outputs(Some(&json), Some(&csv), &report.records)?;
      println!("{}", summary_line(&report.summary));
      Ok(())
    }
  }
}

fn build_config(cli: &Cli) -> Result<CheckerConfig, CliError> {
  let mut config = CheckerConfig::from_source(|name| {
    if name == ENV_AUTH_TOKEN {
      if let Some(token) = cli.token.clone() {
        return Some(token);
      }
    }
    std::env::var(name).ok()
  })?;
  if cli.manual {
    config.solver = SolverMode::Manual;
  }
  if let Some(max_attempts) = cli.max_attempts {
    config.budget.max_attempts = max_attempts;
  }
  if let Some(delay_ms) = cli.delay_ms {
    config.query_delay = Duration::from_millis(delay_ms);
  }
  config.validate()?;
  log::debug!("config: {config:?}");
  Ok(config)
}

fn save_outputs(
  json: Option<&Path>,
  csv: Option<&Path>,
  records: &[ResultRecord],
) -> Result<(), CliError> {
  if let Some(path) = json {
    save_results_json(path, records)?;
    log::info!("saved {} records to {}", records.len(), path.display());
  }
  if let Some(path) = csv {
    save_results_csv(path, records)?;
    log::info!("saved {} records to {}", records.len(), path.display());
  }
  Ok(())
}

fn batch_output_paths(cli: &Cli) -> (PathBuf, PathBuf) {
  let json = cli
    .json
    .clone()
    .unwrap_or_else(|| PathBuf::from(DEFAULT_BATCH_JSON));
  let csv = cli
    .csv
    .clone()
    .unwrap_or_else(|| PathBuf::from(DEFAULT_BATCH_CSV));
  (json, csv)
}

fn summary_line(summary: &BatchSummary) -> String {
  format!(
    "total={} succeeded={} failed={} success_rate={:.1}%",
    summary.total,
    summary.succeeded,
    summary.failed,
    summary.success_rate() * 100.0
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
      "jagacheck",
      "batch",
      "input.csv",
      "--manual",
      "--max-attempts",
      "3",
      "--csv",
      "out.csv",
    ])
    .expect("parse");
    assert!(cli.manual);
    assert_eq!(cli.max_attempts, Some(3));
    assert_eq!(cli.csv, Some(PathBuf::from("out.csv")));
    assert!(matches!(cli.command, Command::Batch { ref input } if input == Path::new("input.csv")));
  }

  #[test]
  fn batch_writes_json_and_csv_by_default() {
    let cli = Cli::try_parse_from(["jagacheck", "batch", "input.csv"]).expect("parse");
    assert_eq!(
      batch_output_paths(&cli),
      (
        PathBuf::from(DEFAULT_BATCH_JSON),
        PathBuf::from(DEFAULT_BATCH_CSV)
      )
    );

    let cli = Cli::try_parse_from([
      "jagacheck",
      "batch",
      "input.csv",
      "--json",
      "out.json",
      "--csv",
      "out.csv",
    ])
    .expect("parse");
    assert_eq!(
      batch_output_paths(&cli),
      (PathBuf::from("out.json"), PathBuf::from("out.csv"))
    );
  }

  #[test]
  fn summary_line_reports_success_rate() {
    let summary = BatchSummary {
      total: 3,
      succeeded: 2,
      failed: 1,
    };
    assert_eq!(
      summary_line(&summary),
      "total=3 succeeded=2 failed=1 success_rate=66.7%"
    );
    assert_eq!(
      summary_line(&BatchSummary::default()),
      "total=0 succeeded=0 failed=0 success_rate=0.0%"
    );
  }

  #[test]
  fn sample_defaults_path() {
    let cli = Cli::try_parse_from(["jagacheck", "sample"]).expect("parse");
    assert!(
      matches!(cli.command, Command::Sample { ref path } if path == Path::new(DEFAULT_SAMPLE_PATH))
    );
  }

  #[test]
  fn check_requires_both_fields() {
    assert!(Cli::try_parse_from(["jagacheck", "check", "--nik", "1"]).is_err());
  }

  #[test]
  fn token_flag_and_overrides_apply() {
    let cli = Cli::try_parse_from([
      "jagacheck",
      "--token",
      "flag-token",
      "--delay-ms",
      "0",
      "--max-attempts",
      "2",
      "check",
      "--nik",
      "3317110608050001",
      "--dob",
      "2005-08-06",
    ])
    .expect("parse");
    let config = build_config(&cli).expect("config");
    assert_eq!(config.bearer_token, "flag-token");
    assert_eq!(config.budget.max_attempts, 2);
    assert_eq!(config.query_delay, Duration::ZERO);
  }

  #[test]
  fn zero_attempts_is_rejected() {
    let cli = Cli::try_parse_from([
      "jagacheck",
      "--token",
      "t",
      "--max-attempts",
      "0",
      "sample",
    ])
    .expect("parse");
    assert!(matches!(build_config(&cli), Err(CliError::Config(_))));
  }
}
