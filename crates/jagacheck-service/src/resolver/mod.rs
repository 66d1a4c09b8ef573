use std::fmt;
use std::str::FromStr;

use crate::config::CheckerConfig;

mod manual;
mod ocr;

pub use manual::InteractiveResolver;
pub use ocr::{clean_answer, OcrResolver, RecognitionEngine, TesseractCli, OCR_CHARSET};

/// What a resolver made of one challenge image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Answer(String),
    /// No usable answer; the caller should start over with a fresh challenge.
    NoAnswer(String),
    /// The operator asked to stop working on the current query.
    Cancelled,
}

pub trait AnswerResolver {
    fn resolve(&mut self, image: &[u8]) -> Resolution;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverMode {
    Ocr,
    Manual,
}

impl SolverMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolverMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ocr" | "auto" => Ok(Self::Ocr),
            "manual" | "interactive" => Ok(Self::Manual),
            other => Err(format!("unknown solver {other:?}, expected ocr or manual")),
        }
    }
}

/// Picks the resolver once, at startup; the orchestrator never knows which.
pub fn build_resolver(config: &CheckerConfig) -> Box<dyn AnswerResolver> {
    match config.solver {
        SolverMode::Ocr => Box::new(OcrResolver::new(TesseractCli::new(
            config.tesseract_bin.clone(),
        ))),
        SolverMode::Manual => Box::new(InteractiveResolver::stdio(config.captcha_dir.clone())),
    }
}
