use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use image::{DynamicImage, GrayImage, ImageFormat};

use super::{AnswerResolver, Resolution};

pub const OCR_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

// Distance from the mean grey is doubled.
const CONTRAST_FACTOR: f32 = 2.0;

/// Opaque text recognizer: PNG bytes in, raw text out.
pub trait RecognitionEngine {
    fn recognize(&self, png: &[u8]) -> Result<String, String>;
}

/// Runs the `tesseract` binary as a single-line recognizer restricted to
/// [`OCR_CHARSET`].
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl RecognitionEngine for TesseractCli {
    fn recognize(&self, png: &[u8]) -> Result<String, String> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "--oem", "3", "--psm", "7", "-c"])
            .arg(format!("tessedit_char_whitelist={OCR_CHARSET}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| format!("failed to start {}: {err}", self.binary))?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(png) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("failed to feed image to {}: {err}", self.binary));
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|err| format!("failed to wait for {}: {err}", self.binary))?;
        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct OcrResolver<E> {
    engine: E,
}

impl<E: RecognitionEngine> OcrResolver<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl<E: RecognitionEngine> AnswerResolver for OcrResolver<E> {
    fn resolve(&mut self, image: &[u8]) -> Resolution {
        let png = match preprocess(image) {
            Ok(png) => png,
            Err(err) => {
                log::warn!("captcha image unreadable: {err}");
                return Resolution::NoAnswer(err);
            }
        };
        let raw = match self.engine.recognize(&png) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("captcha recognition failed: {err}");
                return Resolution::NoAnswer(err);
            }
        };
        let answer = clean_answer(&raw);
        if answer.is_empty() {
            log::info!("captcha recognition produced no characters");
            return Resolution::NoAnswer("empty recognition result".to_string());
        }
        log::debug!("captcha solved: {answer}");
        Resolution::Answer(answer)
    }
}

/// Grayscale plus a contrast boost, re-encoded as PNG for the engine.
fn preprocess(image: &[u8]) -> Result<Vec<u8>, String> {
    let decoded =
        image::load_from_memory(image).map_err(|err| format!("cannot decode image: {err}"))?;
    let mut gray = decoded.to_luma8();
    stretch_contrast(&mut gray, CONTRAST_FACTOR);
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| format!("cannot encode image: {err}"))?;
    Ok(out.into_inner())
}

/// Scales every pixel's distance from the image's mean grey by `factor`.
fn stretch_contrast(image: &mut GrayImage, factor: f32) {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return;
    }
    let sum: u64 = image.pixels().map(|p| u64::from(p.0[0])).sum();
    let mean = (sum as f32 / count as f32 + 0.5).floor();
    for pixel in image.pixels_mut() {
        let value = mean + factor * (f32::from(pixel.0[0]) - mean);
        pixel.0[0] = value.round().clamp(0.0, 255.0) as u8;
    }
}

/// Drops everything outside `[A-Za-z0-9]`.
pub fn clean_answer(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}
