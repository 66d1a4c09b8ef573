use std::fs;
use std::io::{self, BufRead, Stderr, StdinLock, Write};
use std::path::{Path, PathBuf};

use super::{AnswerResolver, Resolution};

/// Saves each challenge image to disk and asks the operator to type it.
///
/// An empty line asks for a fresh challenge; `q` or end of input cancels the
/// current query.
pub struct InteractiveResolver<R, W> {
    input: R,
    prompt: W,
    image_dir: PathBuf,
    shown: u32,
}

impl InteractiveResolver<StdinLock<'static>, Stderr> {
    pub fn stdio(image_dir: PathBuf) -> Self {
        Self::new(io::stdin().lock(), io::stderr(), image_dir)
    }
}

impl<R: BufRead, W: Write> InteractiveResolver<R, W> {
    pub fn new(input: R, prompt: W, image_dir: PathBuf) -> Self {
        Self {
            input,
            prompt,
            image_dir,
            shown: 0,
        }
    }

    fn save_image(&mut self, image: &[u8]) -> Result<PathBuf, String> {
        self.shown += 1;
        let ext = image::guess_format(image)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("jpg");
        fs::create_dir_all(&self.image_dir)
            .map_err(|err| format!("create {}: {err}", self.image_dir.display()))?;
        let path = self.image_dir.join(format!("captcha_{}.{ext}", self.shown));
        fs::write(&path, image).map_err(|err| format!("write {}: {err}", path.display()))?;
        Ok(path)
    }

    fn ask(&mut self, path: &Path) -> io::Result<String> {
        writeln!(self.prompt, "captcha saved to {}", path.display())?;
        write!(self.prompt, "Enter captcha text (or 'q' to quit): ")?;
        self.prompt.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line)
    }
}

impl<R: BufRead, W: Write> AnswerResolver for InteractiveResolver<R, W> {
    fn resolve(&mut self, image: &[u8]) -> Resolution {
        let path = match self.save_image(image) {
            Ok(path) => path,
            Err(err) => {
                log::warn!("cannot save captcha image: {err}");
                return Resolution::NoAnswer(err);
            }
        };
        let line = match self.ask(&path) {
            Ok(line) => line,
            Err(err) => {
                log::warn!("operator input unavailable: {err}");
                return Resolution::Cancelled;
            }
        };
        let answer = line.trim();
        if answer.eq_ignore_ascii_case("q") {
            return Resolution::Cancelled;
        }
        if answer.is_empty() {
            return Resolution::NoAnswer("empty answer".to_string());
        }
        Resolution::Answer(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{SystemTime, UNIX_EPOCH};

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "jagacheck-manual-{tag}-{}-{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn empty_line_then_answer() {
        let dir = temp_dir("answer");
        let mut prompt = Vec::new();
        let mut resolver =
            InteractiveResolver::new(Cursor::new("\n  AB12 \n"), &mut prompt, dir.clone());

        assert!(matches!(resolver.resolve(PNG_MAGIC), Resolution::NoAnswer(_)));
        assert_eq!(
            resolver.resolve(b"raw bytes"),
            Resolution::Answer("AB12".to_string())
        );
        assert_eq!(resolver.resolve(PNG_MAGIC), Resolution::Cancelled);
        drop(resolver);

        assert!(dir.join("captcha_1.png").exists());
        assert!(dir.join("captcha_2.jpg").exists());
        let shown = String::from_utf8(prompt).expect("utf8 prompt");
        assert_eq!(shown.matches("Enter captcha text").count(), 3);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn quit_cancels() {
        let dir = temp_dir("quit");
        let mut resolver = InteractiveResolver::new(Cursor::new("Q\n"), io::sink(), dir.clone());
        assert_eq!(resolver.resolve(PNG_MAGIC), Resolution::Cancelled);
        let _ = fs::remove_dir_all(dir);
    }
}
