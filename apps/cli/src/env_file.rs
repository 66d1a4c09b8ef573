use std::path::{Path, PathBuf};

// First match wins, current directory before the executable's directory.
const CANDIDATES: [&str; 2] = ["jagacheck.env", ".env"];

/// What loading the env file did. The loader runs before logging is set up
/// (the file may carry `RUST_LOG`), so messages are kept for [`EnvLoad::log`].
#[derive(Debug, Default)]
pub struct EnvLoad {
  pub path: Option<PathBuf>,
  pub applied: usize,
  pub warnings: Vec<String>,
}

impl EnvLoad {
  pub fn log(&self) {
    for warning in &self.warnings {
      log::warn!("{warning}");
    }
    if let (Some(path), true) = (&self.path, self.applied > 0) {
      log::info!("Loaded {} env vars from {}", self.applied, path.display());
    }
  }
}

/// Loads `KEY=VALUE` pairs into the process environment. An explicit path
/// wins over the search. Variables that are already set are left alone.
pub fn load_env_file(explicit: Option<&Path>) -> EnvLoad {
  let mut load = EnvLoad::default();
  let path = match explicit {
    Some(path) => path.to_path_buf(),
    None => match find_env_file(&mut load.warnings) {
      Some(path) => path,
      None => return load,
    },
  };

  let bytes = match std::fs::read(&path) {
    Ok(v) => v,
    Err(err) => {
      load
        .warnings
        .push(format!("Failed to read env file {}: {}", path.display(), err));
      return load;
    }
  };
  let content = String::from_utf8_lossy(&bytes);
  for (_, key, value) in parse_env_lines(&content, &path, &mut load.warnings) {
    if std::env::var_os(&key).is_some() {
      continue;
    }
    std::env::set_var(&key, value);
    load.applied += 1;
  }
  load.path = Some(path);
  load
}

fn find_env_file(warnings: &mut Vec<String>) -> Option<PathBuf> {
  let mut dirs = Vec::new();
  if let Ok(cwd) = std::env::current_dir() {
    dirs.push(cwd);
  }
  match std::env::current_exe() {
    Ok(exe) => {
      if let Some(dir) = exe.parent() {
        dirs.push(dir.to_path_buf());
      }
    }
    Err(err) => warnings.push(format!("Failed to resolve current exe path: {}", err)),
  }
  dirs
    .iter()
    .flat_map(|dir| CANDIDATES.iter().map(move |name| dir.join(name)))
    .find(|p| p.is_file())
}

fn parse_env_lines(
  content: &str,
  path: &Path,
  warnings: &mut Vec<String>,
) -> Vec<(usize, String, String)> {
  let mut pairs = Vec::new();
  for (idx, raw_line) in content.lines().enumerate() {
    let line_no = idx + 1;
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
      continue;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let Some((key_raw, value_raw)) = line.split_once('=') else {
      warnings.push(format!(
        "Skip invalid env line {}:{} (missing '=')",
        path.display(),
        line_no
      ));
      continue;
    };
    let key = key_raw.trim();
    if key.is_empty() {
      continue;
    }
    let mut value = value_raw.trim().to_string();
    if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
      || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
    {
      value = value[1..value.len() - 1].to_string();
    }
    pairs.push((line_no, key.to_string(), value));
  }
  pairs
}
