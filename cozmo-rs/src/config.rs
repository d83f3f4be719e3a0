//! Interpreter configuration and the optional rc file.
//!
//! The rc file is a list of `key = value` settings:
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `iteration_limit` | maximum iterations of one loop | 1000 |
//! | `call_depth_limit` | maximum nesting of `call` | 64 |
//! | `await_timeout` | seconds to wait for async tasks before disconnecting | 30 |
//!
//! Lines starting with `#` are comments.  Unknown keys and bad values are
//! reported as [`ConfigError`]s and otherwise ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;

use crate::script::interp::Limits;
use crate::script::stmt::parse_seconds;

/// Environment variable naming an rc file to load instead of the default.
pub const CONFIG_ENV: &str = "COZMO_CONFIG";

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "cozmo.conf";

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub iteration_limit: u32,
    pub call_depth_limit: usize,
    pub await_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let limits = Limits::default();
        Config {
            iteration_limit: limits.iterations,
            call_depth_limit: limits.call_depth,
            await_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter limits derived from this configuration.
    pub fn limits(&self) -> Limits {
        Limits { iterations: self.iteration_limit, call_depth: self.call_depth_limit }
    }

    /// Parse an rc string on top of the defaults.
    ///
    /// Returns the config and a list of any errors; a bad line leaves the
    /// corresponding setting at its previous value.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError { line: lineno, message: format!("expected key = value: {line}") });
                continue;
            };
            if let Err(message) = config.apply(key.trim(), value.trim()) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse an rc file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "iteration_limit" => self.iteration_limit = positive(key, value)?,
            "call_depth_limit" => self.call_depth_limit = positive(key, value)?,
            "await_timeout" => {
                self.await_timeout = parse_seconds(value).map_err(|e| format!("{key}: {e}"))?;
            }
            _ => return Err(format!("unknown setting '{key}'")),
        }
        Ok(())
    }
}

fn positive<T>(key: &str, value: &str) -> Result<T, String>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(format!("{key}: expected a positive integer, got '{value}'")),
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the user rc file.
///
/// Priority: `$COZMO_CONFIG` (used even if the file is missing, so the caller
/// can report it) → `<platform config dir>/cozmo.conf` if it exists.
pub fn find_user_config() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    ProjectDirs::from("", "", "cozmo")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .filter(|p| p.is_file())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
