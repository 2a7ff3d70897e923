//! Configuration loading.
//!
//! ```text
//! --config <path>  or  $HOME/.miniblog/miniblog.toml  or  built-in defaults
//!     → toml::from_str
//!     → MINIBLOG_* environment overrides
//!     → validate (all problems reported together)
//!     → Config, built once and passed by reference
//! ```
//!
//! A minimal file:
//!
//! ```toml
//! addr = ":8080"
//! mode = "release"
//!
//! [log]
//! level = "info"
//! format = "json"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ENV_ADDR: &str = "MINIBLOG_ADDR";
pub const ENV_MODE: &str = "MINIBLOG_MODE";
pub const ENV_LOG_LEVEL: &str = "MINIBLOG_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "MINIBLOG_LOG_FORMAT";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{var}={value:?} is not valid: expected one of {expected}")]
    Env {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Root configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address to listen on. `":8080"` means every interface.
    pub addr: String,

    pub mode: Mode,

    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_owned(),
            mode: Mode::default(),
            log: LogConfig::default(),
        }
    }
}

/// Operating mode. `debug` logs the route table at startup and defaults to
/// human-readable logs.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Debug,
    Release,
    Test,
}

impl FromStr for Mode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            "test" => Ok(Self::Test),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Release => "release",
            Self::Test => "test",
        })
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Omit source file and line from log lines.
    pub disable_caller: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Console,
            output: LogOutput::Stdout,
            disable_caller: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Config {
    /// Loads from `path`, or the default location, or built-in defaults, then
    /// applies the process environment and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(default_path);
        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.with_env(|var| std::env::var(var).ok())?.validated()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        toml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
    }

    /// Applies `MINIBLOG_*` overrides read through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(addr) = lookup(ENV_ADDR) {
            self.addr = addr;
        }
        if let Some(value) = lookup(ENV_MODE) {
            self.mode = value.parse().map_err(|()| ConfigError::Env {
                var: ENV_MODE,
                value,
                expected: "debug, release, test",
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            self.log.format = value.parse().map_err(|()| ConfigError::Env {
                var: ENV_LOG_FORMAT,
                value,
                expected: "console, json",
            })?;
        }
        Ok(self)
    }

    /// Checks semantic constraints serde cannot express.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();

        if self.addr.trim().is_empty() {
            problems.push("addr must not be empty".to_owned());
        } else if !self.addr.contains(':') {
            problems.push(format!("addr {:?} has no port", self.addr));
        }
        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            problems.push(format!(
                "log.level {:?} is not one of {}",
                self.log.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if problems.is_empty() { Ok(self) } else { Err(ConfigError::Invalid(problems)) }
    }

    /// The address to hand to the listener; `":8080"` becomes `"0.0.0.0:8080"`.
    pub fn bind_address(&self) -> String {
        match self.addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.addr.clone(),
        }
    }
}

fn default_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let path = PathBuf::from(home).join(".miniblog").join("miniblog.toml");
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.mode, Mode::Debug);
        assert_eq!(config.log.format, LogFormat::Console);
    }

    #[test]
    fn parses_full_file() {
        let config: Config = toml::from_str(
            r#"
            addr = ":9090"
            mode = "release"

            [log]
            level = "debug"
            format = "json"
            output = "stderr"
            disable-caller = true
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:9090");
        assert_eq!(config.mode, Mode::Release);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.output, LogOutput::Stderr);
        assert!(config.log.disable_caller);
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(toml::from_str::<Config>("adress = \":80\"").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let config = Config::default()
            .with_env(env(&[(ENV_ADDR, "127.0.0.1:3000"), (ENV_MODE, "test"), (ENV_LOG_FORMAT, "json")]))
            .unwrap();

        assert_eq!(config.addr, "127.0.0.1:3000");
        assert_eq!(config.mode, Mode::Test);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let err = Config::default().with_env(env(&[(ENV_MODE, "production")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MODE), "{err}");
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut config = Config::default();
        config.addr = "localhost".to_owned();
        config.log.level = "loud".to_owned();

        let ConfigError::Invalid(problems) = config.validated().unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(problems.len(), 2, "{problems:?}");
    }

    #[test]
    fn bind_address_passthrough() {
        let config = Config { addr: "127.0.0.1:0".to_owned(), ..Config::default() };
        assert_eq!(config.bind_address(), "127.0.0.1:0");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "{err}");
    }
}
