use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MAX_STACK_SIZE: usize = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// What to do when a goal calls a predicate with no definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unknown {
    /// Throw `existence_error(procedure, Name/Arity)`.
    Error,
    /// Fail silently.
    Fail,
    /// Log a warning and fail.
    Warning,
}

impl FromStr for Unknown {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "fail" => Ok(Self::Fail),
            "warning" => Ok(Self::Warning),
            other => Err(format!("unknown flag value `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Limit on the number of pending choices and on continuation depth.
    pub stack_limit: usize,
    /// Wall-clock limit for a single run; `0` disables it.
    pub timeout_ms: u64,
    pub unknown: Unknown,
    pub occurs_check: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stack_limit: MAX_STACK_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            unknown: Unknown::Error,
            occurs_check: false,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}

impl EngineConfig {
    /// Defaults, overridden by `PROLOG_STACK_LIMIT`, `PROLOG_TIMEOUT_MS`,
    /// `PROLOG_UNKNOWN` and `PROLOG_OCCURS_CHECK` when set and well formed.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            stack_limit: env_parse("PROLOG_STACK_LIMIT").unwrap_or(default.stack_limit),
            timeout_ms: env_parse("PROLOG_TIMEOUT_MS").unwrap_or(default.timeout_ms),
            unknown: env_parse("PROLOG_UNKNOWN").unwrap_or(default.unknown),
            occurs_check: env_parse("PROLOG_OCCURS_CHECK").unwrap_or(default.occurs_check),
        }
    }

    pub fn is_timeout_disabled(&self) -> bool {
        self.timeout_ms == 0
    }
}
