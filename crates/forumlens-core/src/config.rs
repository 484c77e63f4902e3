//! Pipeline configuration.

use std::time::Duration;

use crate::domain::{PipelineError, Result};

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 1;
pub const DEFAULT_MAX_ROUNDS: usize = 8;

pub const ENV_CHUNK_BUDGET: &str = "FORUMLENS_CHUNK_BUDGET";
pub const ENV_CATEGORY_COUNT: &str = "FORUMLENS_CATEGORY_COUNT";
pub const ENV_CONCURRENCY: &str = "FORUMLENS_ORACLE_CONCURRENCY";
pub const ENV_TIMEOUT_SECS: &str = "FORUMLENS_ORACLE_TIMEOUT_SECS";
pub const ENV_MAX_ROUNDS: &str = "FORUMLENS_MAX_ROUNDS";

/// Knobs of one reduction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum summed token cost of one oracle request.
    pub chunk_budget: usize,
    /// Number of categories requested from every call.
    pub category_count: usize,
    /// Maximum concurrent chunk-level calls.
    pub oracle_concurrency_limit: usize,
    /// Deadline for each oracle call.
    pub oracle_timeout: Duration,
    /// Chunk phases allowed before giving up.
    pub max_rounds: usize,
}

impl PipelineConfig {
    pub fn new(chunk_budget: usize, category_count: usize, oracle_timeout: Duration) -> Self {
        Self {
            chunk_budget,
            category_count,
            oracle_concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            oracle_timeout,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.oracle_concurrency_limit = limit;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Reject zero budgets, counts, limits and timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_budget == 0 {
            return Err(config_error("chunk_budget must be greater than zero"));
        }
        if self.category_count == 0 {
            return Err(config_error("category_count must be greater than zero"));
        }
        if self.oracle_concurrency_limit == 0 {
            return Err(config_error(
                "oracle_concurrency_limit must be greater than zero",
            ));
        }
        if self.oracle_timeout.is_zero() {
            return Err(config_error("oracle_timeout must be greater than zero"));
        }
        if self.max_rounds == 0 {
            return Err(config_error("max_rounds must be greater than zero"));
        }
        Ok(())
    }

    /// Build from `FORUMLENS_*` environment variables.
    ///
    /// Budget, category count and timeout are required; concurrency defaults
    /// to 1 and max rounds to 8.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_overrides(&[])
    }

    /// [`PipelineConfig::from_env`] with `(variable, value)` pairs taking
    /// precedence over the environment, e.g. values given as CLI flags.
    pub fn from_env_with_overrides(overrides: &[(&str, String)]) -> Result<Self> {
        Self::from_lookup(overlay(overrides, |name| std::env::var(name).ok()))
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<usize> {
            let raw = lookup(name).ok_or_else(|| config_error(format!("{name} is not set")))?;
            parse_positive(name, &raw)
        };
        let optional = |name: &str, default: usize| -> Result<usize> {
            match lookup(name) {
                Some(raw) => parse_positive(name, &raw),
                None => Ok(default),
            }
        };

        let config = Self {
            chunk_budget: required(ENV_CHUNK_BUDGET)?,
            category_count: required(ENV_CATEGORY_COUNT)?,
            oracle_concurrency_limit: optional(ENV_CONCURRENCY, DEFAULT_CONCURRENCY_LIMIT)?,
            oracle_timeout: Duration::from_secs(required(ENV_TIMEOUT_SECS)? as u64),
            max_rounds: optional(ENV_MAX_ROUNDS, DEFAULT_MAX_ROUNDS)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn overlay<'a, F>(
    overrides: &'a [(&'a str, String)],
    base: F,
) -> impl Fn(&str) -> Option<String> + 'a
where
    F: Fn(&str) -> Option<String> + 'a,
{
    move |name| {
        overrides
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.clone())
            .or_else(|| base(name))
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<usize> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| config_error(format!("{name} must be an integer, got {raw:?}")))?;
    if value <= 0 {
        return Err(config_error(format!(
            "{name} must be greater than zero, got {value}"
        )));
    }
    usize::try_from(value).map_err(|_| config_error(format!("{name} is out of range")))
}

fn config_error(msg: impl Into<String>) -> PipelineError {
    PipelineError::Configuration(msg.into())
}
