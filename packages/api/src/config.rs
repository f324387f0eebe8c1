//! Service configuration with `SCREENING_*` environment overrides.

use std::str::FromStr;
use std::time::Duration;

use actors::{GatewayConfig, OrchestratorSettings};
use db::DbConfig;
use screening_core::{DEFAULT_PROMOTION_MIN_SCORE, ScreeningError, ScreeningResult};
use serde::Deserialize;

/// Scorer call policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Per-attempt timeout; `None` waits as long as the scorer takes.
    pub timeout_secs: Option<u64>,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(120),
            max_attempts: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl ScorerConfig {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            timeout: self.timeout_secs.map(Duration::from_secs),
            max_attempts: self.max_attempts.max(1),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Top-level configuration of the screening service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Size of the worker pool.
    pub workers: usize,
    /// Start workers at all. Without them analyses are only queued.
    pub process_queue: bool,
    pub poll_interval_ms: u64,
    /// How often the supervisor reconciles its backlog with the store.
    pub tick_interval_secs: u64,
    /// Pending analyses allowed per job before submissions are refused.
    pub max_pending_per_job: Option<u64>,
    pub promotion_min_score: f64,
    pub parser_attempts: u32,
    pub scorer: ScorerConfig,
    pub db: DbConfig,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            process_queue: true,
            poll_interval_ms: 100,
            tick_interval_secs: 30,
            max_pending_per_job: None,
            promotion_min_score: DEFAULT_PROMOTION_MIN_SCORE,
            parser_attempts: 2,
            scorer: ScorerConfig::default(),
            db: DbConfig::default(),
        }
    }
}

impl ScreeningConfig {
    /// Defaults overlaid with `SCREENING_*` environment variables.
    pub fn from_env() -> ScreeningResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// Recognized keys:
    /// - `SCREENING_WORKERS`, `SCREENING_POLL_INTERVAL_MS`, `SCREENING_TICK_INTERVAL_SECS`
    /// - `SCREENING_MAX_PENDING` (0 disables the limit)
    /// - `SCREENING_PROMOTION_MIN_SCORE`, `SCREENING_PARSER_ATTEMPTS`
    /// - `SCREENING_SCORER_TIMEOUT_SECS` (0 disables the timeout),
    ///   `SCREENING_SCORER_MAX_ATTEMPTS`, `SCREENING_SCORER_RETRY_BACKOFF_MS`
    /// - `SCREENING_DB_ENDPOINT` or `SCREENING_DB_PATH` (RocksDB directory),
    ///   `SCREENING_DB_NAMESPACE`, `SCREENING_DB_DATABASE`,
    ///   `SCREENING_DB_USER` with `SCREENING_DB_PASS`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ScreeningResult<Self> {
        let mut config = Self::default();
        let vars = Vars(&lookup);

        if let Some(workers) = vars.parse("SCREENING_WORKERS")? {
            config.workers = workers;
        }
        if let Some(ms) = vars.parse("SCREENING_POLL_INTERVAL_MS")? {
            config.poll_interval_ms = ms;
        }
        if let Some(secs) = vars.parse("SCREENING_TICK_INTERVAL_SECS")? {
            config.tick_interval_secs = secs;
        }
        if let Some(max) = vars.parse::<u64>("SCREENING_MAX_PENDING")? {
            config.max_pending_per_job = (max > 0).then_some(max);
        }
        if let Some(score) = vars.parse("SCREENING_PROMOTION_MIN_SCORE")? {
            config.promotion_min_score = score;
        }
        if let Some(attempts) = vars.parse("SCREENING_PARSER_ATTEMPTS")? {
            config.parser_attempts = attempts;
        }

        if let Some(secs) = vars.parse::<u64>("SCREENING_SCORER_TIMEOUT_SECS")? {
            config.scorer.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(attempts) = vars.parse("SCREENING_SCORER_MAX_ATTEMPTS")? {
            config.scorer.max_attempts = attempts;
        }
        if let Some(ms) = vars.parse("SCREENING_SCORER_RETRY_BACKOFF_MS")? {
            config.scorer.retry_backoff_ms = ms;
        }

        if let Some(endpoint) = vars.get("SCREENING_DB_ENDPOINT") {
            config.db.endpoint = endpoint;
        } else if let Some(path) = vars.get("SCREENING_DB_PATH") {
            config.db = DbConfig::rocksdb(path);
        }
        if let Some(namespace) = vars.get("SCREENING_DB_NAMESPACE") {
            config.db = config.db.with_namespace(namespace);
        }
        if let Some(database) = vars.get("SCREENING_DB_DATABASE") {
            config.db = config.db.with_database(database);
        }
        if let (Some(user), Some(pass)) = (vars.get("SCREENING_DB_USER"), vars.get("SCREENING_DB_PASS")) {
            config.db = config.db.with_credentials(user, pass);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> ScreeningResult<()> {
        if self.workers == 0 {
            return Err(ScreeningError::validation("workers must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.promotion_min_score) {
            return Err(ScreeningError::validation(format!(
                "promotion_min_score {} is outside 0..=100",
                self.promotion_min_score
            )));
        }
        if self.db.endpoint.is_empty() {
            return Err(ScreeningError::validation("database endpoint is required"));
        }
        Ok(())
    }

    /// Workers to start, zero when the queue is not processed.
    pub fn pool_size(&self) -> usize {
        if self.process_queue { self.workers } else { 0 }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            promotion_min_score: self.promotion_min_score,
            parser_attempts: self.parser_attempts.max(1),
            ..Default::default()
        }
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> ScreeningResult<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| ScreeningError::validation(format!("{key}={raw}: {e}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = ScreeningConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ScreeningConfig::default());
        assert_eq!(config.workers, 4);
        assert_eq!(config.scorer.gateway_config(), GatewayConfig::default());
        assert!(config.db.is_memory());
    }

    #[test]
    fn environment_overrides() {
        let config = ScreeningConfig::from_lookup(lookup(&[
            ("SCREENING_WORKERS", "8"),
            ("SCREENING_MAX_PENDING", "25"),
            ("SCREENING_SCORER_TIMEOUT_SECS", "0"),
            ("SCREENING_DB_PATH", "/var/lib/screening"),
            ("SCREENING_DB_NAMESPACE", "hr"),
        ]))
        .unwrap();

        assert_eq!(config.workers, 8);
        assert_eq!(config.max_pending_per_job, Some(25));
        assert_eq!(config.scorer.timeout_secs, None);
        assert_eq!(config.db.endpoint, "rocksdb:///var/lib/screening");
        assert_eq!(config.db.namespace, "hr");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = ScreeningConfig::from_lookup(lookup(&[("SCREENING_WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, ScreeningError::Validation(_)));

        let err = ScreeningConfig::from_lookup(lookup(&[("SCREENING_WORKERS", "0")])).unwrap_err();
        assert!(matches!(err, ScreeningError::Validation(_)));

        let err =
            ScreeningConfig::from_lookup(lookup(&[("SCREENING_PROMOTION_MIN_SCORE", "120")])).unwrap_err();
        assert!(matches!(err, ScreeningError::Validation(_)));
    }
}
