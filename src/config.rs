//! Limiter configuration.
//!
//! Values can come from serde (a config file section), from `ESIGUARD_*`
//! environment variables, or from the [`LimiterConfig::batch`] and
//! [`LimiterConfig::interactive`] presets.

use serde::{Deserialize, Serialize};

/// Default error-limit threshold for batch jobs.
pub const BATCH_ERROR_LIMIT_THRESHOLD: i64 = 10;

/// Default error-limit threshold for interactive callers, kept higher so that
/// batch jobs still get a share of the budget.
pub const INTERACTIVE_ERROR_LIMIT_THRESHOLD: i64 = 15;

pub const DEFAULT_ESI_HOST: &str = "https://esi.evetech.net";

/// Errors produced while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// The gate blocks while the remaining error budget is below this value.
    pub error_limit_threshold: i64,
    /// Upper bound for any wait caused by the error limit.
    pub error_limit_max_wait_secs: i64,
    /// Block duration after a 429 without a usable `Retry-After`.
    pub default_retry_after_secs: i64,
    /// Block duration after a throttled response.
    pub throttle_secs: i64,
    /// Base URL prepended to ESI paths.
    pub esi_host: String,
    /// Value for the `X-Compatibility-Date` request header.
    pub compatibility_date: Option<String>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            error_limit_threshold: BATCH_ERROR_LIMIT_THRESHOLD,
            error_limit_max_wait_secs: 60,
            default_retry_after_secs: 60,
            throttle_secs: 60,
            esi_host: DEFAULT_ESI_HOST.to_string(),
            compatibility_date: None,
        }
    }
}

impl LimiterConfig {
    /// Settings for background jobs that may sleep.
    pub fn batch() -> Self {
        Self::default()
    }

    /// Settings for request handlers that fail fast.
    pub fn interactive() -> Self {
        Self { error_limit_threshold: INTERACTIVE_ERROR_LIMIT_THRESHOLD, ..Self::default() }
    }

    pub fn with_error_limit_threshold(mut self, threshold: i64) -> Self {
        self.error_limit_threshold = threshold;
        self
    }

    /// Batch defaults with overrides from the process environment.
    ///
    /// Recognised variables: `ESIGUARD_ERROR_LIMIT_THRESHOLD`,
    /// `ESIGUARD_ERROR_LIMIT_MAX_WAIT`, `ESIGUARD_DEFAULT_RETRY_AFTER`,
    /// `ESIGUARD_THROTTLE_SECS`, `ESIGUARD_ESI_HOST`, `ESIGUARD_COMPATIBILITY_DATE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let int = |var: &'static str, current: i64| -> Result<i64, ConfigError> {
            match lookup(var) {
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|v| *v >= 0)
                    .ok_or(ConfigError::Invalid { var, value: raw }),
                None => Ok(current),
            }
        };

        self.error_limit_threshold =
            int("ESIGUARD_ERROR_LIMIT_THRESHOLD", self.error_limit_threshold)?;
        self.error_limit_max_wait_secs =
            int("ESIGUARD_ERROR_LIMIT_MAX_WAIT", self.error_limit_max_wait_secs)?;
        self.default_retry_after_secs =
            int("ESIGUARD_DEFAULT_RETRY_AFTER", self.default_retry_after_secs)?;
        self.throttle_secs = int("ESIGUARD_THROTTLE_SECS", self.throttle_secs)?;

        if let Some(host) = lookup("ESIGUARD_ESI_HOST") {
            if host.trim().is_empty() {
                return Err(ConfigError::Invalid { var: "ESIGUARD_ESI_HOST", value: host });
            }
            self.esi_host = host.trim().to_string();
        }
        if let Some(date) = lookup("ESIGUARD_COMPATIBILITY_DATE") {
            self.compatibility_date = Some(date).filter(|d| !d.trim().is_empty());
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn presets_differ_only_in_threshold() {
        let batch = LimiterConfig::batch();
        let interactive = LimiterConfig::interactive();
        assert_eq!(batch.error_limit_threshold, 10);
        assert_eq!(interactive.error_limit_threshold, 15);
        assert_eq!(batch.with_error_limit_threshold(15), interactive);
    }

    #[test]
    fn lookup_overrides_fields() {
        let config = LimiterConfig::batch()
            .overlay(lookup(&[
                ("ESIGUARD_ERROR_LIMIT_THRESHOLD", "20"),
                ("ESIGUARD_THROTTLE_SECS", " 90 "),
                ("ESIGUARD_ESI_HOST", "http://localhost:8080"),
                ("ESIGUARD_COMPATIBILITY_DATE", "2025-08-26"),
            ]))
            .unwrap();
        assert_eq!(config.error_limit_threshold, 20);
        assert_eq!(config.throttle_secs, 90);
        assert_eq!(config.default_retry_after_secs, 60);
        assert_eq!(config.esi_host, "http://localhost:8080");
        assert_eq!(config.compatibility_date.as_deref(), Some("2025-08-26"));
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = LimiterConfig::batch()
            .overlay(lookup(&[("ESIGUARD_ERROR_LIMIT_THRESHOLD", "ten")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid { var: "ESIGUARD_ERROR_LIMIT_THRESHOLD", value: "ten".into() }
        );

        assert!(LimiterConfig::batch()
            .overlay(lookup(&[("ESIGUARD_THROTTLE_SECS", "-1")]))
            .is_err());
    }

    #[test]
    fn deserializes_partial_sections() {
        let config: LimiterConfig =
            serde_json::from_str(r#"{"error_limit_threshold": 12}"#).unwrap();
        assert_eq!(config.error_limit_threshold, 12);
        assert_eq!(config.esi_host, DEFAULT_ESI_HOST);
    }
}
