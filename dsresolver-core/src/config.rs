//! Resolver configuration
//!
//! Configuration is built in code via the `with_*` builders or loaded from
//! environment variables with defaults matching production behaviour.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entities::BuiltinDataSource;
use crate::error::ConfigError;
use crate::identity::{DEFAULT_KEY, EMPTY_KEY};

/// Age after which a snapshot is rebuilt on the next lookup.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(60);

/// Upper bound on a single catalog query.
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the resolution cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Snapshots older than this are refreshed before serving a lookup.
    pub staleness_window: Duration,
    /// Timeout applied to the catalog query. `None` waits indefinitely.
    pub catalog_timeout: Option<Duration>,
    /// Identity of the synthetic built-in data source.
    pub builtin: BuiltinDataSource,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            staleness_window: DEFAULT_STALENESS_WINDOW,
            catalog_timeout: Some(DEFAULT_CATALOG_TIMEOUT),
            builtin: BuiltinDataSource::default(),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the staleness window.
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Set the catalog query timeout.
    pub fn with_catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = Some(timeout);
        self
    }

    /// Let catalog queries run without a timeout.
    pub fn without_catalog_timeout(mut self) -> Self {
        self.catalog_timeout = None;
        self
    }

    /// Replace the built-in data source identity.
    pub fn with_builtin(mut self, builtin: BuiltinDataSource) -> Self {
        self.builtin = builtin;
        self
    }

    /// Create a config from environment variables.
    ///
    /// Environment variables:
    /// - `DSRESOLVER_STALENESS_SECS`: staleness window in seconds (default: 60)
    /// - `DSRESOLVER_CATALOG_TIMEOUT_MS`: catalog timeout in ms, 0 disables (default: 30000)
    /// - `DSRESOLVER_BUILTIN_UID`: uid/name/type of the built-in data source (default: "grafana")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ResolverConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("DSRESOLVER_STALENESS_SECS") {
            let secs = parse_u64("DSRESOLVER_STALENESS_SECS", &raw)?;
            config.staleness_window = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("DSRESOLVER_CATALOG_TIMEOUT_MS") {
            let millis = parse_u64("DSRESOLVER_CATALOG_TIMEOUT_MS", &raw)?;
            config.catalog_timeout = match millis {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            };
        }

        if let Some(uid) = lookup("DSRESOLVER_BUILTIN_UID") {
            config.builtin = BuiltinDataSource::new(uid.trim());
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the cache cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staleness_window.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "staleness_window".to_string(),
                value: format!("{:?}", self.staleness_window),
                reason: "must be greater than zero".to_string(),
            });
        }

        if let Some(timeout) = self.catalog_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "catalog_timeout".to_string(),
                    value: format!("{:?}", timeout),
                    reason: "use no timeout instead of a zero timeout".to_string(),
                });
            }
        }

        let uid = self.builtin.uid.as_str();
        if uid == EMPTY_KEY || uid == DEFAULT_KEY {
            return Err(ConfigError::InvalidValue {
                field: "builtin.uid".to_string(),
                value: uid.to_string(),
                reason: "collides with a reserved default key".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_u64(field: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::BUILTIN_DATASOURCE_UID;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.staleness_window, Duration::from_secs(60));
        assert_eq!(config.catalog_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.builtin.uid, BUILTIN_DATASOURCE_UID);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ResolverConfig::new()
            .with_staleness_window(Duration::from_secs(5))
            .without_catalog_timeout()
            .with_builtin(BuiltinDataSource::new("internal"));

        assert_eq!(config.staleness_window, Duration::from_secs(5));
        assert_eq!(config.catalog_timeout, None);
        assert_eq!(config.builtin.name, "internal");
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        // The only test in this crate that touches these variables.
        std::env::set_var("DSRESOLVER_STALENESS_SECS", "15");
        std::env::set_var("DSRESOLVER_CATALOG_TIMEOUT_MS", "0");
        let config = ResolverConfig::from_env();
        std::env::remove_var("DSRESOLVER_STALENESS_SECS");
        std::env::remove_var("DSRESOLVER_CATALOG_TIMEOUT_MS");

        let config = config.unwrap();
        assert_eq!(config.staleness_window, Duration::from_secs(15));
        assert_eq!(config.catalog_timeout, None);
    }

    #[test]
    fn test_from_lookup_reads_all_fields() {
        let config = ResolverConfig::from_lookup(lookup_from(&[
            ("DSRESOLVER_STALENESS_SECS", "120"),
            ("DSRESOLVER_CATALOG_TIMEOUT_MS", "1500"),
            ("DSRESOLVER_BUILTIN_UID", " builtin "),
        ]))
        .unwrap();

        assert_eq!(config.staleness_window, Duration::from_secs(120));
        assert_eq!(config.catalog_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.builtin.uid, "builtin");
    }

    #[test]
    fn test_from_lookup_zero_timeout_disables() {
        let config =
            ResolverConfig::from_lookup(lookup_from(&[("DSRESOLVER_CATALOG_TIMEOUT_MS", "0")]))
                .unwrap();
        assert_eq!(config.catalog_timeout, None);
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = ResolverConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ResolverConfig::from_lookup(lookup_from(&[(
            "DSRESOLVER_STALENESS_SECS",
            "soon",
        )]))
        .unwrap_err();
        assert!(format!("{}", err).contains("DSRESOLVER_STALENESS_SECS"));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = ResolverConfig::new().with_staleness_window(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_builtin_uid() {
        let config = ResolverConfig::new().with_builtin(BuiltinDataSource::new("default"));
        assert!(config.validate().is_err());

        let config = ResolverConfig::new().with_builtin(BuiltinDataSource::new(""));
        assert!(config.validate().is_err());
    }
}
