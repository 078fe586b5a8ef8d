//! Database configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use oxide_shape_core::Dialect;
use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};

/// Settings used by [`Database::open`](crate::Database::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    /// Dialect identifier (`sqlite`, `sqlite3`, `mysql`).
    pub driver: String,
    /// Connection URL.
    pub url: String,
    /// Scheme version used when registering without an explicit one.
    pub scheme_version: i64,
    /// Name of the table holding scheme records.
    pub scheme_table: String,
    /// JSON file holding scheme records instead of the scheme table.
    pub scheme_file: Option<PathBuf>,
    /// Default deadline of [`Database::run`](crate::Database::run), in
    /// milliseconds.
    pub deadline_ms: Option<u64>,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            driver: String::from("sqlite"),
            url: String::from("sqlite::memory:"),
            scheme_version: 1,
            scheme_table: String::from("_oxide_scheme"),
            scheme_file: None,
            deadline_ms: None,
        }
    }
}

impl ShapeConfig {
    /// Reads the configuration from the environment.
    ///
    /// | variable | field |
    /// |----------|-------|
    /// | `DATABASE_URL` | `url` |
    /// | `OXIDE_SHAPE_DRIVER` | `driver` |
    /// | `OXIDE_SHAPE_VERSION` | `scheme_version` |
    /// | `OXIDE_SHAPE_SCHEME_FILE` | `scheme_file` |
    /// | `OXIDE_SHAPE_DEADLINE_MS` | `deadline_ms` |
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Config`] if a number does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("DATABASE_URL") {
            config.url = url;
        }
        if let Some(driver) = lookup("OXIDE_SHAPE_DRIVER") {
            config.driver = driver;
        }
        if let Some(version) = lookup("OXIDE_SHAPE_VERSION") {
            config.scheme_version = parse_number("OXIDE_SHAPE_VERSION", &version)?;
        }
        if let Some(path) = lookup("OXIDE_SHAPE_SCHEME_FILE") {
            config.scheme_file = Some(PathBuf::from(path));
        }
        if let Some(ms) = lookup("OXIDE_SHAPE_DEADLINE_MS") {
            config.deadline_ms = Some(parse_number("OXIDE_SHAPE_DEADLINE_MS", &ms)?);
        }
        Ok(config)
    }

    /// Returns the dialect named by `driver`.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        Dialect::from_name(&self.driver)
    }

    /// Returns the default deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DatabaseError::Config(format!("{key}: '{value}' is not a valid number")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ShapeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ShapeConfig::default());
        assert_eq!(config.dialect(), Dialect::Sqlite);
        assert_eq!(config.deadline(), None);
    }

    #[test]
    fn test_from_variables() {
        let config = ShapeConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("OXIDE_SHAPE_DRIVER", "mysql"),
            ("OXIDE_SHAPE_VERSION", "7"),
            ("OXIDE_SHAPE_SCHEME_FILE", "scheme.json"),
            ("OXIDE_SHAPE_DEADLINE_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.url, "sqlite://app.db");
        assert_eq!(config.dialect(), Dialect::Mysql);
        assert_eq!(config.scheme_version, 7);
        assert_eq!(config.scheme_file, Some(PathBuf::from("scheme.json")));
        assert_eq!(config.deadline(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_bad_number() {
        let err = ShapeConfig::from_lookup(lookup(&[("OXIDE_SHAPE_VERSION", "two")])).unwrap_err();
        assert!(matches!(err, DatabaseError::Config(_)));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ShapeConfig = serde_json::from_str(r#"{"scheme_version": 3}"#).unwrap();
        assert_eq!(config.scheme_version, 3);
        assert_eq!(config.url, "sqlite::memory:");
    }
}
