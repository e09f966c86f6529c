use std::env;

use thiserror::Error;

use crate::envelope::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("VOCAB_JWT_SECRET must be set")]
    MissingSecret,
    #[error("invalid VOCAB_DEFAULT_LIMIT value: {raw}")]
    InvalidLimit { raw: String },
}

/// Runtime settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub jwt_secret: String,
    pub default_limit: u32,
}

impl AppConfig {
    /// Read `VOCAB_DB_URL`, `VOCAB_JWT_SECRET` and `VOCAB_DEFAULT_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the secret is missing or the limit is not in `1..=200`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the secret is missing or the limit is not in `1..=200`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_url = lookup("VOCAB_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "sqlite:vocab.sqlite3?mode=rwc".into());
        let jwt_secret = lookup("VOCAB_JWT_SECRET")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        let default_limit = match lookup("VOCAB_DEFAULT_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_PAGE_LIMIT).contains(n))
                .ok_or(ConfigError::InvalidLimit { raw })?,
            None => DEFAULT_PAGE_LIMIT,
        };
        Ok(Self {
            db_url,
            jwt_secret,
            default_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[("VOCAB_JWT_SECRET", "s")])).unwrap();
        assert_eq!(cfg.db_url, "sqlite:vocab.sqlite3?mode=rwc");
        assert_eq!(cfg.default_limit, 20);
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingSecret
        );
    }

    #[test]
    fn limit_is_bounded() {
        let err = AppConfig::from_lookup(lookup(&[
            ("VOCAB_JWT_SECRET", "s"),
            ("VOCAB_DEFAULT_LIMIT", "500"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLimit { .. }));

        let cfg = AppConfig::from_lookup(lookup(&[
            ("VOCAB_JWT_SECRET", "s"),
            ("VOCAB_DB_URL", "sqlite::memory:"),
            ("VOCAB_DEFAULT_LIMIT", "50"),
        ]))
        .unwrap();
        assert_eq!(cfg.db_url, "sqlite::memory:");
        assert_eq!(cfg.default_limit, 50);
    }
}
