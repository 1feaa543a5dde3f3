//! Immutable `key=value` settings store.
//!
//! Built once at process start from the repeated `--set key=value` flags and
//! consumed by the provider-specific collaborators. Lookups never fail: a
//! missing key resolves to the caller's default.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use tracing::debug;

/// Errors raised while building or interpreting a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("error parsing setting: {0}")]
    MalformedSetting(String),
    #[error("required setting \"{key}\" was not specified")]
    Missing { key: String },
    #[error("setting \"{key}\" has invalid value \"{value}\": {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings keyed by name. Immutable after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    settings: HashMap<String, String>,
}

impl Config {
    /// Builds a config from `key=value` entries.
    ///
    /// Each entry is split on its first `=`, so values may themselves contain
    /// `=`. A later entry for the same key replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedSetting`] for an entry without `=`.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut settings = HashMap::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedSetting(pair.to_string()))?;
            settings.insert(key.to_string(), value.to_string());
        }
        debug!(count = settings.len(), "settings loaded");
        Ok(Self { settings })
    }

    /// Returns the setting for `key`, or `default` when it was not given.
    #[must_use]
    pub fn get_setting<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.settings.get(key).map_or(default, String::as_str)
    }

    /// Returns the setting for `key`, treating absence or an empty value as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the setting is absent or empty.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        match self.get_setting(key, "") {
            "" => Err(ConfigError::Missing {
                key: key.to_string(),
            }),
            value => Ok(value),
        }
    }

    /// Parses the setting for `key`; `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the value does not parse as `T`.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.settings
            .get(key)
            .map(|value| {
                value.parse::<T>().map_err(|e| ConfigError::Invalid {
                    key: key.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_defaults_missing_keys() {
        let cfg = Config::from_pairs(["eventPort=9000", "account=acme"]).unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.get_setting("eventPort", ""), "9000");
        assert_eq!(cfg.get_setting("container", "dflt"), "dflt");
    }

    #[test]
    fn splits_on_first_equals_only() {
        let cfg = Config::from_pairs(["accessKey=abc==", "empty="]).unwrap();
        assert_eq!(cfg.get_setting("accessKey", ""), "abc==");
        assert_eq!(cfg.get_setting("empty", "dflt"), "");
    }

    #[test]
    fn later_entries_override_earlier() {
        let cfg = Config::from_pairs(["k=1", "k=2"]).unwrap();
        assert_eq!(cfg.get_setting("k", ""), "2");
    }

    #[test]
    fn rejects_malformed_entries() {
        assert_eq!(
            Config::from_pairs(["novalue"]).unwrap_err(),
            ConfigError::MalformedSetting("novalue".to_string())
        );
    }

    #[test]
    fn empty_key_is_a_valid_setting() {
        let cfg = Config::from_pairs(["=orphan"]).unwrap();
        assert_eq!(cfg.get_setting("", "dflt"), "orphan");
    }

    #[test]
    fn require_treats_empty_as_missing() {
        let cfg = Config::from_pairs(["blank="]).unwrap();
        assert!(matches!(cfg.require("blank"), Err(ConfigError::Missing { .. })));
        assert!(matches!(cfg.require("absent"), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn parse_typed_settings() {
        let cfg = Config::from_pairs(["eventPort=9000", "bad=nine"]).unwrap();
        assert_eq!(cfg.parse::<u16>("eventPort").unwrap(), Some(9000));
        assert_eq!(cfg.parse::<u16>("absent").unwrap(), None);
        assert!(matches!(
            cfg.parse::<u16>("bad"),
            Err(ConfigError::Invalid { ref key, .. }) if key == "bad"
        ));
    }
}
