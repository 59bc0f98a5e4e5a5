//! Configuration for the application store.
//!
//! Loaded from environment variables (a `.env` file is honoured by the
//! binary), with defaults matching the store's development settings.

use slicestore_core::PERSIST;
use slicestore_runtime::{SerializableCheckOptions, StoreConfig, ViolationPolicy};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Enables the serializability check (`true`/`false`)
pub const SERIALIZABLE_CHECK_VAR: &str = "SLICESTORE_SERIALIZABLE_CHECK";
/// Time budget of one serializability check, in milliseconds
pub const SERIALIZABLE_WARN_AFTER_VAR: &str = "SLICESTORE_SERIALIZABLE_WARN_AFTER_MS";
/// `warn` or `reject`
pub const SERIALIZABLE_POLICY_VAR: &str = "SLICESTORE_SERIALIZABLE_POLICY";
/// Log filter used by the binary
pub const LOG_VAR: &str = "SLICESTORE_LOG";

/// Errors raised while reading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set to something that cannot be parsed
    #[error("invalid value for {name}: {value:?} (expected {expected})")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
        /// What would have been accepted
        expected: &'static str,
    },
}

/// Application store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Run the serializability check
    pub serializable_check: bool,
    /// Time budget of one check before a warning is logged
    pub serializable_warn_after: Duration,
    /// What a violation does
    pub serializable_policy: ViolationPolicy,
    /// Log filter (`tracing_subscriber::EnvFilter` syntax)
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            serializable_check: true,
            serializable_warn_after: Duration::from_millis(32),
            serializable_policy: ViolationPolicy::Warn,
            log_filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables take their default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let serializable_check = match lookup(SERIALIZABLE_CHECK_VAR) {
            Some(value) => parse_bool(SERIALIZABLE_CHECK_VAR, value)?,
            None => defaults.serializable_check,
        };

        let serializable_warn_after = match lookup(SERIALIZABLE_WARN_AFTER_VAR) {
            Some(value) => value
                .trim()
                .parse()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid {
                    name: SERIALIZABLE_WARN_AFTER_VAR,
                    value,
                    expected: "a whole number of milliseconds",
                })?,
            None => defaults.serializable_warn_after,
        };

        let serializable_policy = match lookup(SERIALIZABLE_POLICY_VAR) {
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "warn" => ViolationPolicy::Warn,
                "reject" => ViolationPolicy::Reject,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: SERIALIZABLE_POLICY_VAR,
                        value,
                        expected: "`warn` or `reject`",
                    });
                },
            },
            None => defaults.serializable_policy,
        };

        Ok(Self {
            serializable_check,
            serializable_warn_after,
            serializable_policy,
            log_filter: lookup(LOG_VAR).unwrap_or(defaults.log_filter),
        })
    }

    /// Options for the serializability check
    ///
    /// `persist/PERSIST` is always exempt: the persistence layer passes
    /// callbacks in it.
    #[must_use]
    pub fn serializable_check_options(&self) -> SerializableCheckOptions {
        SerializableCheckOptions::default()
            .with_ignored_actions([PERSIST])
            .with_warn_after(self.serializable_warn_after)
            .with_policy(self.serializable_policy)
    }

    /// The store configuration this describes
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        if self.serializable_check {
            StoreConfig::default().with_serializable_check(self.serializable_check_options())
        } else {
            StoreConfig::default().without_serializable_check()
        }
    }
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            expected: "a boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(ClientConfig::from_lookup(lookup(&[])), Ok(ClientConfig::default()));
    }

    #[test]
    fn reads_every_variable() {
        let config = ClientConfig::from_lookup(lookup(&[
            (SERIALIZABLE_CHECK_VAR, "off"),
            (SERIALIZABLE_WARN_AFTER_VAR, "100"),
            (SERIALIZABLE_POLICY_VAR, "Reject"),
            (LOG_VAR, "debug"),
        ]));

        assert_eq!(
            config,
            Ok(ClientConfig {
                serializable_check: false,
                serializable_warn_after: Duration::from_millis(100),
                serializable_policy: ViolationPolicy::Reject,
                log_filter: "debug".to_owned(),
            })
        );
    }

    #[test]
    fn rejects_malformed_values() {
        let bad_bool = ClientConfig::from_lookup(lookup(&[(SERIALIZABLE_CHECK_VAR, "maybe")]));
        assert!(matches!(bad_bool, Err(ConfigError::Invalid { name: SERIALIZABLE_CHECK_VAR, .. })));

        let bad_ms = ClientConfig::from_lookup(lookup(&[(SERIALIZABLE_WARN_AFTER_VAR, "-5")]));
        assert!(matches!(bad_ms, Err(ConfigError::Invalid { name: SERIALIZABLE_WARN_AFTER_VAR, .. })));

        let bad_policy = ClientConfig::from_lookup(lookup(&[(SERIALIZABLE_POLICY_VAR, "panic")]));
        assert!(matches!(bad_policy, Err(ConfigError::Invalid { name: SERIALIZABLE_POLICY_VAR, .. })));
    }

    #[test]
    fn persist_is_always_ignored() {
        let options = ClientConfig::default().serializable_check_options();
        assert!(options.ignores_action(PERSIST));
        assert!(!options.ignores_action("auth/login"));
    }

    #[test]
    fn disabling_the_check_removes_it() {
        let config = ClientConfig {
            serializable_check: false,
            ..ClientConfig::default()
        };
        assert!(config.store_config().middleware.serializable_check.is_none());
        assert!(ClientConfig::default().store_config().middleware.serializable_check.is_some());
    }
}
