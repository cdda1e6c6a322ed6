// StoreConfig: which tables and columns an adapter is pointed at.
//
// Deserializable from any serde source (with defaults for every field) or
// assembled from `SESSION_STORE_*` environment variables.

use serde::{Deserialize, Serialize};

use crate::db::table::{validate_pair, SessionTable, UserTable};
use crate::error::ConfigError;

/// Prefix of every environment variable read by [`StoreConfig::from_env`].
pub const ENV_PREFIX: &str = "SESSION_STORE_";

/// Table configuration shared by all adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub user_table: UserTable,
    pub session_table: SessionTable,
}

impl StoreConfig {
    /// Read the configuration from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `SESSION_STORE_USER_TABLE` | user table name |
    /// | `SESSION_STORE_USER_ID_COLUMN` | user primary key |
    /// | `SESSION_STORE_USER_ATTRIBUTES` | comma separated user attribute columns |
    /// | `SESSION_STORE_SESSION_TABLE` | session table name |
    /// | `SESSION_STORE_SESSION_ID_COLUMN` | session primary key |
    /// | `SESSION_STORE_SESSION_USER_ID_COLUMN` | session owner column |
    /// | `SESSION_STORE_SESSION_EXPIRES_AT_COLUMN` | session expiry column |
    /// | `SESSION_STORE_SESSION_ATTRIBUTES` | comma separated session attribute columns |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults; the result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut config = Self::default();

        if let Some(name) = get("USER_TABLE") {
            config.user_table.name = name;
        }
        if let Some(column) = get("USER_ID_COLUMN") {
            config.user_table.id = column;
        }
        if let Some(list) = get("USER_ATTRIBUTES") {
            config.user_table.attributes = split_list(&list);
        }

        if let Some(name) = get("SESSION_TABLE") {
            config.session_table.name = name;
        }
        if let Some(column) = get("SESSION_ID_COLUMN") {
            config.session_table.id = column;
        }
        if let Some(column) = get("SESSION_USER_ID_COLUMN") {
            config.session_table.user_id = column;
        }
        if let Some(column) = get("SESSION_EXPIRES_AT_COLUMN") {
            config.session_table.expires_at = column;
        }
        if let Some(list) = get("SESSION_ATTRIBUTES") {
            config.session_table.attributes = split_list(&list);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pair(&self.session_table, &self.user_table)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.session_table.name, "session");
        assert_eq!(config.user_table.name, "user");
    }

    #[test]
    fn reads_every_variable() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("SESSION_STORE_USER_TABLE", "auth_user"),
            ("SESSION_STORE_USER_ID_COLUMN", "uid"),
            ("SESSION_STORE_USER_ATTRIBUTES", "username, email,"),
            ("SESSION_STORE_SESSION_TABLE", "auth_session"),
            ("SESSION_STORE_SESSION_ID_COLUMN", "sid"),
            ("SESSION_STORE_SESSION_USER_ID_COLUMN", "userId"),
            ("SESSION_STORE_SESSION_EXPIRES_AT_COLUMN", "expiresAt"),
            ("SESSION_STORE_SESSION_ATTRIBUTES", "country"),
        ]))
        .unwrap();

        assert_eq!(config.user_table.name, "auth_user");
        assert_eq!(config.user_table.id, "uid");
        assert_eq!(config.user_table.attributes, vec!["username", "email"]);
        assert_eq!(config.session_table.name, "auth_session");
        assert_eq!(config.session_table.required_columns(), ["sid", "userId", "expiresAt"]);
        assert_eq!(config.session_table.attributes, vec!["country"]);
    }

    #[test]
    fn invalid_environment_is_rejected() {
        let err = StoreConfig::from_lookup(lookup(&[
            ("SESSION_STORE_SESSION_TABLE", "auth"),
            ("SESSION_STORE_USER_TABLE", "auth"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::SameTable("auth".into()));
    }

    #[test]
    fn deserializes_partial_document() {
        let config: StoreConfig = serde_json::from_value(serde_json::json!({
            "sessionTable": { "name": "sessions", "attributes": ["ip"] }
        }))
        .unwrap();
        assert_eq!(config.session_table.name, "sessions");
        assert_eq!(config.session_table.attributes, vec!["ip"]);
        assert_eq!(config.user_table, UserTable::default());
    }
}
