// Table descriptors: the names of the two tables an adapter is pointed at
// and the physical columns it reads and writes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Descriptor of the user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserTable {
    /// Physical table name.
    pub name: String,
    /// Primary key column.
    pub id: String,
    /// Extra columns carried into the user attribute bag.
    pub attributes: Vec<String>,
}

impl Default for UserTable {
    fn default() -> Self {
        Self {
            name: "user".to_string(),
            id: "id".to_string(),
            attributes: Vec::new(),
        }
    }
}

impl UserTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id = column.into();
        self
    }

    pub fn with_attribute(mut self, column: impl Into<String>) -> Self {
        self.attributes.push(column.into());
        self
    }

    /// Columns that never come from the attribute bag.
    pub fn required_columns(&self) -> [&str; 1] {
        [self.id.as_str()]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_table(&self.name, &[("id", &self.id)], &self.attributes)
    }
}

/// Descriptor of the session table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionTable {
    /// Physical table name.
    pub name: String,
    /// Primary key column.
    pub id: String,
    /// Column referencing the user table's primary key.
    pub user_id: String,
    /// Absolute expiry timestamp column.
    pub expires_at: String,
    /// Extra columns carried into the session attribute bag.
    pub attributes: Vec<String>,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            id: "id".to_string(),
            user_id: "user_id".to_string(),
            expires_at: "expires_at".to_string(),
            attributes: Vec::new(),
        }
    }
}

impl SessionTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id = column.into();
        self
    }

    pub fn with_user_id_column(mut self, column: impl Into<String>) -> Self {
        self.user_id = column.into();
        self
    }

    pub fn with_expires_at_column(mut self, column: impl Into<String>) -> Self {
        self.expires_at = column.into();
        self
    }

    pub fn with_attribute(mut self, column: impl Into<String>) -> Self {
        self.attributes.push(column.into());
        self
    }

    /// Columns that never come from the attribute bag.
    pub fn required_columns(&self) -> [&str; 3] {
        [
            self.id.as_str(),
            self.user_id.as_str(),
            self.expires_at.as_str(),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_table(
            &self.name,
            &[
                ("id", &self.id),
                ("userId", &self.user_id),
                ("expiresAt", &self.expires_at),
            ],
            &self.attributes,
        )
    }
}

/// Validate a session/user descriptor pair as one adapter would use them.
pub fn validate_pair(session: &SessionTable, user: &UserTable) -> Result<(), ConfigError> {
    session.validate()?;
    user.validate()?;
    if session.name == user.name {
        return Err(ConfigError::SameTable(session.name.clone()));
    }
    Ok(())
}

fn validate_table(
    name: &str,
    required: &[(&'static str, &String)],
    attributes: &[String],
) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyTableName);
    }

    let mut seen = HashSet::new();
    for &(field, column) in required {
        if column.trim().is_empty() {
            return Err(ConfigError::EmptyColumn {
                table: name.to_string(),
                field,
            });
        }
        if !seen.insert(column.as_str()) {
            return Err(ConfigError::DuplicateColumn {
                table: name.to_string(),
                column: column.to_string(),
            });
        }
    }

    for column in attributes {
        if column.trim().is_empty() {
            return Err(ConfigError::EmptyColumn {
                table: name.to_string(),
                field: "attributes",
            });
        }
        if !seen.insert(column.as_str()) {
            return Err(ConfigError::DuplicateColumn {
                table: name.to_string(),
                column: column.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate_pair(&SessionTable::default(), &UserTable::default()).unwrap();
    }

    #[test]
    fn builders_set_columns() {
        let session = SessionTable::new("auth_session")
            .with_user_id_column("userId")
            .with_expires_at_column("expiresAt")
            .with_attribute("country");
        assert_eq!(session.name, "auth_session");
        assert_eq!(session.required_columns(), ["id", "userId", "expiresAt"]);
        assert_eq!(session.attributes, vec!["country".to_string()]);
    }

    #[test]
    fn attribute_may_not_shadow_required_column() {
        let session = SessionTable::default().with_attribute("expires_at");
        assert_eq!(
            session.validate(),
            Err(ConfigError::DuplicateColumn {
                table: "session".into(),
                column: "expires_at".into(),
            })
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        assert_eq!(UserTable::new(" ").validate(), Err(ConfigError::EmptyTableName));
        assert_eq!(
            SessionTable::default().with_user_id_column("").validate(),
            Err(ConfigError::EmptyColumn {
                table: "session".into(),
                field: "userId",
            })
        );
    }

    #[test]
    fn tables_must_differ() {
        let err = validate_pair(&SessionTable::new("auth"), &UserTable::new("auth")).unwrap_err();
        assert_eq!(err, ConfigError::SameTable("auth".into()));
    }

    #[test]
    fn deserializes_with_defaults() {
        let table: SessionTable =
            serde_json::from_str(r#"{"name":"sessions","expiresAt":"expires"}"#).unwrap();
        assert_eq!(table.name, "sessions");
        assert_eq!(table.user_id, "user_id");
        assert_eq!(table.expires_at, "expires");
    }
}
