// Row types handed between the authentication library and an adapter.
//
// Both rows are generic over an attribute bag holding the columns the adapter
// never interprets. The bag is flattened when serialized so a row looks like
// the table it came from.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Untyped column/value map, also usable directly as a pass-through bag.
pub type ColumnMap = serde_json::Map<String, serde_json::Value>;

/// Capability for converting an attribute bag to and from its columns.
///
/// Implemented for every serde type through the blanket impl below, so a
/// caller opts in by deriving `Serialize` and `Deserialize` on its bag.
pub trait Attributes: Clone + fmt::Debug + Send + Sync + 'static {
    /// Build the bag from the extra columns of a row.
    fn from_columns(columns: ColumnMap) -> StoreResult<Self>;

    /// Flatten the bag into extra columns for a write.
    fn to_columns(&self) -> StoreResult<ColumnMap>;
}

impl<T> Attributes for T
where
    T: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn from_columns(columns: ColumnMap) -> StoreResult<Self> {
        serde_json::from_value(serde_json::Value::Object(columns)).map_err(StoreError::storage)
    }

    fn to_columns(&self) -> StoreResult<ColumnMap> {
        match serde_json::to_value(self).map_err(StoreError::storage)? {
            serde_json::Value::Object(map) => Ok(map),
            serde_json::Value::Null => Ok(ColumnMap::new()),
            other => Err(StoreError::storage(format!(
                "attribute bag must serialize to an object, got `{other}`"
            ))),
        }
    }
}

/// Flatten a bag into the columns to write alongside the required ones.
///
/// Keys naming a required column are dropped with a warning, so a bag can
/// never overwrite a row's id, owner or expiry.
pub fn extra_columns<A: Attributes>(
    attributes: &A,
    required: &[&str],
    table: &str,
) -> StoreResult<ColumnMap> {
    let mut columns = attributes.to_columns()?;
    columns.retain(|column, _| {
        let reserved = required.contains(&column.as_str());
        if reserved {
            tracing::warn!(table, column = %column, "attribute shadows a required column, ignoring it");
        }
        !reserved
    });
    Ok(columns)
}

/// The empty attribute bag, for tables with only the required columns.
///
/// Extra columns present on a row are ignored when decoding into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoAttributes {}

/// A user row. The adapter only ever reads users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseUser<A = NoAttributes> {
    pub id: String,
    #[serde(flatten)]
    pub attributes: A,
}

impl<A> DatabaseUser<A> {
    pub fn new(id: impl Into<String>, attributes: A) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }
}

/// A session row, supplied fully formed by the caller on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSession<A = NoAttributes> {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: A,
}

impl<A> DatabaseSession<A> {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        expires_at: DateTime<Utc>,
        attributes: A,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            expires_at,
            attributes,
        }
    }

    /// A session is valid iff it expires strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Whether the expiry sweep at `now` would remove this session.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_valid_at(now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        username: String,
        #[serde(default)]
        admin: bool,
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn validity_is_strict() {
        let session = DatabaseSession::new("s1", "u1", at(0), NoAttributes {});
        assert!(session.is_valid_at(at(-1)));
        assert!(!session.is_valid_at(at(0)));
        assert!(session.is_expired_at(at(0)));
        assert!(session.is_expired_at(at(0) + Duration::milliseconds(1)));
    }

    #[test]
    fn typed_bag_round_trips_through_columns() {
        let profile = Profile {
            username: "alice".into(),
            admin: true,
        };
        let columns = profile.to_columns().unwrap();
        assert_eq!(columns["username"], "alice");
        assert_eq!(Profile::from_columns(columns).unwrap(), profile);
    }

    #[test]
    fn missing_required_attribute_is_storage_failure() {
        let err = Profile::from_columns(ColumnMap::new()).unwrap_err();
        assert!(matches!(err, StoreError::StorageFailure { .. }));
    }

    #[test]
    fn no_attributes_ignores_extra_columns() {
        let mut columns = ColumnMap::new();
        columns.insert("nickname".into(), json!("al"));
        assert_eq!(NoAttributes::from_columns(columns).unwrap(), NoAttributes {});
        assert!(NoAttributes {}.to_columns().unwrap().is_empty());
    }

    #[test]
    fn extra_columns_drop_required_names() {
        let mut bag = ColumnMap::new();
        bag.insert("id".into(), json!("forged"));
        bag.insert("country".into(), json!("NL"));
        let columns = extra_columns(&bag, &["id", "user_id", "expires_at"], "session").unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns["country"], "NL");
    }

    #[test]
    fn unit_bag_is_empty() {
        assert!(().to_columns().unwrap().is_empty());
    }

    #[test]
    fn scalar_bag_is_rejected() {
        let err = 42_i64.to_columns().unwrap_err();
        assert!(err.to_string().contains("must serialize to an object"));
    }

    #[test]
    fn session_serializes_flat() {
        let session = DatabaseSession::new(
            "s1",
            "u1",
            at(0),
            Profile {
                username: "alice".into(),
                admin: false,
            },
        );
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["id"], "s1");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["username"], "alice");
        assert!(value.get("attributes").is_none());
    }
}
