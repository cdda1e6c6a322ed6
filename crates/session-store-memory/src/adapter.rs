// In-memory session store: HashMap-based tables implementing the core
// SessionStoreAdapter trait.
//
// Rows are JSON objects keyed by physical column name, grouped per table in
// `HashMap<String, Vec<ColumnMap>>`. Thread-safe via `tokio::sync::RwLock`.
// Every operation holds the lock once, so `set_session` checks the primary
// key and the user reference atomically, the way a relational store's
// constraints would.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::RwLock;

use session_store_core::clock::{system_clock, SharedClock};
use session_store_core::db::models::extra_columns;
use session_store_core::db::table::validate_pair;
use session_store_core::{
    Attributes, ColumnMap, ConfigError, DatabaseSession, DatabaseUser, NoAttributes,
    SessionAndUser, SessionStoreAdapter, SessionTable, StoreError, StoreResult, UserTable,
};

/// Type alias for the in-memory store.
type Store = HashMap<String, Vec<ColumnMap>>;

/// Errors raised by the in-memory store itself. They reach callers as the
/// source of a [`StoreError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("duplicate key `{key}` for `{table}.{column}`")]
    DuplicateKey {
        table: String,
        column: String,
        key: String,
    },

    #[error("`{table}.{column}` = `{value}` references a missing row in `{referenced}`")]
    MissingReference {
        table: String,
        column: String,
        value: String,
        referenced: String,
    },

    #[error("malformed row in `{table}`: {reason}")]
    MalformedRow { table: String, reason: String },
}

/// Handle to an in-memory database: a set of named tables of JSON rows.
///
/// Cloning the handle shares the underlying tables. Data is lost when the last
/// handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    store: Arc<RwLock<Store>>,
}

impl MemoryDatabase {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database pre-populated with rows.
    pub fn with_data(data: HashMap<String, Vec<ColumnMap>>) -> Self {
        Self {
            store: Arc::new(RwLock::new(data)),
        }
    }

    /// Append a raw row without any constraint check.
    pub async fn insert_row(&self, table: &str, row: ColumnMap) {
        self.store
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Insert a user, enforcing the primary key. This is what user-management
    /// code does outside the adapter.
    pub async fn insert_user<A: Attributes>(
        &self,
        table: &UserTable,
        user: &DatabaseUser<A>,
    ) -> StoreResult<()> {
        let mut row = extra_columns(&user.attributes, &table.required_columns(), &table.name)?;
        row.insert(table.id.clone(), serde_json::Value::String(user.id.clone()));

        let mut store = self.store.write().await;
        let rows = store.entry(table.name.clone()).or_default();
        if find_row(rows, &table.id, &user.id).is_some() {
            return Err(StoreError::constraint(MemoryStoreError::DuplicateKey {
                table: table.name.clone(),
                column: table.id.clone(),
                key: user.id.clone(),
            }));
        }
        rows.push(row);
        Ok(())
    }

    /// Remove every row of `table` whose `column` equals `value`, with no
    /// referential checks. Returns the number of rows removed.
    pub async fn delete_rows(&self, table: &str, column: &str, value: &str) -> usize {
        let mut store = self.store.write().await;
        match store.get_mut(table) {
            Some(rows) => {
                let before = rows.len();
                rows.retain(|row| column_str(row, column) != Some(value));
                before - rows.len()
            }
            None => 0,
        }
    }

    /// Snapshot of one table's rows.
    pub async fn rows(&self, table: &str) -> Vec<ColumnMap> {
        self.store
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Row count for one table.
    pub async fn table_len(&self, table: &str) -> usize {
        self.store
            .read()
            .await
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    /// Drop all tables.
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }
}

/// In-memory session store adapter.
///
/// Holds the database handle, the two table descriptors and the clock used by
/// the expiry sweep.
#[derive(Debug, Clone)]
pub struct MemoryAdapter<U = NoAttributes, S = NoAttributes> {
    db: MemoryDatabase,
    session_table: SessionTable,
    user_table: UserTable,
    clock: SharedClock,
    _attributes: PhantomData<fn() -> (U, S)>,
}

impl<U, S> MemoryAdapter<U, S>
where
    U: Attributes,
    S: Attributes,
{
    /// Create an adapter over `db` for the given tables.
    pub fn new(
        db: MemoryDatabase,
        session_table: SessionTable,
        user_table: UserTable,
    ) -> Result<Self, ConfigError> {
        validate_pair(&session_table, &user_table)?;
        Ok(Self {
            db,
            session_table,
            user_table,
            clock: system_clock(),
            _attributes: PhantomData,
        })
    }

    /// Replace the clock consulted by `delete_expired_sessions`.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// The underlying database handle.
    pub fn db(&self) -> &MemoryDatabase {
        &self.db
    }

    pub fn session_table(&self) -> &SessionTable {
        &self.session_table
    }

    pub fn user_table(&self) -> &UserTable {
        &self.user_table
    }

    fn encode_session(&self, session: &DatabaseSession<S>) -> StoreResult<ColumnMap> {
        let table = &self.session_table;
        let mut row = extra_columns(&session.attributes, &table.required_columns(), &table.name)?;
        row.insert(table.id.clone(), session.id.clone().into());
        row.insert(table.user_id.clone(), session.user_id.clone().into());
        row.insert(
            table.expires_at.clone(),
            encode_timestamp(session.expires_at).into(),
        );
        Ok(row)
    }

    fn decode_session(&self, row: &ColumnMap) -> StoreResult<DatabaseSession<S>> {
        let table = &self.session_table;
        let id = required_str(row, &table.name, &table.id)?;
        let user_id = required_str(row, &table.name, &table.user_id)?;
        let expires_at = row_expiry(row, table)?;
        let attributes = S::from_columns(strip_columns(row, &table.required_columns()))?;
        Ok(DatabaseSession {
            id: id.to_string(),
            user_id: user_id.to_string(),
            expires_at,
            attributes,
        })
    }

    fn decode_user(&self, row: &ColumnMap) -> StoreResult<DatabaseUser<U>> {
        let table = &self.user_table;
        let id = required_str(row, &table.name, &table.id)?;
        let attributes = U::from_columns(strip_columns(row, &table.required_columns()))?;
        Ok(DatabaseUser {
            id: id.to_string(),
            attributes,
        })
    }
}

#[async_trait]
impl<U, S> SessionStoreAdapter for MemoryAdapter<U, S>
where
    U: Attributes,
    S: Attributes,
{
    type UserAttributes = U;
    type SessionAttributes = S;

    async fn get_session_and_user(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<SessionAndUser<S, U>>> {
        let store = self.db.store.read().await;
        let sessions = table_rows(&store, &self.session_table.name);
        let Some(session_row) = find_row(sessions, &self.session_table.id, session_id) else {
            tracing::trace!(session_id, "session not found");
            return Ok(None);
        };

        let session = self.decode_session(session_row)?;
        let users = table_rows(&store, &self.user_table.name);
        let Some(user_row) = find_row(users, &self.user_table.id, &session.user_id) else {
            tracing::debug!(session_id, user_id = %session.user_id, "session has no user row");
            return Ok(None);
        };

        let user = self.decode_user(user_row)?;
        Ok(Some((session, user)))
    }

    async fn get_user_sessions(&self, user_id: &str) -> StoreResult<Vec<DatabaseSession<S>>> {
        let store = self.db.store.read().await;
        table_rows(&store, &self.session_table.name)
            .iter()
            .filter(|row| column_str(row, &self.session_table.user_id) == Some(user_id))
            .map(|row| self.decode_session(row))
            .collect()
    }

    async fn set_session(&self, session: &DatabaseSession<S>) -> StoreResult<()> {
        let row = self.encode_session(session)?;
        let table = &self.session_table;

        let mut store = self.db.store.write().await;
        let user_exists = find_row(
            table_rows(&store, &self.user_table.name),
            &self.user_table.id,
            &session.user_id,
        )
        .is_some();

        let sessions = store.entry(table.name.clone()).or_default();
        if find_row(sessions, &table.id, &session.id).is_some() {
            return Err(StoreError::constraint(MemoryStoreError::DuplicateKey {
                table: table.name.clone(),
                column: table.id.clone(),
                key: session.id.clone(),
            }));
        }
        if !user_exists {
            return Err(StoreError::constraint(MemoryStoreError::MissingReference {
                table: table.name.clone(),
                column: table.user_id.clone(),
                value: session.user_id.clone(),
                referenced: self.user_table.name.clone(),
            }));
        }

        sessions.push(row);
        tracing::debug!(session_id = %session.id, user_id = %session.user_id, "session stored");
        Ok(())
    }

    async fn update_session_expiration(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let table = &self.session_table;
        let mut store = self.db.store.write().await;
        let row = store
            .get_mut(&table.name)
            .and_then(|rows| rows.iter_mut().find(|row| column_str(row, &table.id) == Some(session_id)));

        match row {
            Some(row) => {
                row.insert(table.expires_at.clone(), encode_timestamp(expires_at).into());
                tracing::debug!(session_id, %expires_at, "session expiration updated");
            }
            None => tracing::trace!(session_id, "expiration update matched no session"),
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let removed = self
            .db
            .delete_rows(&self.session_table.name, &self.session_table.id, session_id)
            .await;
        tracing::debug!(session_id, removed, "session deleted");
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> StoreResult<u64> {
        let removed = self
            .db
            .delete_rows(&self.session_table.name, &self.session_table.user_id, user_id)
            .await;
        tracing::debug!(user_id, removed, "user sessions deleted");
        Ok(removed as u64)
    }

    async fn delete_expired_sessions(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        let table = &self.session_table;
        let mut store = self.db.store.write().await;
        let Some(rows) = store.get_mut(&table.name) else {
            return Ok(0);
        };

        // Decide every row first so a malformed row leaves the table untouched.
        let keep = rows
            .iter()
            .map(|row| row_expiry(row, table).map(|expires_at| expires_at > now))
            .collect::<StoreResult<Vec<bool>>>()?;

        let before = rows.len();
        let mut keep = keep.into_iter();
        rows.retain(|_| keep.next().unwrap_or(true));
        let removed = (before - rows.len()) as u64;

        tracing::debug!(%now, removed, "expired sessions deleted");
        Ok(removed)
    }
}

fn table_rows<'a>(store: &'a Store, table: &str) -> &'a [ColumnMap] {
    store.get(table).map(Vec::as_slice).unwrap_or(&[])
}

fn find_row<'a>(rows: &'a [ColumnMap], column: &str, value: &str) -> Option<&'a ColumnMap> {
    rows.iter().find(|row| column_str(row, column) == Some(value))
}

fn column_str<'a>(row: &'a ColumnMap, column: &str) -> Option<&'a str> {
    row.get(column).and_then(|v| v.as_str())
}

fn required_str<'a>(row: &'a ColumnMap, table: &str, column: &str) -> StoreResult<&'a str> {
    column_str(row, column).ok_or_else(|| {
        StoreError::storage(MemoryStoreError::MalformedRow {
            table: table.to_string(),
            reason: format!("column `{column}` is missing or not text"),
        })
    })
}

fn row_expiry(row: &ColumnMap, table: &SessionTable) -> StoreResult<DateTime<Utc>> {
    let raw = required_str(row, &table.name, &table.expires_at)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::storage(MemoryStoreError::MalformedRow {
                table: table.name.clone(),
                reason: format!("`{}` is not a timestamp: {e}", table.expires_at),
            })
        })
}

/// RFC 3339 with as many fractional digits as needed, so nothing is rounded.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn strip_columns(row: &ColumnMap, required: &[&str]) -> ColumnMap {
    row.iter()
        .filter(|(column, _)| !required.contains(&column.as_str()))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    async fn adapter_with_user(user_id: &str) -> MemoryAdapter {
        let db = MemoryDatabase::new();
        let adapter: MemoryAdapter =
            MemoryAdapter::new(db, SessionTable::default(), UserTable::default()).unwrap();
        adapter
            .db()
            .insert_user(adapter.user_table(), &DatabaseUser::new(user_id, NoAttributes {}))
            .await
            .unwrap();
        adapter
    }

    #[test]
    fn timestamps_keep_sub_second_precision() {
        let ts = t0() + Duration::nanoseconds(123_456_789);
        let encoded = encode_timestamp(ts);
        assert_eq!(encoded, "2024-01-01T00:00:00.123456789Z");
        let decoded = DateTime::parse_from_rfc3339(&encoded).unwrap();
        assert_eq!(decoded.with_timezone(&Utc), ts);
    }

    #[test]
    fn rejects_invalid_tables() {
        let result: Result<MemoryAdapter, _> = MemoryAdapter::new(
            MemoryDatabase::new(),
            SessionTable::new("auth"),
            UserTable::new("auth"),
        );
        assert!(matches!(result, Err(ConfigError::SameTable(_))));
    }

    #[tokio::test]
    async fn stores_rows_under_configured_columns() {
        let adapter = adapter_with_user("u1").await;
        adapter
            .set_session(&DatabaseSession::new("s1", "u1", t0(), NoAttributes {}))
            .await
            .unwrap();

        let rows = adapter.db().rows("session").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "s1");
        assert_eq!(rows[0]["user_id"], "u1");
        assert_eq!(rows[0]["expires_at"], "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn missing_user_is_constraint_violation() {
        let adapter = adapter_with_user("u1").await;
        let err = adapter
            .set_session(&DatabaseSession::new("s1", "ghost", t0(), NoAttributes {}))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(adapter.db().table_len("session").await, 0);
    }

    #[tokio::test]
    async fn duplicate_user_insert_is_rejected() {
        let adapter = adapter_with_user("u1").await;
        let err = adapter
            .db()
            .insert_user(adapter.user_table(), &DatabaseUser::new("u1", NoAttributes {}))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn malformed_expiry_is_storage_failure() {
        let adapter = adapter_with_user("u1").await;
        let mut row = ColumnMap::new();
        row.insert("id".into(), json!("s1"));
        row.insert("user_id".into(), json!("u1"));
        row.insert("expires_at".into(), json!("tomorrow"));
        adapter.db().insert_row("session", row).await;

        let err = adapter.get_session_and_user("s1").await.unwrap_err();
        assert!(matches!(err, StoreError::StorageFailure { .. }));

        // The sweep refuses to act on a table it cannot read.
        assert!(adapter.delete_expired_sessions().await.is_err());
        assert_eq!(adapter.db().table_len("session").await, 1);
    }

    #[tokio::test]
    async fn passes_through_unknown_columns() {
        let adapter: MemoryAdapter<ColumnMap, ColumnMap> = MemoryAdapter::new(
            MemoryDatabase::new(),
            SessionTable::default(),
            UserTable::default(),
        )
        .unwrap();

        let mut user = ColumnMap::new();
        user.insert("id".into(), json!("u1"));
        user.insert("email".into(), json!("alice@example.com"));
        adapter.db().insert_row("user", user).await;

        let mut extra = ColumnMap::new();
        extra.insert("ip".into(), json!("10.0.0.1"));
        adapter
            .set_session(&DatabaseSession::new("s1", "u1", t0(), extra.clone()))
            .await
            .unwrap();

        let (session, user) = adapter.get_session_and_user("s1").await.unwrap().unwrap();
        assert_eq!(session.attributes, extra);
        assert_eq!(user.attributes["email"], "alice@example.com");
        assert!(user.attributes.get("id").is_none());
    }

    #[tokio::test]
    async fn sweep_on_empty_database_removes_nothing() {
        let adapter: MemoryAdapter = MemoryAdapter::new(
            MemoryDatabase::new(),
            SessionTable::default(),
            UserTable::default(),
        )
        .unwrap();
        assert_eq!(adapter.delete_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_duplicate_inserts_have_one_winner() {
        let adapter = Arc::new(adapter_with_user("u1").await);
        let session = DatabaseSession::new("s1", "u1", t0(), NoAttributes {});

        let mut handles = Vec::new();
        for _ in 0..8 {
            let adapter = adapter.clone();
            let session = session.clone();
            handles.push(tokio::spawn(async move { adapter.set_session(&session).await }));
        }

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) if e.is_constraint_violation() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(adapter.db().table_len("session").await, 1);
    }
}
