// SeaOrmAdapter: the SessionStoreAdapter trait over a Sea-ORM connection.
//
// Uses sea-query builders from `query` against the configured table
// descriptors. Uniqueness and the user reference are enforced by the
// database itself (see `schema`), and driver errors are classified by
// `map_db_err`.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, QueryResult};

use session_store_core::clock::{system_clock, SharedClock};
use session_store_core::db::models::extra_columns;
use session_store_core::db::table::validate_pair;
use session_store_core::{
    Attributes, ColumnMap, ConfigError, DatabaseSession, DatabaseUser, NoAttributes,
    SessionAndUser, SessionStoreAdapter, SessionTable, StoreConfig, StoreError, StoreResult,
    UserTable,
};

use crate::error::{map_db_err, ConnectError};
use crate::query;

/// Sea-ORM-based session store adapter.
///
/// Wraps a connection together with the two table descriptors and the clock
/// consulted by the expiry sweep. `C` is a pooled `DatabaseConnection` by
/// default; passing a `DatabaseTransaction` scopes every operation to a
/// transaction the caller commits or rolls back.
#[derive(Debug, Clone)]
pub struct SeaOrmAdapter<U = NoAttributes, S = NoAttributes, C = DatabaseConnection> {
    db: C,
    session_table: SessionTable,
    user_table: UserTable,
    clock: SharedClock,
    _attributes: PhantomData<fn() -> (U, S)>,
}

impl<U, S> SeaOrmAdapter<U, S, DatabaseConnection>
where
    U: Attributes,
    S: Attributes,
{
    /// Create an adapter with the tables named by `config`.
    pub fn from_config(db: DatabaseConnection, config: &StoreConfig) -> Result<Self, ConfigError> {
        Self::new(db, config.session_table.clone(), config.user_table.clone())
    }

    /// Create an adapter by connecting to a database URL.
    ///
    /// In-memory SQLite URLs get a pool of exactly one connection, since every
    /// new connection would otherwise see its own empty database.
    pub async fn connect(
        url: &str,
        session_table: SessionTable,
        user_table: UserTable,
    ) -> Result<Self, ConnectError> {
        let mut options = ConnectOptions::new(url);
        options
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        if is_memory_sqlite(url) {
            options.max_connections(1).min_connections(1);
        }

        let db = Database::connect(options).await?;
        tracing::info!(backend = ?db.get_database_backend(), "session store connected");
        Ok(Self::new(db, session_table, user_table)?)
    }
}

impl<U, S, C> SeaOrmAdapter<U, S, C>
where
    U: Attributes,
    S: Attributes,
    C: ConnectionTrait + Debug + Send + Sync,
{
    /// Create an adapter from an existing connection or transaction.
    pub fn new(db: C, session_table: SessionTable, user_table: UserTable) -> Result<Self, ConfigError> {
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

    /// Get a reference to the underlying connection.
    pub fn db(&self) -> &C {
        &self.db
    }

    /// Give back the connection, e.g. to commit a transaction.
    pub fn into_inner(self) -> C {
        self.db
    }

    pub fn session_table(&self) -> &SessionTable {
        &self.session_table
    }

    pub fn user_table(&self) -> &UserTable {
        &self.user_table
    }

    fn decode_session(&self, row: &QueryResult, prefix: &str) -> StoreResult<DatabaseSession<S>> {
        let table = &self.session_table;
        let id: String = row.try_get(prefix, &table.id).map_err(map_db_err)?;
        let user_id: String = row.try_get(prefix, &table.user_id).map_err(map_db_err)?;
        let expires_at: DateTime<Utc> = row.try_get(prefix, &table.expires_at).map_err(map_db_err)?;
        let attributes = S::from_columns(read_attributes(row, prefix, &table.attributes)?)?;
        Ok(DatabaseSession {
            id,
            user_id,
            expires_at,
            attributes,
        })
    }

    fn decode_user(&self, row: &QueryResult, prefix: &str) -> StoreResult<DatabaseUser<U>> {
        let table = &self.user_table;
        let id: String = row.try_get(prefix, &table.id).map_err(map_db_err)?;
        let attributes = U::from_columns(read_attributes(row, prefix, &table.attributes)?)?;
        Ok(DatabaseUser { id, attributes })
    }

    /// Attribute columns of a session, restricted to the declared ones.
    fn session_attribute_columns(&self, session: &DatabaseSession<S>) -> StoreResult<ColumnMap> {
        let table = &self.session_table;
        let mut columns =
            extra_columns(&session.attributes, &table.required_columns(), &table.name)?;
        columns.retain(|column, _| {
            let declared = table.attributes.contains(column);
            if !declared {
                tracing::warn!(table = %table.name, column = %column, "attribute has no column, ignoring it");
            }
            declared
        });
        Ok(columns)
    }
}

#[async_trait]
impl<U, S, C> SessionStoreAdapter for SeaOrmAdapter<U, S, C>
where
    U: Attributes,
    S: Attributes,
    C: ConnectionTrait + Debug + Send + Sync,
{
    type UserAttributes = U;
    type SessionAttributes = S;

    async fn get_session_and_user(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<SessionAndUser<S, U>>> {
        let stmt = query::select_session_and_user(&self.session_table, &self.user_table, session_id);
        let row = self
            .db
            .query_one(self.db.get_database_backend().build(&stmt))
            .await
            .map_err(map_db_err)?;

        let Some(row) = row else {
            tracing::trace!(session_id, "session not found");
            return Ok(None);
        };
        let session = self.decode_session(&row, query::SESSION_PREFIX)?;
        let user = self.decode_user(&row, query::USER_PREFIX)?;
        Ok(Some((session, user)))
    }

    async fn get_user_sessions(&self, user_id: &str) -> StoreResult<Vec<DatabaseSession<S>>> {
        let stmt = query::select_user_sessions(&self.session_table, user_id);
        let rows = self
            .db
            .query_all(self.db.get_database_backend().build(&stmt))
            .await
            .map_err(map_db_err)?;
        rows.iter().map(|row| self.decode_session(row, "")).collect()
    }

    async fn set_session(&self, session: &DatabaseSession<S>) -> StoreResult<()> {
        let attributes = self.session_attribute_columns(session)?;
        let stmt = query::insert_session(
            &self.session_table,
            &session.id,
            &session.user_id,
            session.expires_at,
            &attributes,
        )
        .map_err(StoreError::storage)?;

        self.db
            .execute(self.db.get_database_backend().build(&stmt))
            .await
            .map_err(map_db_err)?;
        tracing::debug!(session_id = %session.id, user_id = %session.user_id, "session stored");
        Ok(())
    }

    async fn update_session_expiration(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let stmt = query::update_expiration(&self.session_table, session_id, expires_at);
        let result = self
            .db
            .execute(self.db.get_database_backend().build(&stmt))
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            tracing::trace!(session_id, "expiration update matched no session");
        } else {
            tracing::debug!(session_id, %expires_at, "session expiration updated");
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let table = &self.session_table;
        let stmt = query::delete_where_eq(&table.name, &table.id, session_id);
        let result = self
            .db
            .execute(self.db.get_database_backend().build(&stmt))
            .await
            .map_err(map_db_err)?;
        tracing::debug!(session_id, removed = result.rows_affected(), "session deleted");
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> StoreResult<u64> {
        let table = &self.session_table;
        let stmt = query::delete_where_eq(&table.name, &table.user_id, user_id);
        let result = self
            .db
            .execute(self.db.get_database_backend().build(&stmt))
            .await
            .map_err(map_db_err)?;
        let removed = result.rows_affected();
        tracing::debug!(user_id, removed, "user sessions deleted");
        Ok(removed)
    }

    async fn delete_expired_sessions(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        let stmt = query::delete_expired(&self.session_table, now);
        let result = self
            .db
            .execute(self.db.get_database_backend().build(&stmt))
            .await
            .map_err(map_db_err)?;
        let removed = result.rows_affected();
        tracing::debug!(%now, removed, "expired sessions deleted");
        Ok(removed)
    }
}

/// Declared attribute columns of one row, decoded from their JSON text.
fn read_attributes(row: &QueryResult, prefix: &str, columns: &[String]) -> StoreResult<ColumnMap> {
    let mut map = ColumnMap::new();
    for column in columns {
        let text: Option<String> = row.try_get(prefix, column).map_err(map_db_err)?;
        map.insert(column.clone(), query::decode_attribute(text));
    }
    Ok(map)
}

fn is_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}
