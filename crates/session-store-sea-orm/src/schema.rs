// Table bootstrap for the session and user tables.
//
// Creates whatever is missing and leaves existing tables untouched. Real
// deployments usually own their migrations; this covers tests and small
// installs.

use sea_orm::{ConnectionTrait, DbBackend};
use sea_query::{
    Alias, ColumnDef, ForeignKey, ForeignKeyAction, Index, IndexCreateStatement, Table,
    TableCreateStatement,
};

use session_store_core::{SessionTable, StoreResult, UserTable};

use crate::error::map_db_err;

/// `CREATE TABLE IF NOT EXISTS` for the user table: a string primary key and
/// one nullable text column per attribute.
pub fn user_table_statement(users: &UserTable) -> TableCreateStatement {
    let mut table = Table::create();
    table
        .table(Alias::new(&users.name))
        .if_not_exists()
        .col(
            ColumnDef::new(Alias::new(&users.id))
                .string()
                .not_null()
                .primary_key(),
        );
    for column in &users.attributes {
        table.col(ColumnDef::new(Alias::new(column)).text());
    }
    table
}

/// `CREATE TABLE IF NOT EXISTS` for the session table, with a foreign key to
/// the user table.
pub fn session_table_statement(
    sessions: &SessionTable,
    users: &UserTable,
    backend: DbBackend,
) -> TableCreateStatement {
    let mut table = Table::create();
    table
        .table(Alias::new(&sessions.name))
        .if_not_exists()
        .col(
            ColumnDef::new(Alias::new(&sessions.id))
                .string()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(Alias::new(&sessions.user_id)).string().not_null())
        .col(expiry_column(&sessions.expires_at, backend).not_null());
    for column in &sessions.attributes {
        table.col(ColumnDef::new(Alias::new(column)).text());
    }
    table.foreign_key(
        ForeignKey::create()
            .name(format!("fk_{}_{}", sessions.name, sessions.user_id))
            .from(Alias::new(&sessions.name), Alias::new(&sessions.user_id))
            .to(Alias::new(&users.name), Alias::new(&users.id))
            .on_delete(ForeignKeyAction::Cascade),
    );
    table
}

/// Expiry column with microsecond precision on every backend. MySQL has no
/// zoned timestamp and its plain `timestamp` drops fractional seconds and
/// ends in 2038, so it gets `datetime(6)` holding UTC.
fn expiry_column(name: &str, backend: DbBackend) -> ColumnDef {
    let mut column = ColumnDef::new(Alias::new(name));
    match backend {
        DbBackend::MySql => column.custom(Alias::new("datetime(6)")),
        DbBackend::Postgres | DbBackend::Sqlite => column.timestamp_with_time_zone(),
    };
    column
}

/// Index backing `get_user_sessions` and `delete_user_sessions`.
pub fn session_user_index(sessions: &SessionTable) -> IndexCreateStatement {
    Index::create()
        .if_not_exists()
        .name(format!("idx_{}_{}", sessions.name, sessions.user_id))
        .table(Alias::new(&sessions.name))
        .col(Alias::new(&sessions.user_id))
        .to_owned()
}

/// Create both tables and the user-id index if they do not exist.
pub async fn create_tables<C>(db: &C, sessions: &SessionTable, users: &UserTable) -> StoreResult<()>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    db.execute(backend.build(&user_table_statement(users)))
        .await
        .map_err(map_db_err)?;
    db.execute(backend.build(&session_table_statement(sessions, users, backend)))
        .await
        .map_err(map_db_err)?;
    db.execute(backend.build(&session_user_index(sessions)))
        .await
        .map_err(map_db_err)?;

    tracing::debug!(
        session_table = %sessions.name,
        user_table = %users.name,
        "session store tables ready"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{MysqlQueryBuilder, PostgresQueryBuilder, SqliteQueryBuilder};

    #[test]
    fn test_user_table_ddl() {
        let users = UserTable::new("auth_user").with_attribute("username");
        let sql = user_table_statement(&users).to_string(SqliteQueryBuilder);
        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "auth_user""#));
        assert!(sql.contains(r#""id""#));
        assert!(sql.contains("PRIMARY KEY"));
        assert!(sql.contains(r#""username" text"#));
    }

    #[test]
    fn test_session_table_ddl() {
        let users = UserTable::new("auth_user");
        let sessions = SessionTable::new("auth_session").with_attribute("country");
        let sql = session_table_statement(&sessions, &users, DbBackend::Postgres)
            .to_string(PostgresQueryBuilder);
        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "auth_session""#));
        assert!(sql.contains(r#""expires_at" timestamp with time zone NOT NULL"#));
        assert!(sql.contains(r#""country" text"#));
        assert!(sql.contains(r#"FOREIGN KEY ("user_id") REFERENCES "auth_user" ("id")"#));
        assert!(sql.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn test_mysql_expiry_keeps_microseconds() {
        let users = UserTable::new("auth_user");
        let sessions = SessionTable::new("auth_session");
        let sql = session_table_statement(&sessions, &users, DbBackend::MySql)
            .to_string(MysqlQueryBuilder);
        assert!(sql.contains("`expires_at` datetime(6) NOT NULL"), "{sql}");
    }

    #[test]
    fn test_session_user_index() {
        let sessions = SessionTable::new("auth_session");
        let sql = session_user_index(&sessions).to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#""idx_auth_session_user_id""#));
        assert!(sql.contains(r#"ON "auth_session" ("user_id")"#));
    }
}
