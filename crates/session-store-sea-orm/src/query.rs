// Statement builders for the session and user tables.
//
// Every builder returns a sea-query statement, not a string. The adapter
// renders it for the connection's backend with bound parameters.

use chrono::{DateTime, Utc};
use sea_query::{
    Alias, DeleteStatement, Expr, InsertStatement, JoinType, Query, SelectStatement, SimpleExpr,
    UpdateStatement, Value,
};

use session_store_core::{ColumnMap, SessionTable, UserTable};

const SESSION_ALIAS: &str = "s";
const USER_ALIAS: &str = "u";

/// Result-column prefix for session columns in the joined lookup.
pub const SESSION_PREFIX: &str = "s__";
/// Result-column prefix for user columns in the joined lookup.
pub const USER_PREFIX: &str = "u__";

/// Session columns in read order: required ones, then attributes.
pub fn session_columns(table: &SessionTable) -> Vec<&str> {
    let mut columns = table.required_columns().to_vec();
    columns.extend(table.attributes.iter().map(String::as_str));
    columns
}

/// User columns in read order: the id, then attributes.
pub fn user_columns(table: &UserTable) -> Vec<&str> {
    let mut columns = table.required_columns().to_vec();
    columns.extend(table.attributes.iter().map(String::as_str));
    columns
}

/// Attribute value as stored in a text column: the JSON text of the value,
/// so strings keep their quotes and numbers or bools stay distinguishable
/// from strings. Absent keys and JSON null are stored as NULL.
pub fn attribute_value(value: Option<&serde_json::Value>) -> Value {
    match value {
        None | Some(serde_json::Value::Null) => Value::String(None),
        Some(value) => Value::String(Some(Box::new(value.to_string()))),
    }
}

/// Inverse of [`attribute_value`]. Text that is not valid JSON was written
/// by something other than this adapter and is read back as a plain string.
pub fn decode_attribute(text: Option<String>) -> serde_json::Value {
    match text {
        None => serde_json::Value::Null,
        Some(text) => serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
    }
}

/// One session joined with its user. Rows whose user is missing are dropped
/// by the inner join. Result columns carry [`SESSION_PREFIX`] and
/// [`USER_PREFIX`].
pub fn select_session_and_user(
    sessions: &SessionTable,
    users: &UserTable,
    session_id: &str,
) -> SelectStatement {
    let s = Alias::new(SESSION_ALIAS);
    let u = Alias::new(USER_ALIAS);

    let mut select = Query::select();
    for column in session_columns(sessions) {
        select.expr_as(
            Expr::col((s.clone(), Alias::new(column))),
            Alias::new(format!("{SESSION_PREFIX}{column}")),
        );
    }
    for column in user_columns(users) {
        select.expr_as(
            Expr::col((u.clone(), Alias::new(column))),
            Alias::new(format!("{USER_PREFIX}{column}")),
        );
    }
    select
        .from_as(Alias::new(&sessions.name), s.clone())
        .join_as(
            JoinType::InnerJoin,
            Alias::new(&users.name),
            u.clone(),
            Expr::col((u, Alias::new(&users.id))).equals((s.clone(), Alias::new(&sessions.user_id))),
        )
        .and_where(Expr::col((s, Alias::new(&sessions.id))).eq(session_id));
    select
}

/// All sessions of one user, unprefixed.
pub fn select_user_sessions(sessions: &SessionTable, user_id: &str) -> SelectStatement {
    let mut select = Query::select();
    select
        .columns(session_columns(sessions).into_iter().map(Alias::new))
        .from(Alias::new(&sessions.name))
        .and_where(Expr::col(Alias::new(&sessions.user_id)).eq(user_id));
    select
}

/// Insert one session row. Attribute columns not present in `attributes` are
/// written as NULL.
pub fn insert_session(
    sessions: &SessionTable,
    id: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
    attributes: &ColumnMap,
) -> Result<InsertStatement, sea_query::error::Error> {
    let mut columns = vec![
        Alias::new(&sessions.id),
        Alias::new(&sessions.user_id),
        Alias::new(&sessions.expires_at),
    ];
    let mut values: Vec<SimpleExpr> = vec![id.into(), user_id.into(), expires_at.into()];
    for column in &sessions.attributes {
        columns.push(Alias::new(column));
        values.push(SimpleExpr::Value(attribute_value(attributes.get(column))));
    }

    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(&sessions.name))
        .columns(columns)
        .values(values)?;
    Ok(insert)
}

pub fn update_expiration(
    sessions: &SessionTable,
    session_id: &str,
    expires_at: DateTime<Utc>,
) -> UpdateStatement {
    let mut update = Query::update();
    update
        .table(Alias::new(&sessions.name))
        .value(Alias::new(&sessions.expires_at), expires_at)
        .and_where(Expr::col(Alias::new(&sessions.id)).eq(session_id));
    update
}

/// Delete every row of `table` whose `column` equals `value`.
pub fn delete_where_eq(table: &str, column: &str, value: &str) -> DeleteStatement {
    let mut delete = Query::delete();
    delete
        .from_table(Alias::new(table))
        .and_where(Expr::col(Alias::new(column)).eq(value));
    delete
}

/// Delete sessions with `expires_at <= now`.
pub fn delete_expired(sessions: &SessionTable, now: DateTime<Utc>) -> DeleteStatement {
    let mut delete = Query::delete();
    delete
        .from_table(Alias::new(&sessions.name))
        .and_where(Expr::col(Alias::new(&sessions.expires_at)).lte(now));
    delete
}
