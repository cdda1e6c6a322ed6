// Session store adapter trait, the whole contract between the
// authentication library and whatever database holds its sessions.
//
// Every backend (Sea-ORM, in-memory) implements this trait. Each operation is
// stateless and maps to a single statement against the store; there is no
// cross-operation atomicity.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Attributes, DatabaseSession, DatabaseUser};
use crate::error::StoreResult;

/// A session together with the user it belongs to, read in one join.
pub type SessionAndUser<S, U> = (DatabaseSession<S>, DatabaseUser<U>);

/// The session storage contract.
///
/// "Not found" and "zero rows affected" are normal outcomes: lookups return
/// `None` or an empty vector, deletes and updates of missing rows succeed.
/// Only store failures surface as [`StoreError`](crate::error::StoreError).
#[async_trait]
pub trait SessionStoreAdapter: Send + Sync + fmt::Debug {
    /// Extra user columns.
    type UserAttributes: Attributes;
    /// Extra session columns.
    type SessionAttributes: Attributes;

    /// Look up a session and its user with a single session→user join.
    ///
    /// Returns `None` when the session does not exist and also when it exists
    /// but its user row does not (orphaned session). Expired sessions are
    /// returned as stored; validity is for the caller to judge.
    async fn get_session_and_user(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<SessionAndUser<Self::SessionAttributes, Self::UserAttributes>>>;

    /// All sessions of a user, in no particular order.
    async fn get_user_sessions(
        &self,
        user_id: &str,
    ) -> StoreResult<Vec<DatabaseSession<Self::SessionAttributes>>>;

    /// Insert a new session row exactly as given.
    ///
    /// A duplicate id or a `user_id` with no matching user is rejected by the
    /// store and surfaces as `ConstraintViolation`.
    async fn set_session(&self, session: &DatabaseSession<Self::SessionAttributes>)
        -> StoreResult<()>;

    /// Rewrite the expiry of a session. Missing sessions are a no-op.
    async fn update_session_expiration(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Delete one session if present.
    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;

    /// Delete every session of a user. Returns the number of rows removed.
    async fn delete_user_sessions(&self, user_id: &str) -> StoreResult<u64>;

    /// Delete every session whose expiry is at or before the adapter clock's
    /// current time. Returns the number of rows removed.
    async fn delete_expired_sessions(&self) -> StoreResult<u64>;
}
