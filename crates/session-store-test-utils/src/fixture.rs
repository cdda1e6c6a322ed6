// Fixture trait implemented once per backend so the conformance suite can
// build fresh adapters and manage users, which live outside the adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use session_store_core::{DatabaseSession, DatabaseUser, SessionStoreAdapter, SessionTable, UserTable};

use crate::clock::ManualClock;

/// User attribute bag used by every conformance case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUserAttributes {
    pub username: String,
}

/// Session attribute bag used by every conformance case. Mixes a string,
/// a number and a bool so backends must keep each column's JSON type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSessionAttributes {
    pub country: String,
    pub login_count: u32,
    pub remember_me: bool,
}

impl TestSessionAttributes {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            login_count: 1,
            remember_me: true,
        }
    }
}

pub type TestUser = DatabaseUser<TestUserAttributes>;
pub type TestSession = DatabaseSession<TestSessionAttributes>;

/// Table descriptors matching the attribute bags above.
pub fn test_tables() -> (SessionTable, UserTable) {
    (
        SessionTable::new("test_session")
            .with_attribute("country")
            .with_attribute("login_count")
            .with_attribute("remember_me"),
        UserTable::new("test_user").with_attribute("username"),
    )
}

/// Backend hooks required by [`TestAdapter`](crate::TestAdapter).
#[async_trait]
pub trait AdapterFixture: Send + Sync {
    type Adapter: SessionStoreAdapter<
        UserAttributes = TestUserAttributes,
        SessionAttributes = TestSessionAttributes,
    >;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// A fresh, empty store whose tables are [`test_tables`], with `clock`
    /// installed as the adapter clock.
    async fn build(&self, clock: ManualClock) -> anyhow::Result<Self::Adapter>;

    /// Create a user row the way account-management code would.
    async fn insert_user(&self, adapter: &Self::Adapter, user: &TestUser) -> anyhow::Result<()>;

    /// Store a session whose user row does not exist, bypassing referential
    /// checks. Returns `false` when the backend cannot represent that state,
    /// in which case the orphan case is skipped.
    async fn insert_orphan_session(
        &self,
        adapter: &Self::Adapter,
        session: &TestSession,
    ) -> anyhow::Result<bool>;
}
