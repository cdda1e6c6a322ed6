// Runs the shared conformance suite against the in-memory backend.

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::Value;

use session_store_core::ColumnMap;
use session_store_memory::{MemoryAdapter, MemoryDatabase};
use session_store_test_utils::{
    test_tables, AdapterFixture, ManualClock, TestAdapter, TestSession, TestSessionAttributes,
    TestUser, TestUserAttributes,
};

type Adapter = MemoryAdapter<TestUserAttributes, TestSessionAttributes>;

struct MemoryFixture;

#[async_trait]
impl AdapterFixture for MemoryFixture {
    type Adapter = Adapter;

    fn name(&self) -> &str {
        "memory"
    }

    async fn build(&self, clock: ManualClock) -> anyhow::Result<Adapter> {
        let (sessions, users) = test_tables();
        Ok(MemoryAdapter::new(MemoryDatabase::new(), sessions, users)?.with_clock(clock.shared()))
    }

    async fn insert_user(&self, adapter: &Adapter, user: &TestUser) -> anyhow::Result<()> {
        adapter.db().insert_user(adapter.user_table(), user).await?;
        Ok(())
    }

    async fn insert_orphan_session(
        &self,
        adapter: &Adapter,
        session: &TestSession,
    ) -> anyhow::Result<bool> {
        let table = adapter.session_table();
        let mut row: ColumnMap = match serde_json::to_value(&session.attributes)? {
            Value::Object(columns) => columns,
            other => anyhow::bail!("attributes serialized to {other}"),
        };
        row.insert(table.id.clone(), Value::from(session.id.clone()));
        row.insert(table.user_id.clone(), Value::from(session.user_id.clone()));
        row.insert(
            table.expires_at.clone(),
            Value::from(
                session
                    .expires_at
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
        );
        adapter.db().insert_row(&table.name, row).await;
        Ok(true)
    }
}

#[tokio::test]
async fn memory_adapter_conformance() -> anyhow::Result<()> {
    session_store_core::env::init_logger();
    TestAdapter::new(MemoryFixture).execute().await
}
