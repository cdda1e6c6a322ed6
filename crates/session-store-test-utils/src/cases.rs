// Conformance cases, one per observable guarantee of the adapter contract.
//
// Each case gets a fresh adapter and a manual clock positioned at the suite
// epoch, and reports failure through `anyhow`.

use anyhow::{bail, ensure, Context};
use chrono::{DateTime, Duration, Utc};

use session_store_core::{Clock, DatabaseSession, DatabaseUser, SessionStoreAdapter};

use crate::clock::{suite_epoch, ManualClock};
use crate::fixture::{
    AdapterFixture, TestSession, TestSessionAttributes, TestUser, TestUserAttributes,
};

/// How a case ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Skipped(String),
}

/// Every conformance case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Case {
    SetThenGet,
    GetMissing,
    UserSessions,
    DuplicateSessionId,
    MissingUserReference,
    UpdateExpiration,
    UpdateMissingSession,
    DeleteSession,
    DeleteUserSessions,
    DeleteExpiredSessions,
    ExpiryScenario,
    OrphanedSession,
    AttributeTypes,
}

impl Case {
    pub const ALL: [Case; 13] = [
        Case::SetThenGet,
        Case::GetMissing,
        Case::UserSessions,
        Case::DuplicateSessionId,
        Case::MissingUserReference,
        Case::UpdateExpiration,
        Case::UpdateMissingSession,
        Case::DeleteSession,
        Case::DeleteUserSessions,
        Case::DeleteExpiredSessions,
        Case::ExpiryScenario,
        Case::OrphanedSession,
        Case::AttributeTypes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Case::SetThenGet => "set session then get session and user",
            Case::GetMissing => "lookups of unknown ids are empty",
            Case::UserSessions => "list sessions of a user",
            Case::DuplicateSessionId => "duplicate session id is a constraint violation",
            Case::MissingUserReference => "session for unknown user is a constraint violation",
            Case::UpdateExpiration => "update expiration is exact",
            Case::UpdateMissingSession => "update expiration of unknown session is a no-op",
            Case::DeleteSession => "delete session",
            Case::DeleteUserSessions => "delete all sessions of a user",
            Case::DeleteExpiredSessions => "delete expired sessions removes expires_at <= now",
            Case::ExpiryScenario => "session disappears after expiry and sweep",
            Case::OrphanedSession => "session without user reads as not found",
            Case::AttributeTypes => "attribute bags keep string, number and bool values",
        }
    }

    /// Run this case against a freshly built adapter.
    pub async fn run<F: AdapterFixture>(self, fixture: &F) -> anyhow::Result<Outcome> {
        let clock = ManualClock::epoch();
        let adapter = fixture
            .build(clock.clone())
            .await
            .context("building adapter")?;
        let ctx = Ctx {
            fixture,
            adapter: &adapter,
            clock,
        };

        match self {
            Case::SetThenGet => set_then_get(&ctx).await,
            Case::GetMissing => get_missing(&ctx).await,
            Case::UserSessions => user_sessions(&ctx).await,
            Case::DuplicateSessionId => duplicate_session_id(&ctx).await,
            Case::MissingUserReference => missing_user_reference(&ctx).await,
            Case::UpdateExpiration => update_expiration(&ctx).await,
            Case::UpdateMissingSession => update_missing_session(&ctx).await,
            Case::DeleteSession => delete_session(&ctx).await,
            Case::DeleteUserSessions => delete_user_sessions(&ctx).await,
            Case::DeleteExpiredSessions => delete_expired_sessions(&ctx).await,
            Case::ExpiryScenario => expiry_scenario(&ctx).await,
            Case::OrphanedSession => orphaned_session(&ctx).await,
            Case::AttributeTypes => attribute_types(&ctx).await,
        }
    }
}

struct Ctx<'a, F: AdapterFixture> {
    fixture: &'a F,
    adapter: &'a F::Adapter,
    clock: ManualClock,
}

impl<F: AdapterFixture> Ctx<'_, F> {
    async fn user(&self, id: &str) -> anyhow::Result<TestUser> {
        let user = DatabaseUser::new(
            id,
            TestUserAttributes {
                username: format!("{id}-name"),
            },
        );
        self.fixture
            .insert_user(self.adapter, &user)
            .await
            .with_context(|| format!("inserting user {id}"))?;
        Ok(user)
    }

    async fn session(
        &self,
        id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<TestSession> {
        let session = new_session(id, user_id, expires_at);
        self.adapter
            .set_session(&session)
            .await
            .with_context(|| format!("storing session {id}"))?;
        Ok(session)
    }
}

fn new_session(id: &str, user_id: &str, expires_at: DateTime<Utc>) -> TestSession {
    DatabaseSession::new(
        id,
        user_id,
        expires_at,
        TestSessionAttributes::new(format!("{id}-country")),
    )
}

fn sorted_ids(sessions: &[TestSession]) -> Vec<&str> {
    let mut ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
    ids.sort_unstable();
    ids
}

async fn set_then_get<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    let user = ctx.user("u1").await?;
    let session = ctx.session("s1", "u1", suite_epoch() + Duration::hours(1)).await?;

    let Some((found_session, found_user)) = ctx.adapter.get_session_and_user("s1").await? else {
        bail!("stored session was not found");
    };
    ensure!(found_session == session, "session read back as {found_session:?}");
    ensure!(found_user == user, "user read back as {found_user:?}");
    Ok(Outcome::Passed)
}

async fn get_missing<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    ensure!(ctx.adapter.get_session_and_user("nope").await?.is_none());
    ensure!(ctx.adapter.get_user_sessions("u1").await?.is_empty());
    ensure!(ctx.adapter.get_user_sessions("nobody").await?.is_empty());
    Ok(Outcome::Passed)
}

async fn user_sessions<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    ctx.user("u2").await?;
    let expires = suite_epoch() + Duration::hours(1);
    let s1 = ctx.session("s1", "u1", expires).await?;
    ctx.session("s2", "u1", expires + Duration::minutes(5)).await?;
    ctx.session("s3", "u2", expires).await?;

    let sessions = ctx.adapter.get_user_sessions("u1").await?;
    ensure!(sorted_ids(&sessions) == ["s1", "s2"], "got {:?}", sorted_ids(&sessions));
    let read_s1 = sessions.iter().find(|s| s.id == "s1");
    ensure!(read_s1 == Some(&s1), "s1 read back as {read_s1:?}");

    let sessions = ctx.adapter.get_user_sessions("u2").await?;
    ensure!(sorted_ids(&sessions) == ["s3"], "got {:?}", sorted_ids(&sessions));
    Ok(Outcome::Passed)
}

async fn duplicate_session_id<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    ctx.user("u2").await?;
    let first = ctx.session("s1", "u1", suite_epoch() + Duration::hours(1)).await?;

    let mut clash = new_session("s1", "u2", suite_epoch() + Duration::days(30));
    clash.attributes.country = "elsewhere".into();
    match ctx.adapter.set_session(&clash).await {
        Err(e) if e.is_constraint_violation() => {}
        Err(e) => bail!("expected a constraint violation, got {e}"),
        Ok(()) => bail!("duplicate session id was accepted"),
    }

    let stored = ctx.adapter.get_session_and_user("s1").await?.map(|(s, _)| s);
    ensure!(stored.as_ref() == Some(&first), "first row changed to {stored:?}");
    ensure!(ctx.adapter.get_user_sessions("u2").await?.is_empty());
    Ok(Outcome::Passed)
}

async fn missing_user_reference<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    let session = new_session("s1", "ghost", suite_epoch() + Duration::hours(1));
    match ctx.adapter.set_session(&session).await {
        Err(e) if e.is_constraint_violation() => {}
        Err(e) => bail!("expected a constraint violation, got {e}"),
        Ok(()) => bail!("session referencing a missing user was accepted"),
    }
    ensure!(ctx.adapter.get_session_and_user("s1").await?.is_none());
    ensure!(ctx.adapter.get_user_sessions("ghost").await?.is_empty());
    Ok(Outcome::Passed)
}

async fn update_expiration<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    let mut session = ctx.session("s1", "u1", suite_epoch() + Duration::hours(1)).await?;

    // Sub-second part with microsecond resolution, which every SQL backend keeps.
    let refreshed = suite_epoch() + Duration::days(30) + Duration::microseconds(123_456);
    ctx.adapter.update_session_expiration("s1", refreshed).await?;

    let Some((found, _)) = ctx.adapter.get_session_and_user("s1").await? else {
        bail!("session vanished after expiration update");
    };
    ensure!(
        found.expires_at == refreshed,
        "expires_at read back as {} instead of {refreshed}",
        found.expires_at
    );
    session.expires_at = refreshed;
    ensure!(found == session, "update touched other fields: {found:?}");
    Ok(Outcome::Passed)
}

async fn update_missing_session<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    let other = ctx.session("s1", "u1", suite_epoch() + Duration::hours(1)).await?;

    ctx.adapter
        .update_session_expiration("missing", suite_epoch() + Duration::days(1))
        .await
        .context("updating a missing session must not fail")?;

    ensure!(ctx.adapter.get_session_and_user("missing").await?.is_none());
    let stored = ctx.adapter.get_session_and_user("s1").await?.map(|(s, _)| s);
    ensure!(stored.as_ref() == Some(&other), "unrelated session changed to {stored:?}");
    Ok(Outcome::Passed)
}

async fn delete_session<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    let expires = suite_epoch() + Duration::hours(1);
    ctx.session("s1", "u1", expires).await?;
    ctx.session("s2", "u1", expires).await?;

    ctx.adapter.delete_session("s1").await?;
    ensure!(ctx.adapter.get_session_and_user("s1").await?.is_none());
    ensure!(ctx.adapter.get_session_and_user("s2").await?.is_some());

    // Deleting again, or deleting something that never existed, is a no-op.
    ctx.adapter.delete_session("s1").await?;
    ctx.adapter.delete_session("never").await?;
    let remaining = ctx.adapter.get_user_sessions("u1").await?;
    ensure!(sorted_ids(&remaining) == ["s2"], "got {:?}", sorted_ids(&remaining));
    Ok(Outcome::Passed)
}

async fn delete_user_sessions<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    ctx.user("u2").await?;
    let expires = suite_epoch() + Duration::hours(1);
    ctx.session("s1", "u1", expires).await?;
    ctx.session("s2", "u1", expires).await?;
    ctx.session("s3", "u2", expires).await?;

    let removed = ctx.adapter.delete_user_sessions("u1").await?;
    ensure!(removed == 2, "removed {removed} rows instead of 2");
    ensure!(ctx.adapter.get_user_sessions("u1").await?.is_empty());
    ensure!(ctx.adapter.get_session_and_user("s3").await?.is_some());

    let removed = ctx.adapter.delete_user_sessions("u1").await?;
    ensure!(removed == 0, "second delete removed {removed} rows");
    let removed = ctx.adapter.delete_user_sessions("nobody").await?;
    ensure!(removed == 0, "delete for unknown user removed {removed} rows");
    Ok(Outcome::Passed)
}

async fn delete_expired_sessions<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    let now = suite_epoch() + Duration::days(1);

    ctx.session("past", "u1", now - Duration::hours(1)).await?;
    ctx.session("boundary", "u1", now).await?;
    ctx.session("soon", "u1", now + Duration::seconds(1)).await?;
    ctx.session("later", "u1", now + Duration::days(7)).await?;

    ctx.clock.set(now);
    let removed = ctx.adapter.delete_expired_sessions().await?;
    ensure!(removed == 2, "sweep removed {removed} rows instead of 2");

    let remaining = ctx.adapter.get_user_sessions("u1").await?;
    ensure!(
        sorted_ids(&remaining) == ["later", "soon"],
        "got {:?}",
        sorted_ids(&remaining)
    );

    let removed = ctx.adapter.delete_expired_sessions().await?;
    ensure!(removed == 0, "second sweep removed {removed} rows");
    Ok(Outcome::Passed)
}

async fn expiry_scenario<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    let t = ctx.clock.now();
    let user = ctx.user("u1").await?;
    let session = ctx.session("s1", "u1", t + Duration::hours(1)).await?;

    let found = ctx.adapter.get_session_and_user("s1").await?;
    ensure!(found == Some((session.clone(), user)), "lookup before expiry gave {found:?}");

    ctx.clock.advance(Duration::hours(1) + Duration::seconds(1));

    // Until the sweep runs the row is still readable, just no longer valid.
    let Some((stale, _)) = ctx.adapter.get_session_and_user("s1").await? else {
        bail!("expired session vanished before the sweep");
    };
    ensure!(!stale.is_valid_at(ctx.clock.now()));

    let removed = ctx.adapter.delete_expired_sessions().await?;
    ensure!(removed == 1, "sweep removed {removed} rows instead of 1");
    ensure!(ctx.adapter.get_session_and_user("s1").await?.is_none());
    Ok(Outcome::Passed)
}

async fn orphaned_session<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    let session = new_session("s1", "ghost", suite_epoch() + Duration::hours(1));
    if !ctx.fixture.insert_orphan_session(ctx.adapter, &session).await? {
        return Ok(Outcome::Skipped(
            "backend cannot hold a session without its user".into(),
        ));
    }
    let found = ctx.adapter.get_session_and_user("s1").await?;
    ensure!(found.is_none(), "orphaned session returned {found:?}");
    Ok(Outcome::Passed)
}

async fn attribute_types<F: AdapterFixture>(ctx: &Ctx<'_, F>) -> anyhow::Result<Outcome> {
    ctx.user("u1").await?;
    let expires = suite_epoch() + Duration::hours(1);

    // Strings that look like other JSON values must stay strings.
    let mut numeric = new_session("s1", "u1", expires);
    numeric.attributes = TestSessionAttributes {
        country: "42".into(),
        login_count: 0,
        remember_me: false,
    };
    let mut boolish = new_session("s2", "u1", expires);
    boolish.attributes = TestSessionAttributes {
        country: "true".into(),
        login_count: u32::MAX,
        remember_me: true,
    };
    for session in [&numeric, &boolish] {
        ctx.adapter
            .set_session(session)
            .await
            .with_context(|| format!("storing session {}", session.id))?;
    }

    for expected in [&numeric, &boolish] {
        let found = ctx
            .adapter
            .get_session_and_user(&expected.id)
            .await?
            .map(|(s, _)| s);
        ensure!(found.as_ref() == Some(expected), "{} read back as {found:?}", expected.id);
    }

    let mut listed = ctx.adapter.get_user_sessions("u1").await?;
    listed.sort_by(|a, b| a.id.cmp(&b.id));
    ensure!(listed == [numeric.clone(), boolish.clone()], "listed as {listed:?}");

    let refreshed = expires + Duration::days(1);
    ctx.adapter.update_session_expiration("s1", refreshed).await?;
    let found = ctx.adapter.get_session_and_user("s1").await?.map(|(s, _)| s);
    ensure!(
        found.as_ref().map(|s| &s.attributes) == Some(&numeric.attributes),
        "expiration update changed attributes: {found:?}"
    );
    Ok(Outcome::Passed)
}
