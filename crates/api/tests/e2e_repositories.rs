// Repository tests against a real Postgres.
// They run when DATABASE_HOST, DATABASE_PORT, DATABASE_NAME, DATABASE_USERNAME
// and DATABASE_PASSWORD point at a disposable database, and are skipped otherwise.

use chrono::{Duration, Utc};
use database::{Database, SessionRepository, UserRepository};
use services::auth::{
    self, CreateUserResult, NewSession, NewUser, ProviderKind, SessionId, UserId,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Migrations run once per test binary
static MIGRATED: OnceCell<()> = OnceCell::const_new();

async fn test_database() -> Option<Arc<Database>> {
    let db_config = match config::DatabaseConfig::from_env() {
        Ok(db_config) => db_config,
        Err(reason) => {
            eprintln!("Skipping database test: {reason}");
            return None;
        }
    };

    MIGRATED
        .get_or_init(|| async {
            api::init_database(&db_config).await.unwrap();
        })
        .await;

    // Each test runs on its own runtime, so it needs its own pool
    Some(Arc::new(Database::from_config(&db_config).await.unwrap()))
}

fn repositories(
    database: &Database,
) -> (Arc<dyn auth::UserRepository>, Arc<dyn auth::SessionRepository>) {
    (
        Arc::new(UserRepository::new(database.pool().clone())),
        Arc::new(SessionRepository::new(database.pool().clone())),
    )
}

fn new_user(name: &str) -> NewUser {
    NewUser {
        id: UserId::scoped(ProviderKind::Google, &Uuid::new_v4().to_string()),
        name: name.to_string(),
        email: Some(format!("{}@x.com", name.to_lowercase())),
        auth_provider: ProviderKind::Google,
    }
}

fn new_session(user_id: &UserId, expires_in: Duration) -> NewSession {
    NewSession {
        user_id: user_id.clone(),
        token_hash: format!("hash-{}", Uuid::new_v4()),
        expires_at: Utc::now() + expires_in,
    }
}

#[tokio::test]
async fn test_create_if_absent_then_conflict() {
    let Some(database) = test_database().await else {
        return;
    };
    let (users, _) = repositories(&database);

    let alice = new_user("Alice");
    let created = users.create_if_absent(alice.clone()).await.unwrap();
    let CreateUserResult::Created(user) = created else {
        panic!("first insert should create the user");
    };
    assert_eq!(user.id, alice.id);
    assert_eq!(user.auth_provider, ProviderKind::Google);

    let again = NewUser {
        name: "Someone Else".to_string(),
        ..alice.clone()
    };
    assert!(matches!(
        users.create_if_absent(again).await.unwrap(),
        CreateUserResult::Conflict
    ));

    // The original row is untouched
    let stored = users.get_by_id(&alice.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Alice");
    assert_eq!(stored.email.as_deref(), Some("alice@x.com"));
}

#[tokio::test]
async fn test_concurrent_create_if_absent_creates_once() {
    let Some(database) = test_database().await else {
        return;
    };
    let (users, _) = repositories(&database);
    let alice = new_user("Alice");

    let inserts = (0..5).map(|_| {
        let users = users.clone();
        let alice = alice.clone();
        async move { users.create_if_absent(alice).await }
    });
    let results = futures::future::join_all(inserts).await;

    let created = results
        .into_iter()
        .map(|result| result.unwrap())
        .filter(|result| matches!(result, CreateUserResult::Created(_)))
        .count();
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_validate_ignores_expired_sessions() {
    let Some(database) = test_database().await else {
        return;
    };
    let (users, sessions) = repositories(&database);
    let alice = new_user("Alice");
    users.create_if_absent(alice.clone()).await.unwrap();

    let expired = new_session(&alice.id, Duration::minutes(-1));
    let live = new_session(&alice.id, Duration::hours(1));
    sessions.create(expired.clone()).await.unwrap();
    let stored = sessions.create(live.clone()).await.unwrap();

    assert!(sessions.validate(&expired.token_hash).await.unwrap().is_none());
    let found = sessions.validate(&live.token_hash).await.unwrap().unwrap();
    assert_eq!(found.id, stored.id);
    assert_eq!(found.user_id, alice.id);
    assert!(sessions.validate("hash-unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn test_second_revoke_returns_false() {
    let Some(database) = test_database().await else {
        return;
    };
    let (users, sessions) = repositories(&database);
    let alice = new_user("Alice");
    users.create_if_absent(alice.clone()).await.unwrap();

    let session = sessions
        .create(new_session(&alice.id, Duration::hours(1)))
        .await
        .unwrap();

    assert!(sessions.revoke(session.id).await.unwrap());
    assert!(!sessions.revoke(session.id).await.unwrap());
    assert!(sessions
        .validate(&session.token_hash)
        .await
        .unwrap()
        .is_none());
    assert!(!sessions.revoke(SessionId(Uuid::new_v4())).await.unwrap());
}

#[tokio::test]
async fn test_delete_unused_keeps_users_with_sessions() {
    let Some(database) = test_database().await else {
        return;
    };
    let (users, sessions) = repositories(&database);

    let fresh = new_user("Alice");
    users.create_if_absent(fresh.clone()).await.unwrap();
    assert!(users.delete_unused(&fresh.id).await.unwrap());
    assert!(users.get_by_id(&fresh.id).await.unwrap().is_none());

    let active = new_user("Bob");
    users.create_if_absent(active.clone()).await.unwrap();
    sessions
        .create(new_session(&active.id, Duration::hours(1)))
        .await
        .unwrap();
    assert!(!users.delete_unused(&active.id).await.unwrap());
    assert!(users.get_by_id(&active.id).await.unwrap().is_some());
}
