use ndt_hours::clients::{ApiError, MemoryBackend};
use ndt_hours::config::Config;
use ndt_hours::domain::UserId;
use ndt_hours::models::{NewProfile, ProfilePatch};
use ndt_hours::state::SharedState;
use serde_json::{Map, Value, json};
use std::sync::Arc;

fn spawn_state() -> (SharedState, Arc<MemoryBackend>) {
    SharedState::in_memory(Config::default())
}

fn profile_row(id: UserId, name: &str, created_at: &str) -> Value {
    json!({
        "id": id.to_string(),
        "full_name": name,
        "username": name.to_lowercase(),
        "is_admin": null,
        "created_at": created_at,
    })
}

#[tokio::test]
async fn test_toggle_admin_updates_auth_then_profile() {
    let (state, backend) = spawn_state();
    let user = backend.add_user("ada@example.com", "secret", Map::new());
    backend.seed(
        "profiles",
        [profile_row(user.id, "Ada", "2024-01-01T00:00:00+00:00")],
    );
    backend.clear_calls();

    let profile = state
        .users
        .toggle_admin_status(user.id, true)
        .await
        .unwrap()
        .unwrap();

    assert!(profile.is_admin);
    assert_eq!(
        backend.calls(),
        vec!["auth:admin_update_user_by_id", "update:profiles"]
    );
    assert!(backend.user(user.id).unwrap().is_admin());

    let profile = state
        .users
        .toggle_admin_status(user.id, false)
        .await
        .unwrap()
        .unwrap();
    assert!(!profile.is_admin);
    assert!(!backend.user(user.id).unwrap().is_admin());
}

#[tokio::test]
async fn test_toggle_admin_skips_profile_when_auth_update_fails() {
    let (state, backend) = spawn_state();
    let user = UserId::random();
    backend.seed(
        "profiles",
        [profile_row(user, "Ghost", "2024-01-01T00:00:00+00:00")],
    );
    backend.clear_calls();

    let result = state.users.toggle_admin_status(user, true).await;

    assert!(result.is_err());
    assert_eq!(backend.calls(), vec!["auth:admin_update_user_by_id"]);
    assert_eq!(backend.rows("profiles")[0]["is_admin"], Value::Null);
}

#[tokio::test]
async fn test_toggle_admin_keeps_metadata_when_profile_update_fails() {
    let (state, backend) = spawn_state();
    let user = backend.add_user("bob@example.com", "secret", Map::new());
    backend.seed(
        "profiles",
        [profile_row(user.id, "Bob", "2024-01-01T00:00:00+00:00")],
    );
    backend.fail_on(
        "update:profiles",
        ApiError::new(403, "42501", "permission denied for table profiles"),
    );

    let result = state.users.toggle_admin_status(user.id, true).await;

    assert!(result.is_err());
    assert!(backend.user(user.id).unwrap().is_admin());
    assert_eq!(backend.rows("profiles")[0]["is_admin"], Value::Null);
}

#[tokio::test]
async fn test_toggle_admin_without_profile_row() {
    let (state, backend) = spawn_state();
    let user = backend.add_user("carol@example.com", "secret", Map::new());

    let profile = state.users.toggle_admin_status(user.id, true).await.unwrap();

    assert!(profile.is_none());
    assert!(backend.user(user.id).unwrap().is_admin());
}

#[tokio::test]
async fn test_list_profiles_newest_first() {
    let (state, backend) = spawn_state();
    let (a, b, c) = (UserId::random(), UserId::random(), UserId::random());
    backend.seed(
        "profiles",
        [
            profile_row(a, "Ada", "2024-01-01T00:00:00+00:00"),
            profile_row(b, "Bob", "2024-03-01T00:00:00+00:00"),
            profile_row(c, "Carol", "2024-02-01T00:00:00+00:00"),
        ],
    );

    let profiles = state.users.list_profiles().await.unwrap();
    let ids: Vec<UserId> = profiles.iter().map(|p| p.id).collect();

    assert_eq!(ids, vec![b, c, a]);
    assert!(profiles.iter().all(|p| !p.is_admin));
}

#[tokio::test]
async fn test_profile_crud() {
    let (state, backend) = spawn_state();
    let user = UserId::random();

    let created = state
        .users
        .create_profile(NewProfile {
            id: user,
            full_name: Some("Dana Scully".to_string()),
            username: Some("dana".to_string()),
            is_admin: None,
            extra: Map::new(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, user);
    assert!(!created.is_admin);
    assert!(created.created_at.is_some());

    let fetched = state.users.profile(user).await.unwrap();
    assert_eq!(fetched.username.as_deref(), Some("dana"));

    let updated = state
        .users
        .update_profile(
            user,
            ProfilePatch {
                username: Some("scully".to_string()),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.username.as_deref(), Some("scully"));
    assert_eq!(updated.full_name.as_deref(), Some("Dana Scully"));

    state.users.delete_profile(user).await.unwrap();
    assert!(backend.rows("profiles").is_empty());
    assert!(state.users.profile(user).await.is_err());
}

#[tokio::test]
async fn test_update_missing_profile_returns_none() {
    let (state, _backend) = spawn_state();

    let updated = state
        .users
        .update_profile(
            UserId::random(),
            ProfilePatch {
                full_name: Some("Nobody".to_string()),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.is_none());
}
