use httpmock::prelude::*;
use httpmock::Method::PATCH;
use ndt_hours::clients::{
    AuthBackend, BackendError, Direction, Filter, Query, SessionStore, SupabaseClient,
    TableBackend,
};
use ndt_hours::config::Config;
use ndt_hours::domain::{EntryId, UserId};
use ndt_hours::models::{AdminUserAttributes, Session};
use ndt_hours::state::SharedState;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const ANON_KEY: &str = "anon-key";

fn user_json(id: UserId, email: &str) -> Value {
    json!({
        "id": id.to_string(),
        "aud": "authenticated",
        "role": "authenticated",
        "email": email,
        "user_metadata": { "full_name": "Ada" },
        "app_metadata": { "provider": "email" },
    })
}

fn token_json(id: UserId, email: &str, access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": "refresh-1",
        "token_type": "bearer",
        "expires_in": 3600,
        "user": user_json(id, email),
    })
}

#[tokio::test]
async fn test_select_sends_postgrest_params_and_keys() {
    let server = MockServer::start_async().await;
    let user = UserId::random();

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/ndt_entries")
                .query_param("select", "method,hours")
                .query_param("user_id", format!("eq.{user}"))
                .query_param("entry_date", "gte.2024-01-01")
                .query_param("order", "entry_date.desc")
                .query_param("limit", "10")
                .header("apikey", ANON_KEY)
                .header("authorization", format!("Bearer {ANON_KEY}"));
            then.status(200)
                .json_body(json!([{ "method": "UT", "hours": 2.5 }]));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap();
    let query = Query::table("ndt_entries")
        .select("method, hours")
        .eq("user_id", user)
        .gte("entry_date", "2024-01-01")
        .order("entry_date", Direction::Desc)
        .limit(10);

    let rows = client.select(&query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(rows, vec![json!({ "method": "UT", "hours": 2.5 })]);
}

#[tokio::test]
async fn test_single_row_miss_maps_to_not_found() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/ndt_signatures")
                .header("accept", "application/vnd.pgrst.object+json");
            then.status(406).json_body(json!({
                "code": "PGRST116",
                "details": "The result contains 0 rows",
                "hint": null,
                "message": "JSON object requested, multiple (or no) rows returned"
            }));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap();
    let query = Query::table("ndt_signatures").eq("entry_id", "x").limit(1);

    let err = client.select_single(&query).await.unwrap_err();

    mock.assert_async().await;
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_other_api_errors_keep_their_code() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/profiles");
            then.status(401).json_body(json!({
                "code": "PGRST301",
                "message": "JWT expired"
            }));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap();
    let err = client
        .select(&Query::table("profiles"))
        .await
        .unwrap_err();

    assert!(!err.is_not_found());
    assert_eq!(err.code(), Some("PGRST301"));
}

#[tokio::test]
async fn test_insert_and_update_ask_for_representation() {
    let server = MockServer::start_async().await;
    let entry = EntryId::random();

    let insert = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/ndt_entries")
                .header("prefer", "return=representation")
                .json_body(json!([{ "method": "UT", "hours": 2.0 }]));
            then.status(201)
                .json_body(json!([{ "id": entry.to_string(), "method": "UT", "hours": 2.0 }]));
        })
        .await;

    let update = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/ndt_entries")
                .query_param("id", format!("eq.{entry}"))
                .header("prefer", "return=representation")
                .json_body(json!({ "hours": 3.0 }));
            then.status(200).json_body(json!([]));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap();

    let inserted = client
        .insert("ndt_entries", vec![json!({ "method": "UT", "hours": 2.0 })])
        .await
        .unwrap();
    assert_eq!(inserted[0]["id"], entry.to_string());

    let updated = client
        .update(
            "ndt_entries",
            &[Filter::eq("id", entry)],
            json!({ "hours": 3.0 }),
        )
        .await
        .unwrap();
    assert!(updated.is_empty());

    insert.assert_async().await;
    update.assert_async().await;
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/project/rest/v1/ndt_signatures")
                .query_param("entry_id", "eq.e1");
            then.status(204);
        })
        .await;

    let client = SupabaseClient::new(&server.url("/project"), ANON_KEY).unwrap();
    client
        .delete("ndt_signatures", &[Filter::eq("entry_id", "e1")])
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_sign_in_uses_access_token_afterwards() {
    let server = MockServer::start_async().await;
    let user = UserId::random();

    let token = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "password")
                .json_body(json!({ "email": "ada@example.com", "password": "secret" }));
            then.status(200)
                .json_body(token_json(user, "ada@example.com", "access-1"));
        })
        .await;

    let profiles = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/profiles")
                .header("authorization", "Bearer access-1")
                .header("apikey", ANON_KEY);
            then.status(200).json_body(json!([]));
        })
        .await;

    let me = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/user")
                .header("authorization", "Bearer access-1");
            then.status(200).json_body(user_json(user, "ada@example.com"));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap();
    let response = client
        .sign_in_with_password("ada@example.com", "secret")
        .await
        .unwrap();
    assert_eq!(response.user.map(|u| u.id), Some(user));

    client.select(&Query::table("profiles")).await.unwrap();
    let current = client.get_user().await.unwrap();
    assert_eq!(current.email.as_deref(), Some("ada@example.com"));

    token.assert_async().await;
    profiles.assert_async().await;
    me.assert_async().await;
}

#[tokio::test]
async fn test_get_user_without_session() {
    let client = SupabaseClient::new("http://127.0.0.1:9", ANON_KEY).unwrap();

    let err = client.get_user().await.unwrap_err();
    assert!(matches!(err, BackendError::SessionMissing));
    assert!(client.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_out_tolerates_revoked_token() {
    let server = MockServer::start_async().await;
    let user = UserId::random();

    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/token");
            then.status(200)
                .json_body(token_json(user, "ada@example.com", "access-1"));
        })
        .await;

    let logout = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/logout")
                .header("authorization", "Bearer access-1");
            then.status(401).json_body(json!({ "msg": "invalid JWT" }));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap();
    client
        .sign_in_with_password("ada@example.com", "secret")
        .await
        .unwrap();

    client.sign_out().await.unwrap();

    logout.assert_async().await;
    assert!(client.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_update_needs_service_role_key() {
    let server = MockServer::start_async().await;
    let user = UserId::random();

    let admin = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path(format!("/auth/v1/admin/users/{user}"))
                .header("authorization", "Bearer service-key")
                .header("apikey", "service-key")
                .json_body(json!({ "user_metadata": { "is_admin": true } }));
            then.status(200).json_body(user_json(user, "ada@example.com"));
        })
        .await;

    let mut metadata = Map::new();
    metadata.insert("is_admin".to_string(), Value::Bool(true));
    let attributes = AdminUserAttributes {
        user_metadata: Some(metadata),
        app_metadata: None,
    };

    let anon_only = SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap();
    let err = anon_only
        .admin_update_user_by_id(user, attributes.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Config(_)));
    assert_eq!(admin.hits_async().await, 0);

    let privileged = SupabaseClient::new(&server.base_url(), ANON_KEY)
        .unwrap()
        .with_service_role_key("service-key");
    let updated = privileged
        .admin_update_user_by_id(user, attributes)
        .await
        .unwrap();
    assert_eq!(updated.id, user);
    admin.assert_async().await;
}

#[tokio::test]
async fn test_session_survives_restart() {
    let server = MockServer::start_async().await;
    let user = UserId::random();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/token");
            then.status(200)
                .json_body(token_json(user, "ada@example.com", "access-1"));
        })
        .await;

    let entries = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/ndt_entries")
                .header("authorization", "Bearer access-1");
            then.status(200).json_body(json!([]));
        })
        .await;

    let first = SupabaseClient::new(&server.base_url(), ANON_KEY)
        .unwrap()
        .with_session_store(SessionStore::new(&path))
        .unwrap();
    first
        .sign_in_with_password("ada@example.com", "secret")
        .await
        .unwrap();
    assert!(path.exists());

    let second = SupabaseClient::new(&server.base_url(), ANON_KEY)
        .unwrap()
        .with_session_store(SessionStore::new(&path))
        .unwrap();
    second
        .select(&Query::table("ndt_entries"))
        .await
        .unwrap();
    entries.assert_async().await;

    second.sign_out().await.ok();
    assert!(!path.exists());
}

fn expired_session(user: UserId) -> Session {
    let mut body = token_json(user, "ada@example.com", "access-old");
    body["refresh_token"] = json!("refresh-old");
    body["expires_at"] = json!(1);
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn test_expired_session_is_refreshed_before_use() {
    let server = MockServer::start_async().await;
    let user = UserId::random();
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&expired_session(user)).unwrap();

    let refresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "refresh_token")
                .header("apikey", ANON_KEY)
                .json_body(json!({ "refresh_token": "refresh-old" }));
            then.status(200)
                .json_body(token_json(user, "ada@example.com", "access-new"));
        })
        .await;

    let entries = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/ndt_entries")
                .header("authorization", "Bearer access-new");
            then.status(200).json_body(json!([]));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY)
        .unwrap()
        .with_session_store(store.clone())
        .unwrap();

    client
        .select(&Query::table("ndt_entries"))
        .await
        .unwrap();
    client
        .select(&Query::table("ndt_entries"))
        .await
        .unwrap();

    assert_eq!(refresh.hits_async().await, 1);
    assert_eq!(entries.hits_async().await, 2);

    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.access_token, "access-new");
    assert!(saved.expires_at.is_some_and(|at| at > 1));
}

#[tokio::test]
async fn test_rejected_refresh_drops_session() {
    let server = MockServer::start_async().await;
    let user = UserId::random();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store = SessionStore::new(&path);
    store.save(&expired_session(user)).unwrap();

    let refresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "refresh_token");
            then.status(400).json_body(json!({
                "code": "refresh_token_not_found",
                "msg": "Invalid Refresh Token: Refresh Token Not Found"
            }));
        })
        .await;

    let anonymous_read = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/profiles")
                .header("authorization", format!("Bearer {ANON_KEY}"));
            then.status(200).json_body(json!([]));
        })
        .await;

    let client = SupabaseClient::new(&server.base_url(), ANON_KEY)
        .unwrap()
        .with_session_store(store)
        .unwrap();

    let err = client.get_session().await.unwrap_err();
    assert_eq!(err.code(), Some("refresh_token_not_found"));
    assert!(!path.exists());

    assert!(client.get_session().await.unwrap().is_none());
    assert!(matches!(
        client.get_user().await.unwrap_err(),
        BackendError::SessionMissing
    ));
    client.select(&Query::table("profiles")).await.unwrap();

    assert_eq!(refresh.hits_async().await, 1);
    anonymous_read.assert_async().await;
}

#[tokio::test]
async fn test_has_signature_over_http() {
    let server = MockServer::start_async().await;
    let signed = EntryId::random();
    let unsigned = EntryId::random();

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/ndt_signatures")
                .query_param("entry_id", format!("eq.{signed}"))
                .query_param("limit", "1");
            then.status(200).json_body(json!({ "id": "s1" }));
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/ndt_signatures")
                .query_param("entry_id", format!("eq.{unsigned}"));
            then.status(406).json_body(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned"
            }));
        })
        .await;

    let client = Arc::new(SupabaseClient::new(&server.base_url(), ANON_KEY).unwrap());
    let state = SharedState::with_backend(Config::default(), client.clone(), client);

    assert!(state.entries.has_signature(signed).await.unwrap());
    assert!(!state.entries.has_signature(unsigned).await.unwrap());
}
