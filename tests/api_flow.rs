//! End-to-end flow against a running server on an ephemeral port

use clap::Parser;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

use chainhub::db::Store;
use chainhub::{serve, AppState, Args};

const SECRET: &str = "api-flow-test-secret-at-least-32-characters";

async fn start_server() -> String {
    let args = Args::try_parse_from([
        "chainhub",
        "--jwt-secret",
        SECRET,
        "--frontend-url",
        "http://app.test",
    ])
    .unwrap();
    let store = Store::open_in_memory().unwrap();
    let state = Arc::new(AppState::new(args, store).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        serve(listener, state, std::future::pending()).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn signup(client: &reqwest::Client, base: &str, email: &str, username: &str) -> Value {
    let response = client
        .post(format!("{}/signup", base))
        .json(&json!({"email": email, "username": username, "password": "password1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_signup_login_link_lifecycle() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    // Signup and login
    let alice = signup(&client, &base, "a@x.com", "alice").await;
    let tree_id = alice["tree_id"].as_i64().unwrap();
    assert!(alice["token"].as_str().is_some());

    let response = client
        .post(format!("{}/login", base))
        .json(&json!({"email": "a@x.com", "password": "password1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let login: Value = response.json().await.unwrap();
    let alice_token = login["token"].as_str().unwrap().to_string();

    // Create a link
    let response = client
        .post(format!("{}/links", base))
        .bearer_auth(&alice_token)
        .json(&json!({
            "tree_id": tree_id,
            "title": "Site",
            "url": "https://x.com",
            "position": 0,
            "is_active": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let link: Value = response.json().await.unwrap();
    let link_id = link["id"].as_i64().unwrap();

    // Anonymous public read
    let response = client
        .get(format!("{}/tree/alice", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tree: Value = response.json().await.unwrap();
    assert_eq!(tree["links"][0]["id"], link_id);
    assert_eq!(tree["links"][0]["url"], "https://x.com");

    // Another user cannot touch alice's link
    let bob = signup(&client, &base, "b@x.com", "bob").await;
    let bob_token = bob["token"].as_str().unwrap();

    let response = client
        .put(format!("{}/links/{}", base, link_id))
        .bearer_auth(bob_token)
        .json(&json!({"title": "Pwned", "url": "https://evil.com", "position": 0, "is_active": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .delete(format!("{}/links/{}", base, link_id))
        .bearer_auth(bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Owner listing still shows the untouched link
    let response = client
        .get(format!("{}/links?username=alice", base))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Value = response.json().await.unwrap();
    assert_eq!(listed["links"][0]["title"], "Site");

    // Owner deletes
    let response = client
        .delete(format!("{}/links/{}", base, link_id))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let deleted: Value = response.json().await.unwrap();
    assert_eq!(deleted, json!({"deleted": true}));
}

#[tokio::test]
async fn test_auth_and_conflict_errors() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    signup(&client, &base, "a@x.com", "alice").await;

    let response = client
        .get(format!("{}/links?username=alice", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/links?username=alice", base))
        .header("Authorization", "Basic abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{}/signup", base))
        .json(&json!({"email": "a@x.com", "username": "alice2", "password": "password1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "email or username already in use");

    let response = client
        .post(format!("{}/login", base))
        .json(&json!({"identifier": "alice", "password": "wrong-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_checks_and_cors() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/healthz", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "http://app.test");
    assert!(response.headers().contains_key("x-request-id"));

    let response = client.get(format!("{}/readyz", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/links", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get(format!("{}/missing", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_tree_for_non_ascii_username() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    signup(&client, &base, "j@x.com", "jörg").await;

    // The client percent-encodes the path segment
    let response = client
        .get(format!("{}/tree/j%C3%B6rg", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tree: Value = response.json().await.unwrap();
    assert_eq!(tree["username"], "jörg");
}
