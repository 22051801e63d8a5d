//! Post creation and listing tests.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use time::{Duration, OffsetDateTime};

// ===========================================================================
// Post creation
// ===========================================================================

#[tokio::test]
async fn create_post_valid() {
    let app = app().await;
    let user = app.create_user("post_create").await;

    let resp = app
        .post_json(
            "/posts",
            json!({ "body": "Beautiful day in Portland!" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["id"].is_i64());
    assert_eq!(body["author_id"].as_i64().unwrap(), user.id);
    assert_eq!(body["author_username"].as_str().unwrap(), user.username);
    assert_eq!(body["body"].as_str().unwrap(), "Beautiful day in Portland!");
    assert!(body["created_at"].is_string());
}

#[tokio::test]
async fn create_post_empty_body() {
    let app = app().await;
    let user = app.create_user("post_empty").await;

    let resp = app
        .post_json("/posts", json!({ "body": "   " }), Some(&user.token))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "post body cannot be empty");
}

#[tokio::test]
async fn create_post_body_too_long() {
    let app = app().await;
    let user = app.create_user("post_long").await;

    let resp = app
        .post_json(
            "/posts",
            json!({ "body": "a".repeat(141) }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "post must be at most 140 characters");
}

#[tokio::test]
async fn create_post_at_limit() {
    let app = app().await;
    let user = app.create_user("post_limit").await;

    let resp = app
        .post_json(
            "/posts",
            json!({ "body": "a".repeat(140) }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn create_post_requires_auth() {
    let app = app().await;

    let resp = app.post_json("/posts", json!({ "body": "anon" }), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Listing
// ===========================================================================

#[tokio::test]
async fn list_user_posts_newest_first() {
    let app = app().await;
    let user = app.create_user("post_order").await;

    let base = OffsetDateTime::now_utc() - Duration::minutes(10);
    app.create_post_at(user.id, "older", base).await;
    app.create_post_at(user.id, "newer", base + Duration::minutes(5))
        .await;

    let resp = app
        .get(&format!("/users/{}/posts?limit=10", user.username), None)
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["body"].as_str().unwrap(), "newer");
    assert_eq!(items[1]["body"].as_str().unwrap(), "older");
}

#[tokio::test]
async fn list_user_posts_pagination() {
    let app = app().await;
    let user = app.create_user("post_pages").await;

    let base = OffsetDateTime::now_utc() - Duration::minutes(10);
    for i in 0..3 {
        app.create_post_at(user.id, &format!("post {}", i), base + Duration::minutes(i))
            .await;
    }

    let resp = app
        .get(&format!("/users/{}/posts?limit=2", user.username), None)
        .await;
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    let cursor = body["next_cursor"].as_str().unwrap().to_string();

    let resp = app
        .get(
            &format!("/users/{}/posts?limit=2&cursor={}", user.username, cursor),
            None,
        )
        .await;
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["body"].as_str().unwrap(), "post 0");
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn list_posts_unknown_user() {
    let app = app().await;

    let resp = app.get("/users/post_no_such_user/posts", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
