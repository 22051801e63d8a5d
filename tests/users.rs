//! Profile and account tests.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

// ===========================================================================
// Public profiles
// ===========================================================================

#[tokio::test]
async fn profile_shows_counts() {
    let app = app().await;
    let user = app.create_user("prof_counts").await;
    let fan_a = app.create_user("prof_counts_fan_a").await;
    let fan_b = app.create_user("prof_counts_fan_b").await;

    app.create_post_for_user(user.id, "first").await;
    app.create_post_for_user(user.id, "second").await;

    for fan in [&fan_a, &fan_b] {
        let resp = app
            .post_json(
                &format!("/users/{}/follow", user.username),
                json!({}),
                Some(&fan.token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let resp = app.get(&format!("/users/{}", user.username), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), user.username);
    assert_eq!(body["followers_count"].as_i64().unwrap(), 2);
    assert_eq!(body["following_count"].as_i64().unwrap(), 0);
    assert_eq!(body["posts_count"].as_i64().unwrap(), 2);
    // Profiles are public and never expose the email.
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn profile_unknown_user() {
    let app = app().await;

    let resp = app.get("/users/prof_no_such_user", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

// ===========================================================================
// Profile editing
// ===========================================================================

#[tokio::test]
async fn update_bio() {
    let app = app().await;
    let user = app.create_user("prof_bio").await;

    let resp = app
        .patch_json(
            "/auth/me",
            json!({ "bio": "rustacean, feeds on microposts" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json()["bio"].as_str().unwrap(),
        "rustacean, feeds on microposts"
    );

    // The public profile reflects the change
    let resp = app.get(&format!("/users/{}", user.username), None).await;
    assert_eq!(
        resp.json()["bio"].as_str().unwrap(),
        "rustacean, feeds on microposts"
    );
}

#[tokio::test]
async fn update_bio_too_long() {
    let app = app().await;
    let user = app.create_user("prof_bio_long").await;

    let resp = app
        .patch_json(
            "/auth/me",
            json!({ "bio": "a".repeat(141) }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "bio must be at most 140 characters");
}

#[tokio::test]
async fn update_username() {
    let app = app().await;
    let user = app.create_user("prof_rename").await;

    let resp = app
        .patch_json(
            "/auth/me",
            json!({ "username": "prof_rename_new" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["username"].as_str().unwrap(), "prof_rename_new");

    let resp = app.get("/users/prof_rename_new", None).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn update_username_conflict() {
    let app = app().await;
    let user = app.create_user("prof_conflict_a").await;
    let other = app.create_user("prof_conflict_b").await;

    let resp = app
        .patch_json(
            "/auth/me",
            json!({ "username": other.username }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "username already taken");
}

#[tokio::test]
async fn update_profile_requires_auth() {
    let app = app().await;

    let resp = app.patch_json("/auth/me", json!({ "bio": "nope" }), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Last seen
// ===========================================================================

#[tokio::test]
async fn last_seen_touched_by_authenticated_request() {
    let app = app().await;
    let user = app.create_user("prof_lastseen").await;

    // Nothing authenticated has happened yet
    let resp = app.get(&format!("/users/{}", user.username), None).await;
    assert!(resp.json()["last_seen"].is_null());

    let resp = app.get("/auth/me", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get(&format!("/users/{}", user.username), None).await;
    assert!(resp.json()["last_seen"].is_string());
}
