//! Home feed tests.
//!
//! The feed contract: every post whose author is the requesting account or
//! an account it follows, newest first, each post exactly once.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

fn feed_bodies(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["body"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn feed_of_own_and_followed_posts() {
    let app = app().await;
    let u1 = app.create_user("feed_u1").await;
    let u2 = app.create_user("feed_u2").await;

    let t1 = OffsetDateTime::now_utc() - Duration::minutes(10);
    let t2 = t1 + Duration::minutes(5);
    app.create_post_at(u1.id, "hello", t1).await;
    app.create_post_at(u2.id, "world", t2).await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", u2.username),
            json!({}),
            Some(&u1.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    // u1 follows u2: sees both posts, newest first
    let resp = app.get("/feed", Some(&u1.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(feed_bodies(&resp.json()), vec!["world", "hello"]);

    // u2 does not follow u1: sees only their own post
    let resp = app.get("/feed", Some(&u2.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(feed_bodies(&resp.json()), vec!["world"]);
}

#[tokio::test]
async fn feed_empty_for_new_account() {
    let app = app().await;
    let user = app.create_user("feed_lonely").await;

    let resp = app.get("/feed", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn feed_excludes_unfollowed_authors() {
    let app = app().await;
    let viewer = app.create_user("feed_excl_viewer").await;
    let followed = app.create_user("feed_excl_followed").await;
    let stranger = app.create_user("feed_excl_stranger").await;

    app.create_post_for_user(followed.id, "from followed").await;
    app.create_post_for_user(stranger.id, "from stranger").await;

    app.post_json(
        &format!("/users/{}/follow", followed.username),
        json!({}),
        Some(&viewer.token),
    )
    .await;

    let resp = app.get("/feed", Some(&viewer.token)).await;
    let bodies = feed_bodies(&resp.json());
    assert_eq!(bodies, vec!["from followed"]);
}

#[tokio::test]
async fn feed_self_edge_does_not_duplicate() {
    let app = app().await;
    let user = app.create_user("feed_selfedge").await;
    app.create_post_for_user(user.id, "only once").await;

    // The schema does not forbid self-edges; the feed union must still
    // yield each post exactly once.
    app.insert_follow_edge(user.id, user.id).await;

    let resp = app.get("/feed", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(feed_bodies(&resp.json()), vec!["only once"]);
}

#[tokio::test]
async fn feed_follows_unfollow_round_trip() {
    let app = app().await;
    let viewer = app.create_user("feed_rt_viewer").await;
    let author = app.create_user("feed_rt_author").await;

    app.create_post_for_user(author.id, "transient").await;

    app.post_json(
        &format!("/users/{}/follow", author.username),
        json!({}),
        Some(&viewer.token),
    )
    .await;
    let resp = app.get("/feed", Some(&viewer.token)).await;
    assert_eq!(feed_bodies(&resp.json()), vec!["transient"]);

    app.post_json(
        &format!("/users/{}/unfollow", author.username),
        json!({}),
        Some(&viewer.token),
    )
    .await;
    let resp = app.get("/feed", Some(&viewer.token)).await;
    assert_eq!(feed_bodies(&resp.json()), Vec::<String>::new());
}

#[tokio::test]
async fn feed_orders_by_time_then_id() {
    let app = app().await;
    let user = app.create_user("feed_ties").await;

    // Three posts sharing one timestamp: ties break by id, descending.
    let at = OffsetDateTime::now_utc() - Duration::minutes(3);
    let first = app.create_post_at(user.id, "tie first", at).await;
    let second = app.create_post_at(user.id, "tie second", at).await;
    let third = app.create_post_at(user.id, "tie third", at).await;
    assert!(first < second && second < third);

    let resp = app.get("/feed", Some(&user.token)).await;
    assert_eq!(
        feed_bodies(&resp.json()),
        vec!["tie third", "tie second", "tie first"]
    );
}

#[tokio::test]
async fn feed_pagination_is_stable() {
    let app = app().await;
    let user = app.create_user("feed_pages").await;

    // Equal timestamps force the cursor to rely on the id tie-break.
    let at = OffsetDateTime::now_utc() - Duration::minutes(3);
    for i in 0..5 {
        app.create_post_at(user.id, &format!("page {}", i), at).await;
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let path = match &cursor {
            Some(cursor) => format!("/feed?limit=2&cursor={}", cursor),
            None => "/feed?limit=2".to_string(),
        };
        let resp = app.get(&path, Some(&user.token)).await;
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.json();
        seen.extend(feed_bodies(&body));
        match body["next_cursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    // Every post exactly once, no skips and no repeats across pages.
    assert_eq!(
        seen,
        vec!["page 4", "page 3", "page 2", "page 1", "page 0"]
    );
}

#[tokio::test]
async fn feed_requires_auth() {
    let app = app().await;

    let resp = app.get("/feed", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
