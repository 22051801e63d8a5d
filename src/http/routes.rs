use axum::{routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user))
        .route("/auth/me", patch(handlers::update_profile))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:username", get(handlers::get_profile))
        .route("/users/:username/posts", get(handlers::list_user_posts))
        .route("/users/:username/follow", post(handlers::follow_user))
        .route("/users/:username/unfollow", post(handlers::unfollow_user))
        .route("/users/:username/followers", get(handlers::list_followers))
        .route("/users/:username/following", get(handlers::list_following))
        .route(
            "/users/:username/relationship",
            get(handlers::relationship_status),
        )
}

pub fn posts() -> Router<AppState> {
    Router::new().route("/posts", post(handlers::create_post))
}

pub fn feed() -> Router<AppState> {
    Router::new().route("/feed", get(handlers::home_feed))
}
