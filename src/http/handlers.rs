use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::feed::FeedService;
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::post::{Post, MAX_BODY_CHARS};
use crate::domain::user::{Profile, PublicUser, User};
use crate::http::auth::bearer_token;
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, i64)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = id
        .parse::<i64>()
        .map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, i64)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

/// Maps unique-constraint violations on the users table to per-field
/// conflict messages; anything else is logged and becomes a 500.
fn map_identity_conflict(err: anyhow::Error, context: &'static str) -> AppError {
    if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
        if let Some(db_err) = sqlx_err.as_database_error() {
            if let Some(code) = db_err.code() {
                if code == "23505" {
                    let constraint = db_err.constraint().unwrap_or_default();
                    if constraint.contains("users_username_key") {
                        return AppError::conflict("username already taken");
                    }
                    if constraint.contains("users_email_key") {
                        return AppError::conflict("email already taken");
                    }
                }
            }
        }
    }
    tracing::error!(error = ?err, "{}", context);
    AppError::internal(context)
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

const MAX_USERNAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 120;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_BIO_CHARS: usize = 140;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::bad_request("username cannot be empty"));
    }
    if payload.username.len() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request("username must be at most 64 characters"));
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(AppError::bad_request("a valid email address is required"));
    }
    if payload.email.len() > MAX_EMAIL_LEN {
        return Err(AppError::bad_request("email must be at most 120 characters"));
    }
    if payload.password.trim().len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = state.auth_service();
    let user = service
        .register(payload.username, payload.email, payload.password)
        .await
        .map_err(|err| map_identity_conflict(err, "failed to register user"))?;

    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = state.auth_service();
    let session = service
        .login(&payload.username, &payload.password, payload.remember)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match session {
        Some(session) => Ok(Json(SessionResponse {
            token: session.token,
            expires_at: session.expires_at,
        })),
        None => Err(AppError::unauthorized("invalid username or password")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers)?;

    let service = state.auth_service();
    let revoked = service.logout(token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to logout");
        AppError::internal("failed to logout")
    })?;

    let _ = revoked;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service.get_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    if let Some(username) = &payload.username {
        if username.trim().is_empty() {
            return Err(AppError::bad_request("username cannot be empty"));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(AppError::bad_request("username must be at most 64 characters"));
        }
    }
    if let Some(bio) = &payload.bio {
        if bio.chars().count() > MAX_BIO_CHARS {
            return Err(AppError::bad_request("bio must be at most 140 characters"));
        }
    }

    let service = UserService::new(state.db.clone());
    let user = service
        .update_profile(auth.user_id, payload.username, payload.bio)
        .await
        .map_err(|err| map_identity_conflict(err, "failed to update profile"))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Users & follow graph
// ---------------------------------------------------------------------------

pub async fn get_profile(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    let users = UserService::new(state.db.clone());
    let user = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, username = %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;
    let user = user.ok_or_else(|| AppError::not_found("user not found"))?;

    let social = SocialService::new(state.db.clone());
    let posts = PostService::new(state.db.clone());
    let followers_count = social.follower_count(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = user.id, "failed to count followers");
        AppError::internal("failed to fetch profile")
    })?;
    let following_count = social.following_count(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = user.id, "failed to count following");
        AppError::internal("failed to fetch profile")
    })?;
    let posts_count = posts.count_by_user(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = user.id, "failed to count posts");
        AppError::internal("failed to fetch profile")
    })?;

    Ok(Json(Profile {
        id: user.id,
        username: user.username,
        bio: user.bio,
        last_seen: user.last_seen,
        followers_count,
        following_count,
        posts_count,
    }))
}

pub async fn list_user_posts(
    Path(username): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let users = UserService::new(state.db.clone());
    let user = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, username = %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;
    let user = user.ok_or_else(|| AppError::not_found("user not found"))?;

    let service = PostService::new(state.db.clone());
    let mut posts = service
        .list_by_user(user.id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = user.id, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    let next_cursor = if posts.len() > limit as usize {
        posts.truncate(limit as usize);
        posts.last().map(|post| (post.created_at, post.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: posts,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub followed: bool,
}

pub async fn follow_user(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let users = UserService::new(state.db.clone());
    let target = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, username = %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;
    let target = target.ok_or_else(|| AppError::not_found("user not found"))?;

    if target.id == auth.user_id {
        return Err(AppError::bad_request("cannot follow yourself"));
    }

    let service = SocialService::new(state.db.clone());
    let followed = service.follow(auth.user_id, target.id).await.map_err(|err| {
        tracing::error!(error = ?err, follower_id = auth.user_id, followed_id = target.id, "failed to follow user");
        AppError::internal("failed to follow user")
    })?;

    Ok(Json(FollowResponse { followed }))
}

#[derive(Serialize)]
pub struct UnfollowResponse {
    pub unfollowed: bool,
}

pub async fn unfollow_user(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnfollowResponse>, AppError> {
    let users = UserService::new(state.db.clone());
    let target = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, username = %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;
    let target = target.ok_or_else(|| AppError::not_found("user not found"))?;

    if target.id == auth.user_id {
        return Err(AppError::bad_request("cannot unfollow yourself"));
    }

    let service = SocialService::new(state.db.clone());
    let unfollowed = service
        .unfollow(auth.user_id, target.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, follower_id = auth.user_id, followed_id = target.id, "failed to unfollow user");
            AppError::internal("failed to unfollow user")
        })?;

    Ok(Json(UnfollowResponse { unfollowed }))
}

#[derive(Serialize)]
pub struct FollowListItem {
    pub user: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub followed_at: OffsetDateTime,
}

pub async fn list_followers(
    Path(username): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<FollowListItem>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let users = UserService::new(state.db.clone());
    let user = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, username = %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;
    let user = user.ok_or_else(|| AppError::not_found("user not found"))?;

    let service = SocialService::new(state.db.clone());
    let mut followers = service
        .list_followers(user.id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = user.id, "failed to list followers");
            AppError::internal("failed to list followers")
        })?;

    let next_cursor = if followers.len() > limit as usize {
        followers.truncate(limit as usize);
        followers.last().map(|edge| (edge.followed_at, edge.user.id))
    } else {
        None
    };

    let items = followers
        .into_iter()
        .map(|edge| FollowListItem {
            user: edge.user.into(),
            followed_at: edge.followed_at,
        })
        .collect();

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn list_following(
    Path(username): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<FollowListItem>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let users = UserService::new(state.db.clone());
    let user = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, username = %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;
    let user = user.ok_or_else(|| AppError::not_found("user not found"))?;

    let service = SocialService::new(state.db.clone());
    let mut following = service
        .list_following(user.id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = user.id, "failed to list following");
            AppError::internal("failed to list following")
        })?;

    let next_cursor = if following.len() > limit as usize {
        following.truncate(limit as usize);
        following.last().map(|edge| (edge.followed_at, edge.user.id))
    } else {
        None
    };

    let items = following
        .into_iter()
        .map(|edge| FollowListItem {
            user: edge.user.into(),
            followed_at: edge.followed_at,
        })
        .collect();

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Serialize)]
pub struct RelationshipResponse {
    pub is_following: bool,
    pub is_followed_by: bool,
}

pub async fn relationship_status(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<RelationshipResponse>, AppError> {
    let users = UserService::new(state.db.clone());
    let other = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, username = %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;
    let other = other.ok_or_else(|| AppError::not_found("user not found"))?;

    if other.id == auth.user_id {
        return Ok(Json(RelationshipResponse {
            is_following: false,
            is_followed_by: false,
        }));
    }

    let service = SocialService::new(state.db.clone());
    let status = service
        .relationship(auth.user_id, other.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, viewer_id = auth.user_id, other_id = other.id, "failed to fetch relationship");
            AppError::internal("failed to fetch relationship")
        })?;

    Ok(Json(RelationshipResponse {
        is_following: status.is_following,
        is_followed_by: status.is_followed_by,
    }))
}

// ---------------------------------------------------------------------------
// Posts & feed
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub body: String,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    if payload.body.trim().is_empty() {
        return Err(AppError::bad_request("post body cannot be empty"));
    }
    if payload.body.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::bad_request("post must be at most 140 characters"));
    }

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(auth.user_id, payload.body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok(Json(post))
}

pub async fn home_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let service = FeedService::new(state.db.clone());
    let (posts, next_cursor) = service
        .home_feed(auth.user_id, cursor, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to fetch feed");
            AppError::internal("failed to fetch feed")
        })?;

    Ok(Json(ListResponse {
        items: posts,
        next_cursor: encode_cursor(next_cursor),
    }))
}
