use anyhow::Result;
use sqlx::{FromRow, Row};
use time::OffsetDateTime;

use crate::domain::user::User;
use crate::infra::db::Db;

/// The follow graph as an explicit edge set: ordered (follower, followed)
/// pairs, addressed only through these query functions.
#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

#[derive(Debug, Clone, FromRow)]
pub struct SocialUserEdge {
    #[sqlx(flatten)]
    pub user: User,
    pub followed_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RelationshipStatus {
    pub is_following: bool,
    pub is_followed_by: bool,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent: inserting an existing edge is a no-op and returns false.
    /// Self-follow is a handler-level business rule; the `$1 <> $2` guard
    /// only backstops it.
    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let following: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(following)
    }

    pub async fn follower_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followed_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    pub async fn following_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    pub async fn list_followers(
        &self,
        user_id: i64,
        cursor: Option<(OffsetDateTime, i64)>,
        limit: i64,
    ) -> Result<Vec<SocialUserEdge>> {
        let edges = match cursor {
            Some((followed_at, follower_id)) => {
                sqlx::query_as::<_, SocialUserEdge>(
                    "SELECT u.id, u.username, u.email, u.bio, u.last_seen, u.created_at, \
                            f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.follower_id \
                     WHERE f.followed_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.follower_id < $3)) \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(followed_at)
                .bind(follower_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, SocialUserEdge>(
                    "SELECT u.id, u.username, u.email, u.bio, u.last_seen, u.created_at, \
                            f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.follower_id \
                     WHERE f.followed_id = $1 \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(edges)
    }

    pub async fn list_following(
        &self,
        user_id: i64,
        cursor: Option<(OffsetDateTime, i64)>,
        limit: i64,
    ) -> Result<Vec<SocialUserEdge>> {
        let edges = match cursor {
            Some((followed_at, followed_id)) => {
                sqlx::query_as::<_, SocialUserEdge>(
                    "SELECT u.id, u.username, u.email, u.bio, u.last_seen, u.created_at, \
                            f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.followed_id \
                     WHERE f.follower_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.followed_id < $3)) \
                     ORDER BY f.created_at DESC, f.followed_id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(followed_at)
                .bind(followed_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, SocialUserEdge>(
                    "SELECT u.id, u.username, u.email, u.bio, u.last_seen, u.created_at, \
                            f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.followed_id \
                     WHERE f.follower_id = $1 \
                     ORDER BY f.created_at DESC, f.followed_id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(edges)
    }

    pub async fn relationship(&self, viewer_id: i64, other_id: i64) -> Result<RelationshipStatus> {
        let row = sqlx::query(
            "SELECT \
                EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2) AS is_following, \
                EXISTS (SELECT 1 FROM follows WHERE follower_id = $2 AND followed_id = $1) AS is_followed_by",
        )
        .bind(viewer_id)
        .bind(other_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(RelationshipStatus {
            is_following: row.get("is_following"),
            is_followed_by: row.get("is_followed_by"),
        })
    }
}
