use anyhow::Result;
use time::OffsetDateTime;

use crate::domain::post::Post;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Posts are immutable once written; the timestamp is set by the
    /// database and never touched again.
    pub async fn create_post(&self, author_id: i64, body: String) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            "WITH inserted_post AS ( \
                INSERT INTO posts (author_id, body) \
                VALUES ($1, $2) \
                RETURNING id, author_id, body, created_at \
             ) \
             SELECT p.id, p.author_id, p.body, p.created_at, u.username AS author_username \
             FROM inserted_post p \
             JOIN users u ON u.id = p.author_id",
        )
        .bind(author_id)
        .bind(body)
        .fetch_one(self.db.pool())
        .await?;

        Ok(post)
    }

    pub async fn count_by_user(&self, author_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    pub async fn list_by_user(
        &self,
        author_id: i64,
        cursor: Option<(OffsetDateTime, i64)>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let posts = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query_as::<_, Post>(
                    "SELECT p.id, p.author_id, p.body, p.created_at, u.username AS author_username \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     WHERE p.author_id = $1 \
                       AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4",
                )
                .bind(author_id)
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, Post>(
                    "SELECT p.id, p.author_id, p.body, p.created_at, u.username AS author_username \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     WHERE p.author_id = $1 \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $2",
                )
                .bind(author_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(posts)
    }
}
