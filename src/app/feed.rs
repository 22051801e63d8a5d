use anyhow::Result;
use time::OffsetDateTime;

use crate::domain::post::Post;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct FeedService {
    db: Db,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Home feed: every post whose author is the requesting account or an
    /// account it follows, newest first. The single OR predicate over one
    /// scan of `posts` yields each post exactly once, so even a self-edge
    /// in the follow graph cannot double-count own posts. Ties on
    /// `created_at` break by `id DESC` to keep keyset pagination stable.
    pub async fn home_feed(
        &self,
        user_id: i64,
        cursor: Option<(OffsetDateTime, i64)>,
        limit: i64,
    ) -> Result<(Vec<Post>, Option<(OffsetDateTime, i64)>)> {
        let limit_plus = limit + 1;
        let mut posts = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query_as::<_, Post>(
                    "SELECT p.id, p.author_id, p.body, p.created_at, u.username AS author_username \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     WHERE (p.author_id = $1 \
                        OR p.author_id IN ( \
                            SELECT followed_id FROM follows WHERE follower_id = $1 \
                        )) \
                       AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(created_at)
                .bind(post_id)
                .bind(limit_plus)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, Post>(
                    "SELECT p.id, p.author_id, p.body, p.created_at, u.username AS author_username \
                     FROM posts p \
                     JOIN users u ON u.id = p.author_id \
                     WHERE p.author_id = $1 \
                        OR p.author_id IN ( \
                            SELECT followed_id FROM follows WHERE follower_id = $1 \
                        ) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit_plus)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        // The cursor is the last row actually returned; the next page's
        // strict comparison then resumes at the row the limit+1 probe saw.
        let next_cursor = if posts.len() > limit as usize {
            posts.truncate(limit as usize);
            posts.last().map(|post| (post.created_at, post.id))
        } else {
            None
        };

        Ok((posts, next_cursor))
    }
}
