use anyhow::Result;

use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, bio, last_seen, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, bio, last_seen, created_at \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(user)
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        username: Option<String>,
        bio: Option<String>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 bio = COALESCE($3, bio) \
             WHERE id = $1 \
             RETURNING id, username, email, bio, last_seen, created_at",
        )
        .bind(user_id)
        .bind(username)
        .bind(bio)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(user)
    }
}
