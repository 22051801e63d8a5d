use anyhow::{anyhow, Result};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    session_key: [u8; 32],
    session_ttl_hours: u64,
    remember_ttl_days: u64,
}

impl AuthService {
    pub fn new(
        db: Db,
        session_key: [u8; 32],
        session_ttl_hours: u64,
        remember_ttl_days: u64,
    ) -> Self {
        Self {
            db,
            session_key,
            session_ttl_hours,
            remember_ttl_days,
        }
    }

    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<User> {
        let password_hash = User::hash_password(&password)?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, username, email, bio, last_seen, created_at",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await?;

        Ok(user)
    }

    /// Unknown username and wrong password are indistinguishable to the
    /// caller; both come back as `None`.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember: bool,
    ) -> Result<Option<SessionToken>> {
        let row: Option<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(self.db.pool())
                .await?;

        let (user_id, password_hash) = match row {
            Some(row) => row,
            None => return Ok(None),
        };
        let password_hash = match password_hash {
            Some(hash) => hash,
            None => return Ok(None),
        };

        if !User::verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let token = self.start_session(user_id, remember).await?;
        Ok(Some(token))
    }

    pub async fn start_session(&self, user_id: i64, remember: bool) -> Result<SessionToken> {
        let ttl = if remember {
            Duration::days(self.remember_ttl_days as i64)
        } else {
            Duration::hours(self.session_ttl_hours as i64)
        };

        let session_id = Uuid::new_v4();
        let (claims, expires_at) = self.build_session_claims(user_id, session_id, ttl)?;
        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let token_hash = hash_token(&token);

        sqlx::query(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.db.pool())
        .await?;

        Ok(SessionToken { token, expires_at })
    }

    pub async fn authenticate(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "session") {
            return Ok(None);
        }
        let user_id = claim_i64(&claims, "sub")?;
        let session_id = claim_uuid(&claims, "jti")?;
        let token_hash = hash_token(token);

        let session: Option<Uuid> = sqlx::query_scalar(
            "SELECT id \
             FROM sessions \
             WHERE id = $1 \
               AND user_id = $2 \
               AND token_hash = $3 \
               AND revoked_at IS NULL \
               AND expires_at > now()",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(&token_hash)
        .fetch_optional(self.db.pool())
        .await?;

        if session.is_none() {
            return Ok(None);
        }

        // Every authenticated request refreshes the account's last-seen
        // marker, as the original does in its before-request hook.
        sqlx::query("UPDATE users SET last_seen = now() WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(Some(AuthSession { user_id }))
    }

    pub async fn logout(&self, token: &str) -> Result<bool> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(false),
        };
        if !has_token_type(&claims, "session") {
            return Ok(false);
        }
        let user_id = claim_i64(&claims, "sub")?;
        let session_id = claim_uuid(&claims, "jti")?;
        let token_hash = hash_token(token);

        let result = sqlx::query(
            "UPDATE sessions \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(token_hash)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with("murmur");
        rules.validate_audience_with("murmur");

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }

    fn build_session_claims(
        &self,
        user_id: i64,
        session_id: Uuid,
        ttl: Duration,
    ) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(ttl.whole_seconds() as u64);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer("murmur")?;
        claims.audience("murmur")?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&session_id.to_string())?;
        claims.add_additional("typ", "session")?;
        let expires_at = OffsetDateTime::now_utc() + ttl;
        Ok((claims, expires_at))
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> Result<&'a str> {
    claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))
}

fn claim_i64(claims: &Claims, name: &str) -> Result<i64> {
    Ok(claim_str(claims, name)?.parse()?)
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(claim_str(claims, name)?)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
