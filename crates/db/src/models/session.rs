use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Bearer-token sessions. Tokens are stored only as SHA-256 hashes.
pub struct Session;

impl Session {
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)")
            .bind(Self::hash_token(token))
            .bind(user_id)
            .bind(expires_at)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Resolve a raw bearer token to its user id if the session is still live.
    pub async fn user_for_token(
        pool: &SqlitePool,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let row: Option<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1")
                .bind(Self::hash_token(token))
                .fetch_optional(pool)
                .await?;

        Ok(row.and_then(|(user_id, expires_at)| (expires_at > now).then_some(user_id)))
    }
}
