use anyhow::Result;
use sqlx::PgPool;

/// User model - SQL persistence layer
///
/// At most one external identity per chat identity; rows are upserted on
/// re-resolution and never deleted.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub chat_identity: String,
    pub external_identity: String,
}

impl UserRow {
    pub async fn find_by_chat_identity(
        chat_identity: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE chat_identity = $1")
            .bind(chat_identity)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert the mapping, replacing any previous external identity
    pub async fn upsert(
        chat_identity: &str,
        external_identity: &str,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (chat_identity, external_identity)
             VALUES ($1, $2)
             ON CONFLICT (chat_identity)
             DO UPDATE SET external_identity = EXCLUDED.external_identity",
        )
        .bind(chat_identity)
        .bind(external_identity)
        .execute(pool)
        .await?;

        Ok(())
    }
}
