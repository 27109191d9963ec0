use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Drawing model - SQL persistence layer
///
/// One row per channel. `epoch_id` identifies the current drawing cycle and is
/// replaced (not deleted) when a new drawing opens, so entry and winner rows
/// of past epochs remain as history.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DrawingRow {
    pub channel: String,
    pub epoch_id: Uuid,
    pub open: bool,
    pub last_closed_time: Option<DateTime<Utc>>,
}

impl DrawingRow {
    /// Find the drawing for a channel
    pub async fn find_by_channel(channel: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM drawings WHERE channel = $1")
            .bind(channel)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert a fresh drawing row
    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "INSERT INTO drawings (channel, epoch_id, open, last_closed_time)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&self.channel)
        .bind(self.epoch_id)
        .bind(self.open)
        .bind(self.last_closed_time)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Start a new epoch: replace the epoch id and mark the drawing open
    pub async fn set_open(channel: &str, epoch_id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE drawings SET epoch_id = $2, open = TRUE WHERE channel = $1")
            .bind(channel)
            .bind(epoch_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Mark the drawing closed and record the close time
    pub async fn set_closed(
        channel: &str,
        closed_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query("UPDATE drawings SET open = FALSE, last_closed_time = $2 WHERE channel = $1")
            .bind(channel)
            .bind(closed_at)
            .execute(pool)
            .await?;

        Ok(())
    }
}

/// Entry model - SQL persistence layer
///
/// One row per ticket. A weighted identity has several duplicate rows; the
/// copies for one identity are always written or removed together.
pub struct EntryRow;

impl EntryRow {
    /// Insert all of one identity's entry copies in a single transaction
    pub async fn insert_copies(
        epoch_id: Uuid,
        chat_identity: &str,
        copies: u32,
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        for _ in 0..copies {
            sqlx::query("INSERT INTO entries (epoch_id, chat_identity) VALUES ($1, $2)")
                .bind(epoch_id)
                .bind(chat_identity)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Remove every entry copy for one identity in an epoch
    pub async fn delete_for(epoch_id: Uuid, chat_identity: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM entries WHERE epoch_id = $1 AND chat_identity = $2")
            .bind(epoch_id)
            .bind(chat_identity)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Load an epoch's entries in insertion order
    pub async fn find_by_epoch(epoch_id: Uuid, pool: &PgPool) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT chat_identity FROM entries WHERE epoch_id = $1 ORDER BY id",
        )
        .bind(epoch_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(identity,)| identity).collect())
    }
}

/// Winner model - SQL persistence layer
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct WinnerRow {
    pub epoch_id: Uuid,
    pub channel: String,
    pub chat_identity: String,
    pub picked_at: DateTime<Utc>,
}

impl WinnerRow {
    /// Record the winner and retire their entry copies in one transaction,
    /// so a failure cannot delete tickets without committing the winner
    pub async fn commit(&self, pool: &PgPool) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM entries WHERE epoch_id = $1 AND chat_identity = $2")
            .bind(self.epoch_id)
            .bind(&self.chat_identity)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO winners (epoch_id, channel, chat_identity, picked_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(self.epoch_id)
        .bind(&self.channel)
        .bind(&self.chat_identity)
        .bind(self.picked_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Retract one winner record (reroll)
    pub async fn delete(epoch_id: Uuid, chat_identity: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM winners WHERE epoch_id = $1 AND chat_identity = $2")
            .bind(epoch_id)
            .bind(chat_identity)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Load a channel's winners for one epoch in pick order
    pub async fn find_current(
        channel: &str,
        epoch_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT epoch_id, channel, chat_identity, picked_at
             FROM winners WHERE channel = $1 AND epoch_id = $2 ORDER BY id",
        )
        .bind(channel)
        .bind(epoch_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
