//! Postgres-backed stores.
//!
//! `PgStore` wraps one connection pool and implements both store traits by
//! delegating to the domain models. Hosts run `MIGRATOR` against the pool
//! before constructing the bot.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::{Channel, ChatIdentity, EpochId, ExternalIdentity};
use crate::domains::drawing::models::EntryRow;
use crate::domains::drawing::{BaseDrawingStore, DrawingRow, WinnerRow};
use crate::domains::identity::{BaseIdentityStore, UserRow};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BaseDrawingStore for PgStore {
    async fn find_drawing(&self, channel: &Channel) -> Result<Option<DrawingRow>> {
        DrawingRow::find_by_channel(channel.as_str(), &self.pool).await
    }

    async fn insert_drawing(&self, row: &DrawingRow) -> Result<()> {
        row.insert(&self.pool).await
    }

    async fn open_epoch(&self, channel: &Channel, epoch: EpochId) -> Result<()> {
        DrawingRow::set_open(channel.as_str(), epoch.as_uuid(), &self.pool).await
    }

    async fn close_epoch(&self, channel: &Channel, closed_at: DateTime<Utc>) -> Result<()> {
        DrawingRow::set_closed(channel.as_str(), closed_at, &self.pool).await
    }

    async fn add_entries(
        &self,
        epoch: EpochId,
        identity: &ChatIdentity,
        copies: u32,
    ) -> Result<()> {
        EntryRow::insert_copies(epoch.as_uuid(), identity.as_str(), copies, &self.pool).await
    }

    async fn remove_entries(&self, epoch: EpochId, identity: &ChatIdentity) -> Result<()> {
        EntryRow::delete_for(epoch.as_uuid(), identity.as_str(), &self.pool).await
    }

    async fn load_entries(&self, epoch: EpochId) -> Result<Vec<ChatIdentity>> {
        let rows = EntryRow::find_by_epoch(epoch.as_uuid(), &self.pool).await?;
        Ok(rows.into_iter().map(ChatIdentity::new).collect())
    }

    async fn commit_winner(&self, row: &WinnerRow) -> Result<()> {
        row.commit(&self.pool).await
    }

    async fn delete_winner(&self, epoch: EpochId, identity: &ChatIdentity) -> Result<()> {
        WinnerRow::delete(epoch.as_uuid(), identity.as_str(), &self.pool).await
    }

    async fn load_winners(&self, channel: &Channel, epoch: EpochId) -> Result<Vec<ChatIdentity>> {
        let rows = WinnerRow::find_current(channel.as_str(), epoch.as_uuid(), &self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| ChatIdentity::new(row.chat_identity))
            .collect())
    }
}

#[async_trait]
impl BaseIdentityStore for PgStore {
    async fn find_user(&self, chat_identity: &ChatIdentity) -> Result<Option<ExternalIdentity>> {
        let row = UserRow::find_by_chat_identity(chat_identity.as_str(), &self.pool).await?;
        Ok(row.map(|row| ExternalIdentity::new(row.external_identity)))
    }

    async fn upsert_user(
        &self,
        chat_identity: &ChatIdentity,
        external: &ExternalIdentity,
    ) -> Result<()> {
        UserRow::upsert(chat_identity.as_str(), external.as_str(), &self.pool).await
    }
}
