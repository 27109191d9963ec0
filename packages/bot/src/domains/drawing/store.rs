//! Drawing store trait - durable record of epochs, entries, and winners.
//!
//! The state machine writes through this trait before acknowledging any
//! mutation, so a restart can rebuild identical in-memory state from the live
//! epoch's rows. `storage::PgStore` is the Postgres implementation;
//! `kernel::MemoryStore` backs the tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{Channel, ChatIdentity, EpochId};
use crate::domains::drawing::models::{DrawingRow, WinnerRow};

#[async_trait]
pub trait BaseDrawingStore: Send + Sync {
    async fn find_drawing(&self, channel: &Channel) -> Result<Option<DrawingRow>>;

    async fn insert_drawing(&self, row: &DrawingRow) -> Result<()>;

    /// Start a new epoch for a channel and mark it open
    async fn open_epoch(&self, channel: &Channel, epoch: EpochId) -> Result<()>;

    /// Mark a channel's drawing closed
    async fn close_epoch(&self, channel: &Channel, closed_at: DateTime<Utc>) -> Result<()>;

    /// Append all of one identity's weighted entry copies atomically
    async fn add_entries(&self, epoch: EpochId, identity: &ChatIdentity, copies: u32)
        -> Result<()>;

    /// Remove every entry copy for one identity
    async fn remove_entries(&self, epoch: EpochId, identity: &ChatIdentity) -> Result<()>;

    /// Load an epoch's entries in insertion order
    async fn load_entries(&self, epoch: EpochId) -> Result<Vec<ChatIdentity>>;

    /// Record a winner and retire their entry copies atomically. A failure
    /// must leave both the entries and the winner rows untouched.
    async fn commit_winner(&self, row: &WinnerRow) -> Result<()>;

    async fn delete_winner(&self, epoch: EpochId, identity: &ChatIdentity) -> Result<()>;

    /// Load a channel's winners for one epoch in pick order
    async fn load_winners(&self, channel: &Channel, epoch: EpochId) -> Result<Vec<ChatIdentity>>;
}
