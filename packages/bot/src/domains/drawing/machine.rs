//! Per-channel drawing state machine.
//!
//! Owns one channel's raffle lifecycle: closed, opened by `open`, closed
//! again by `close(n)`, with reroll as a same-state transition on a closed
//! drawing. Every mutation is written through the store before the in-memory
//! state changes and the call returns, so a restart rebuilds the same state
//! from the stored epoch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::common::{Channel, ChatIdentity, EpochId};
use crate::domains::drawing::models::{DrawingRow, WinnerRow};
use crate::domains::drawing::store::BaseDrawingStore;
use crate::kernel::BaseChatTransport;

/// Periodic notice while entries are open.
pub const OPEN_NOTICE: &str = "A drawing is open! Type !play <profile link> to enter.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingStatus {
    Closed,
    Open,
}

#[derive(Debug, Error)]
pub enum DrawingError {
    #[error("a drawing is already open")]
    AlreadyOpen,

    #[error("no drawing is open right now")]
    NoOpenDrawing,

    #[error("winner count must be a positive number")]
    InvalidCount,

    #[error("{0} already entered this drawing")]
    AlreadyEntered(ChatIdentity),

    #[error("{0} is not a current winner")]
    UnknownWinner(ChatIdentity),

    #[error("no entries left to draw from")]
    PoolExhausted,

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl DrawingError {
    /// User errors are whispered back to the invoking identity and never
    /// alter state; storage errors are transient and reported to the caller.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, DrawingError::Store(_))
    }
}

pub struct DrawingMachine {
    channel: Channel,
    epoch: EpochId,
    status: DrawingStatus,
    /// Weight-expanded pool: one element per ticket, insertion order. A
    /// winner's copies are retired together at selection time; the rest of
    /// the pool remains available for reroll until the next open.
    entries: Vec<ChatIdentity>,
    winners: Vec<ChatIdentity>,
    store: Arc<dyn BaseDrawingStore>,
    chat: Arc<dyn BaseChatTransport>,
    notice_interval: Duration,
    notice_task: Option<JoinHandle<()>>,
}

impl DrawingMachine {
    /// Load a channel's drawing from the store, inserting a fresh closed one
    /// on first startup. If the stored drawing is open, the entry pool is
    /// reloaded and the open notice resumes.
    pub async fn restore(
        channel: Channel,
        store: Arc<dyn BaseDrawingStore>,
        chat: Arc<dyn BaseChatTransport>,
        notice_interval: Duration,
    ) -> anyhow::Result<Self> {
        let mut machine = match store.find_drawing(&channel).await? {
            Some(row) => {
                let epoch = EpochId::from_uuid(row.epoch_id);
                let entries = store.load_entries(epoch).await?;
                let winners = store.load_winners(&channel, epoch).await?;
                debug!(
                    channel = %channel,
                    epoch = %epoch,
                    entries = entries.len(),
                    winners = winners.len(),
                    "restored drawing from store"
                );
                Self {
                    channel,
                    epoch,
                    status: if row.open {
                        DrawingStatus::Open
                    } else {
                        DrawingStatus::Closed
                    },
                    entries,
                    winners,
                    store,
                    chat,
                    notice_interval,
                    notice_task: None,
                }
            }
            None => {
                let epoch = EpochId::generate();
                let row = DrawingRow {
                    channel: channel.as_str().to_string(),
                    epoch_id: epoch.as_uuid(),
                    open: false,
                    last_closed_time: None,
                };
                store.insert_drawing(&row).await?;
                debug!(channel = %channel, epoch = %epoch, "created drawing");
                Self {
                    channel,
                    epoch,
                    status: DrawingStatus::Closed,
                    entries: Vec::new(),
                    winners: Vec::new(),
                    store,
                    chat,
                    notice_interval,
                    notice_task: None,
                }
            }
        };

        if machine.status == DrawingStatus::Open {
            machine.start_notice_task();
        }

        Ok(machine)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn epoch(&self) -> EpochId {
        self.epoch
    }

    pub fn status(&self) -> DrawingStatus {
        self.status
    }

    /// The weight-expanded entry pool (one element per ticket).
    pub fn pool(&self) -> &[ChatIdentity] {
        &self.entries
    }

    /// Current epoch's committed winners in pick order.
    pub fn winners(&self) -> &[ChatIdentity] {
        &self.winners
    }

    /// Start a new epoch: clears entries and winners, begins the periodic
    /// open notice.
    pub async fn open(&mut self) -> Result<(), DrawingError> {
        if self.status == DrawingStatus::Open {
            return Err(DrawingError::AlreadyOpen);
        }

        let epoch = EpochId::generate();
        self.store.open_epoch(&self.channel, epoch).await?;

        self.epoch = epoch;
        self.status = DrawingStatus::Open;
        self.entries.clear();
        self.winners.clear();
        self.start_notice_task();

        info!(channel = %self.channel, epoch = %epoch, "drawing opened");
        Ok(())
    }

    /// Add an identity's weighted entry copies. All copies are persisted
    /// atomically before the pool is updated.
    pub async fn enter(
        &mut self,
        identity: &ChatIdentity,
        weight: u32,
    ) -> Result<(), DrawingError> {
        if self.status == DrawingStatus::Closed {
            return Err(DrawingError::NoOpenDrawing);
        }
        if self.entries.contains(identity) {
            return Err(DrawingError::AlreadyEntered(identity.clone()));
        }

        self.store.add_entries(self.epoch, identity, weight).await?;
        self.entries
            .extend(std::iter::repeat_with(|| identity.clone()).take(weight as usize));

        debug!(channel = %self.channel, identity = %identity, weight, "entered drawing");
        Ok(())
    }

    /// Remove all of an identity's entry copies for the live epoch. No-op if
    /// the identity has none.
    pub async fn quit(&mut self, identity: &ChatIdentity) -> Result<(), DrawingError> {
        if !self.entries.contains(identity) {
            return Ok(());
        }

        self.store.remove_entries(self.epoch, identity).await?;
        self.entries.retain(|entry| entry != identity);

        debug!(channel = %self.channel, identity = %identity, "quit drawing");
        Ok(())
    }

    /// Close the drawing and select up to `count` winners. Returns the
    /// selected winners in pick order (possibly fewer than requested, or
    /// empty if nobody entered).
    pub async fn close(&mut self, count: u32) -> Result<Vec<ChatIdentity>, DrawingError> {
        if self.status == DrawingStatus::Closed {
            return Err(DrawingError::NoOpenDrawing);
        }
        if count == 0 {
            return Err(DrawingError::InvalidCount);
        }

        self.stop_notice_task();
        self.store.close_epoch(&self.channel, Utc::now()).await?;
        self.status = DrawingStatus::Closed;

        let mut picked = Vec::new();
        for _ in 0..count {
            match self.draw_one().await? {
                Some(winner) => picked.push(winner),
                None => break,
            }
        }

        info!(
            channel = %self.channel,
            epoch = %self.epoch,
            winners = ?picked,
            "drawing closed"
        );
        Ok(picked)
    }

    /// Retract a prior winner and select one replacement from the remaining
    /// pool. Fails without state change if the pool is exhausted.
    pub async fn reroll(
        &mut self,
        prior: &ChatIdentity,
    ) -> Result<ChatIdentity, DrawingError> {
        if !self.winners.contains(prior) {
            return Err(DrawingError::UnknownWinner(prior.clone()));
        }
        // Checked before the retraction so a failed reroll changes nothing.
        if self.entries.is_empty() {
            return Err(DrawingError::PoolExhausted);
        }

        self.store.delete_winner(self.epoch, prior).await?;
        self.winners.retain(|winner| winner != prior);

        let replacement = self
            .draw_one()
            .await?
            .ok_or(DrawingError::PoolExhausted)?;

        info!(
            channel = %self.channel,
            retracted = %prior,
            replacement = %replacement,
            "winner rerolled"
        );
        Ok(replacement)
    }

    /// Pick one entry uniformly from the pool, retire every copy of the
    /// picked identity (in storage and memory), and commit it as a winner.
    ///
    /// Retiring all copies together means the ticket multiplier affects only
    /// selection probability, never repeat-eligibility.
    async fn draw_one(&mut self) -> Result<Option<ChatIdentity>, DrawingError> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        let index = pick_index(self.entries.len());
        let winner = self.entries[index].clone();

        // One store call: entry retirement and the winner record commit or
        // fail together, never leaving tickets deleted without a winner.
        self.store
            .commit_winner(&WinnerRow {
                epoch_id: self.epoch.as_uuid(),
                channel: self.channel.as_str().to_string(),
                chat_identity: winner.as_str().to_string(),
                picked_at: Utc::now(),
            })
            .await?;

        self.entries.retain(|entry| entry != &winner);
        self.winners.push(winner.clone());

        Ok(Some(winner))
    }

    fn start_notice_task(&mut self) {
        let chat = Arc::clone(&self.chat);
        let channel = self.channel.clone();
        let interval = self.notice_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; the open announcement already
            // went out, so consume it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = chat.say(&channel, OPEN_NOTICE).await {
                    warn!(channel = %channel, "failed to send open notice: {e}");
                }
            }
        });

        self.notice_task = Some(handle);
    }

    fn stop_notice_task(&mut self) {
        if let Some(task) = self.notice_task.take() {
            task.abort();
        }
    }
}

impl Drop for DrawingMachine {
    fn drop(&mut self) {
        self.stop_notice_task();
    }
}

/// Uniform index into the weight-expanded pool. Kept out of the async flow so
/// the thread-local RNG never lives across an await.
fn pick_index(len: usize) -> usize {
    rand::rng().random_range(0..len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{MemoryStore, MockChatTransport};

    async fn machine_with(
        store: Arc<MemoryStore>,
        chat: Arc<MockChatTransport>,
    ) -> DrawingMachine {
        DrawingMachine::restore(
            Channel::from("#demo"),
            store,
            chat,
            Duration::from_secs(30),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn open_twice_reports_already_open() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap();

        let err = machine.open().await.unwrap_err();
        assert!(matches!(err, DrawingError::AlreadyOpen));
        // Second open must not have reset anything.
        assert_eq!(machine.pool().len(), 1);
    }

    #[tokio::test]
    async fn enter_requires_open_drawing() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        let err = machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DrawingError::NoOpenDrawing));
    }

    #[tokio::test]
    async fn duplicate_entry_is_rejected_without_extra_tickets() {
        let store = Arc::new(MemoryStore::new());
        let mut machine =
            machine_with(Arc::clone(&store), Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine.enter(&ChatIdentity::from("bob"), 3).await.unwrap();

        let err = machine
            .enter(&ChatIdentity::from("bob"), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DrawingError::AlreadyEntered(_)));
        assert_eq!(machine.pool().len(), 3);
        assert_eq!(store.entry_rows(machine.epoch()).len(), 3);
    }

    #[tokio::test]
    async fn enter_then_quit_restores_pool() {
        let store = Arc::new(MemoryStore::new());
        let mut machine =
            machine_with(Arc::clone(&store), Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap();
        let before: Vec<_> = machine.pool().to_vec();

        machine.enter(&ChatIdentity::from("bob"), 5).await.unwrap();
        machine.quit(&ChatIdentity::from("bob")).await.unwrap();

        assert_eq!(machine.pool(), before.as_slice());
        assert_eq!(store.entry_rows(machine.epoch()).len(), 1);
    }

    #[tokio::test]
    async fn quit_without_entries_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine.quit(&ChatIdentity::from("ghost")).await.unwrap();
        assert!(machine.pool().is_empty());
    }

    #[tokio::test]
    async fn close_zero_is_invalid_count() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        let err = machine.close(0).await.unwrap_err();
        assert!(matches!(err, DrawingError::InvalidCount));
        assert_eq!(machine.status(), DrawingStatus::Open);
    }

    #[tokio::test]
    async fn close_retires_every_copy_of_each_winner() {
        let store = Arc::new(MemoryStore::new());
        let mut machine =
            machine_with(Arc::clone(&store), Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap();
        machine.enter(&ChatIdentity::from("bob"), 3).await.unwrap();
        assert_eq!(machine.pool().len(), 4);

        let winners = machine.close(1).await.unwrap();
        assert_eq!(winners.len(), 1);
        let winner = &winners[0];

        assert!(!machine.pool().contains(winner));
        assert!(!store.entry_rows(machine.epoch()).contains(winner));
        assert_eq!(machine.winners(), winners.as_slice());
    }

    #[tokio::test]
    async fn close_with_more_requested_than_entrants_returns_all() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 2)
            .await
            .unwrap();
        machine.enter(&ChatIdentity::from("bob"), 4).await.unwrap();

        let winners = machine.close(10).await.unwrap();
        assert_eq!(winners.len(), 2);
        assert!(machine.pool().is_empty());

        let mut sorted = winners.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 2, "winners must be distinct");
    }

    #[tokio::test]
    async fn close_with_no_entrants_returns_empty() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        let winners = machine.close(3).await.unwrap();
        assert!(winners.is_empty());
        assert_eq!(machine.status(), DrawingStatus::Closed);
    }

    #[tokio::test]
    async fn reroll_replaces_winner_from_remaining_pool() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap();
        machine.enter(&ChatIdentity::from("bob"), 1).await.unwrap();
        machine
            .enter(&ChatIdentity::from("carol"), 1)
            .await
            .unwrap();

        let winners = machine.close(2).await.unwrap();
        assert_eq!(winners.len(), 2);

        let retracted = winners[0].clone();
        let kept = winners[1].clone();
        let replacement = machine.reroll(&retracted).await.unwrap();

        assert_ne!(replacement, retracted);
        assert_ne!(replacement, kept);
        assert_eq!(machine.winners().len(), 2);
        assert!(machine.winners().contains(&kept));
        assert!(machine.winners().contains(&replacement));
    }

    #[tokio::test]
    async fn reroll_unknown_winner_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap();
        machine.close(1).await.unwrap();

        let err = machine.reroll(&ChatIdentity::from("ghost")).await.unwrap_err();
        assert!(matches!(err, DrawingError::UnknownWinner(_)));
    }

    #[tokio::test]
    async fn reroll_with_empty_pool_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut machine = machine_with(store, Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap();
        machine.enter(&ChatIdentity::from("bob"), 3).await.unwrap();

        let winners = machine.close(2).await.unwrap();
        assert_eq!(winners.len(), 2);
        assert!(machine.pool().is_empty());

        let err = machine.reroll(&winners[0]).await.unwrap_err();
        assert!(matches!(err, DrawingError::PoolExhausted));
        assert_eq!(machine.winners(), winners.as_slice());
    }

    #[tokio::test]
    async fn failed_winner_commit_preserves_all_entries() {
        let store = Arc::new(MemoryStore::new());
        let mut machine =
            machine_with(Arc::clone(&store), Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap();
        machine.enter(&ChatIdentity::from("bob"), 1).await.unwrap();

        store.set_fail_commits(true);
        let err = machine.close(2).await.unwrap_err();
        assert!(matches!(err, DrawingError::Store(_)));

        // No ticket may be durably lost by a failed selection: the stored
        // rows and the in-memory pool still agree, and no winner exists.
        assert_eq!(machine.pool().len(), 2);
        assert_eq!(store.entry_rows(machine.epoch()).len(), 2);
        assert!(machine.winners().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_propagates_without_pool_change() {
        let store = Arc::new(MemoryStore::new());
        let mut machine =
            machine_with(Arc::clone(&store), Arc::new(MockChatTransport::new())).await;

        machine.open().await.unwrap();
        store.set_fail_writes(true);

        let err = machine
            .enter(&ChatIdentity::from("alice"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DrawingError::Store(_)));
        assert!(!err.is_user_error());
        assert!(machine.pool().is_empty());
    }

    #[tokio::test]
    async fn restore_rebuilds_open_drawing_state() {
        let store = Arc::new(MemoryStore::new());
        let chat = Arc::new(MockChatTransport::new());
        let epoch;
        {
            let mut machine =
                machine_with(Arc::clone(&store), Arc::clone(&chat)).await;
            machine.open().await.unwrap();
            machine
                .enter(&ChatIdentity::from("alice"), 2)
                .await
                .unwrap();
            epoch = machine.epoch();
        }

        let machine = machine_with(Arc::clone(&store), chat).await;
        assert_eq!(machine.status(), DrawingStatus::Open);
        assert_eq!(machine.epoch(), epoch);
        assert_eq!(machine.pool().len(), 2);
    }
}
