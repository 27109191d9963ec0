// Mock implementations for testing
//
// Provides mock collaborators and an in-memory store that can be injected
// through BotDeps, with recorded calls for assertions.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::{Channel, ChatIdentity, EpochId, ExternalIdentity, RoomId};
use crate::domains::drawing::{BaseDrawingStore, DrawingRow, WinnerRow};
use crate::domains::identity::BaseIdentityStore;
use crate::kernel::{BaseChatTransport, BaseProfileResolver, BaseRoomTransport};

// =============================================================================
// Mock Chat Transport
// =============================================================================

#[derive(Default)]
pub struct MockChatTransport {
    says: Arc<Mutex<Vec<(Channel, String)>>>,
    whispers: Arc<Mutex<Vec<(ChatIdentity, String)>>>,
}

impl MockChatTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All channel messages sent so far
    pub fn says(&self) -> Vec<(Channel, String)> {
        self.says.lock().unwrap().clone()
    }

    /// All direct notices sent so far
    pub fn whispers(&self) -> Vec<(ChatIdentity, String)> {
        self.whispers.lock().unwrap().clone()
    }

    /// Messages said in one channel
    pub fn said_in(&self, channel: &Channel) -> Vec<String> {
        self.says
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Most recent notice whispered to one identity
    pub fn last_whisper_to(&self, identity: &ChatIdentity) -> Option<String> {
        self.whispers
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(i, _)| i == identity)
            .map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl BaseChatTransport for MockChatTransport {
    async fn say(&self, channel: &Channel, text: &str) -> Result<()> {
        self.says
            .lock()
            .unwrap()
            .push((channel.clone(), text.to_string()));
        Ok(())
    }

    async fn whisper(&self, identity: &ChatIdentity, text: &str) -> Result<()> {
        self.whispers
            .lock()
            .unwrap()
            .push((identity.clone(), text.to_string()));
        Ok(())
    }
}

// =============================================================================
// Mock Room Transport
// =============================================================================

#[derive(Default)]
pub struct MockRoomTransport {
    joins: Arc<Mutex<Vec<RoomId>>>,
    kicks: Arc<Mutex<Vec<(RoomId, ExternalIdentity)>>>,
    members: Arc<Mutex<HashMap<RoomId, Vec<ExternalIdentity>>>>,
    fail_kicks: AtomicBool,
}

impl MockRoomTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every kick call fail after being recorded
    pub fn set_fail_kicks(&self, fail: bool) {
        self.fail_kicks.store(fail, Ordering::SeqCst);
    }

    /// Seed the member list returned by `list_members` for a room
    pub fn with_members(self, room: &RoomId, members: Vec<ExternalIdentity>) -> Self {
        self.members.lock().unwrap().insert(room.clone(), members);
        self
    }

    /// All join requests issued
    pub fn joins(&self) -> Vec<RoomId> {
        self.joins.lock().unwrap().clone()
    }

    /// All kick attempts issued, in order (including failed ones)
    pub fn kicks(&self) -> Vec<(RoomId, ExternalIdentity)> {
        self.kicks.lock().unwrap().clone()
    }

    /// Check whether a kick was attempted on a member of a room
    pub fn was_kicked(&self, room: &RoomId, member: &ExternalIdentity) -> bool {
        self.kicks
            .lock()
            .unwrap()
            .iter()
            .any(|(r, m)| r == room && m == member)
    }
}

#[async_trait]
impl BaseRoomTransport for MockRoomTransport {
    async fn join_room(&self, room: &RoomId) -> Result<()> {
        self.joins.lock().unwrap().push(room.clone());
        Ok(())
    }

    async fn kick(&self, room: &RoomId, member: &ExternalIdentity) -> Result<()> {
        self.kicks
            .lock()
            .unwrap()
            .push((room.clone(), member.clone()));
        if self.fail_kicks.load(Ordering::SeqCst) {
            bail!("simulated kick failure");
        }
        Ok(())
    }

    async fn list_members(&self, room: &RoomId) -> Result<Vec<ExternalIdentity>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(room)
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// Mock Profile Resolver
// =============================================================================

#[derive(Default)]
pub struct MockProfileResolver {
    identities: Arc<Mutex<HashMap<String, ExternalIdentity>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockProfileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a profile link to a resolved external identity
    pub fn with_identity(self, link: &str, identity: ExternalIdentity) -> Self {
        self.identities
            .lock()
            .unwrap()
            .insert(link.to_string(), identity);
        self
    }

    /// All profile links that were resolved
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseProfileResolver for MockProfileResolver {
    async fn resolve(&self, profile_link: &str) -> Result<ExternalIdentity> {
        self.calls.lock().unwrap().push(profile_link.to_string());

        match self.identities.lock().unwrap().get(profile_link) {
            Some(identity) => Ok(identity.clone()),
            None => bail!("no identity found at {profile_link}"),
        }
    }
}

// =============================================================================
// In-memory store (both store traits)
// =============================================================================

/// In-memory store used by machine/resolver tests; no database required.
///
/// `set_fail_writes(true)` makes every mutating call fail, for exercising
/// transient-persistence-error propagation. `set_fail_commits(true)` fails
/// only `commit_winner`, so selection failures can be exercised after a
/// successful open and close.
#[derive(Default)]
pub struct MemoryStore {
    drawings: Mutex<HashMap<Channel, DrawingRow>>,
    entries: Mutex<Vec<(EpochId, ChatIdentity)>>,
    winners: Mutex<Vec<WinnerRow>>,
    users: Mutex<HashMap<ChatIdentity, ExternalIdentity>>,
    fail_writes: AtomicBool,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Seed an identity mapping without going through resolution
    pub fn with_user(self, chat_identity: ChatIdentity, external: ExternalIdentity) -> Self {
        self.users.lock().unwrap().insert(chat_identity, external);
        self
    }

    /// Raw entry rows for one epoch (test inspection)
    pub fn entry_rows(&self, epoch: EpochId) -> Vec<ChatIdentity> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == epoch)
            .map(|(_, identity)| identity.clone())
            .collect()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated storage failure");
        }
        Ok(())
    }
}

#[async_trait]
impl BaseDrawingStore for MemoryStore {
    async fn find_drawing(&self, channel: &Channel) -> Result<Option<DrawingRow>> {
        Ok(self.drawings.lock().unwrap().get(channel).cloned())
    }

    async fn insert_drawing(&self, row: &DrawingRow) -> Result<()> {
        self.check_writable()?;
        self.drawings
            .lock()
            .unwrap()
            .insert(Channel::new(row.channel.clone()), row.clone());
        Ok(())
    }

    async fn open_epoch(&self, channel: &Channel, epoch: EpochId) -> Result<()> {
        self.check_writable()?;
        let mut drawings = self.drawings.lock().unwrap();
        let row = drawings
            .get_mut(channel)
            .ok_or_else(|| anyhow::anyhow!("no drawing for {channel}"))?;
        row.epoch_id = epoch.as_uuid();
        row.open = true;
        Ok(())
    }

    async fn close_epoch(&self, channel: &Channel, closed_at: DateTime<Utc>) -> Result<()> {
        self.check_writable()?;
        let mut drawings = self.drawings.lock().unwrap();
        let row = drawings
            .get_mut(channel)
            .ok_or_else(|| anyhow::anyhow!("no drawing for {channel}"))?;
        row.open = false;
        row.last_closed_time = Some(closed_at);
        Ok(())
    }

    async fn add_entries(
        &self,
        epoch: EpochId,
        identity: &ChatIdentity,
        copies: u32,
    ) -> Result<()> {
        self.check_writable()?;
        let mut entries = self.entries.lock().unwrap();
        for _ in 0..copies {
            entries.push((epoch, identity.clone()));
        }
        Ok(())
    }

    async fn remove_entries(&self, epoch: EpochId, identity: &ChatIdentity) -> Result<()> {
        self.check_writable()?;
        self.entries
            .lock()
            .unwrap()
            .retain(|(e, i)| !(*e == epoch && i == identity));
        Ok(())
    }

    async fn load_entries(&self, epoch: EpochId) -> Result<Vec<ChatIdentity>> {
        Ok(self.entry_rows(epoch))
    }

    async fn commit_winner(&self, row: &WinnerRow) -> Result<()> {
        self.check_writable()?;
        if self.fail_commits.load(Ordering::SeqCst) {
            bail!("simulated winner commit failure");
        }

        let epoch = EpochId::from_uuid(row.epoch_id);
        self.entries
            .lock()
            .unwrap()
            .retain(|(e, i)| !(*e == epoch && i.as_str() == row.chat_identity));
        self.winners.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn delete_winner(&self, epoch: EpochId, identity: &ChatIdentity) -> Result<()> {
        self.check_writable()?;
        self.winners
            .lock()
            .unwrap()
            .retain(|w| !(w.epoch_id == epoch.as_uuid() && w.chat_identity == identity.as_str()));
        Ok(())
    }

    async fn load_winners(&self, channel: &Channel, epoch: EpochId) -> Result<Vec<ChatIdentity>> {
        Ok(self
            .winners
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.channel == channel.as_str() && w.epoch_id == epoch.as_uuid())
            .map(|w| ChatIdentity::new(w.chat_identity.clone()))
            .collect())
    }
}

#[async_trait]
impl BaseIdentityStore for MemoryStore {
    async fn find_user(&self, chat_identity: &ChatIdentity) -> Result<Option<ExternalIdentity>> {
        Ok(self.users.lock().unwrap().get(chat_identity).cloned())
    }

    async fn upsert_user(
        &self,
        chat_identity: &ChatIdentity,
        external: &ExternalIdentity,
    ) -> Result<()> {
        self.check_writable()?;
        self.users
            .lock()
            .unwrap()
            .insert(chat_identity.clone(), external.clone());
        Ok(())
    }
}
