//! Per-room access reconciliation.
//!
//! One reconciler owns one external room. All of the room's events (join
//! results, membership changes, allow-list updates) flow through a single
//! mpsc-fed task, so a kick decision is always made against the currently
//! installed allow-list and no two decisions for a room interleave.
//!
//! Membership events can arrive before the allow-list has been seeded from
//! storage. Evaluating them against a missing list would wrongly treat
//! legitimate members as unauthorized, so they are buffered and replayed in
//! arrival order once the first allow-list is installed.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::{ExternalIdentity, RoomId};
use crate::domains::access::events::{MemberEventKind, RoomEvent};
use crate::kernel::BaseRoomTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Joining,
    Joined,
    Failed,
}

pub struct RoomReconciler {
    room: RoomId,
    rooms: Arc<dyn BaseRoomTransport>,
    bot_member: ExternalIdentity,
    join_state: JoinState,
    /// None until the first allow-list install; membership events buffer
    /// until then.
    allow_list: Option<HashSet<ExternalIdentity>>,
    present: HashSet<ExternalIdentity>,
    pending: VecDeque<(MemberEventKind, ExternalIdentity, Option<ExternalIdentity>)>,
}

impl RoomReconciler {
    pub fn new(
        room: RoomId,
        rooms: Arc<dyn BaseRoomTransport>,
        bot_member: ExternalIdentity,
    ) -> Self {
        Self {
            room,
            rooms,
            bot_member,
            join_state: JoinState::Joining,
            allow_list: None,
            present: HashSet::new(),
            pending: VecDeque::new(),
        }
    }

    /// Spawn the reconciler on its own task and return a handle feeding its
    /// serial event stream.
    pub fn spawn(
        room: RoomId,
        rooms: Arc<dyn BaseRoomTransport>,
        bot_member: ExternalIdentity,
    ) -> RoomReconcilerHandle {
        let (tx, mut rx) = mpsc::channel(256);
        let mut reconciler = Self::new(room.clone(), rooms, bot_member);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                reconciler.handle_event(event).await;
            }
            debug!(room = %reconciler.room, "room reconciler stopped");
        });

        RoomReconcilerHandle { room, tx }
    }

    pub fn join_state(&self) -> JoinState {
        self.join_state
    }

    pub fn allow_list_initialized(&self) -> bool {
        self.allow_list.is_some()
    }

    pub fn is_present(&self, member: &ExternalIdentity) -> bool {
        self.present.contains(member)
    }

    /// Process one event. Events for a room must come through one serial
    /// stream; `spawn` provides that, tests may call this directly.
    pub async fn handle_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::AllowList(allow) => self.install_allow_list(allow).await,
            RoomEvent::Joined { success } => self.on_joined(success).await,
            RoomEvent::Member {
                kind,
                member,
                actor,
            } => {
                if self.allow_list.is_none() {
                    debug!(
                        room = %self.room,
                        member = %member,
                        ?kind,
                        "allow-list not loaded yet; buffering membership event"
                    );
                    self.pending.push_back((kind, member, actor));
                    return;
                }
                self.on_member(kind, member, actor).await;
            }
        }
    }

    async fn install_allow_list(&mut self, allow: HashSet<ExternalIdentity>) {
        let first = self.allow_list.is_none();
        debug!(room = %self.room, members = allow.len(), "allow-list installed");
        self.allow_list = Some(allow);

        // Enforce against everyone already present: covers rerolled winners
        // still in the room as well as holdovers from a previous epoch.
        if self.join_state == JoinState::Joined {
            self.sweep().await;
        }

        if first {
            let pending: Vec<_> = self.pending.drain(..).collect();
            for (kind, member, actor) in pending {
                self.on_member(kind, member, actor).await;
            }
        }
    }

    async fn on_joined(&mut self, success: bool) {
        if !success {
            self.join_state = JoinState::Failed;
            warn!(room = %self.room, "room join rejected");
            return;
        }

        self.join_state = JoinState::Joined;
        match self.rooms.list_members(&self.room).await {
            Ok(members) => {
                self.present = members.into_iter().collect();
                info!(room = %self.room, present = self.present.len(), "room joined");
            }
            Err(e) => {
                warn!(room = %self.room, "failed to list members after join: {e}");
            }
        }

        if self.allow_list.is_some() {
            self.sweep().await;
        }
    }

    async fn on_member(
        &mut self,
        kind: MemberEventKind,
        member: ExternalIdentity,
        actor: Option<ExternalIdentity>,
    ) {
        match kind {
            MemberEventKind::Entered => {
                self.present.insert(member.clone());
                let authorized = self
                    .allow_list
                    .as_ref()
                    .is_some_and(|allow| allow.contains(&member));
                if !authorized && member != self.bot_member {
                    self.kick(member).await;
                }
            }
            MemberEventKind::Left
            | MemberEventKind::Disconnected
            | MemberEventKind::Kicked
            | MemberEventKind::Banned => {
                self.present.remove(&member);
                debug!(room = %self.room, member = %member, ?kind, ?actor, "member left room");
            }
            MemberEventKind::VoiceStart | MemberEventKind::VoiceEnd => {
                debug!(room = %self.room, member = %member, ?kind, "voice state changed");
            }
        }
    }

    /// Kick every present member missing from the allow-list.
    async fn sweep(&mut self) {
        let Some(allow) = &self.allow_list else {
            return;
        };

        let targets: Vec<ExternalIdentity> = self
            .present
            .iter()
            .filter(|member| !allow.contains(*member) && **member != self.bot_member)
            .cloned()
            .collect();

        for member in targets {
            self.kick(member).await;
        }
    }

    async fn kick(&mut self, member: ExternalIdentity) {
        warn!(room = %self.room, member = %member, "kicking unauthorized member");
        match self.rooms.kick(&self.room, &member).await {
            Ok(()) => {
                // The transport's Kicked event confirms removal; dropping
                // presence now avoids re-kicking the member on the next sweep.
                self.present.remove(&member);
            }
            Err(e) => {
                // Still in the room; staying present keeps the member in
                // scope for the next sweep.
                warn!(room = %self.room, member = %member, "kick failed: {e}");
            }
        }
    }
}

/// Cloneable sender side of a room's serial event stream.
#[derive(Clone)]
pub struct RoomReconcilerHandle {
    room: RoomId,
    tx: mpsc::Sender<RoomEvent>,
}

impl RoomReconcilerHandle {
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub async fn send(&self, event: RoomEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .with_context(|| format!("room reconciler for {} is gone", self.room))
    }

    pub async fn install_allow_list(&self, allow: HashSet<ExternalIdentity>) -> Result<()> {
        self.send(RoomEvent::AllowList(allow)).await
    }

    pub async fn room_joined(&self, success: bool) -> Result<()> {
        self.send(RoomEvent::Joined { success }).await
    }

    pub async fn member_event(
        &self,
        kind: MemberEventKind,
        member: ExternalIdentity,
        actor: Option<ExternalIdentity>,
    ) -> Result<()> {
        self.send(RoomEvent::Member {
            kind,
            member,
            actor,
        })
        .await
    }
}
