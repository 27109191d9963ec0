//! Bot facade - command execution and room wiring.
//!
//! Owns the channel registry and one reconciler handle per configured room.
//! Commands run against the channel's serialized machine; whenever a close or
//! reroll changes the winner set, the room's allow-list is recomputed from
//! the stored identity mappings and pushed into the room's event stream.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, warn};

use crate::commands::{Command, CommandCall, PermissionLevel};
use crate::common::{Channel, ChatIdentity, RoomId};
use crate::config::Config;
use crate::domains::access::{compute_allow_list, RoomEvent, RoomReconciler, RoomReconcilerHandle};
use crate::domains::drawing::{ChannelRegistry, DrawingError};
use crate::domains::identity::resolve_and_enter;
use crate::kernel::BotDeps;

pub struct Bot {
    deps: BotDeps,
    registry: ChannelRegistry,
    handles: HashMap<RoomId, RoomReconcilerHandle>,
    channel_rooms: HashMap<Channel, RoomId>,
}

impl Bot {
    /// Restore per-channel drawings, spawn one reconciler per room, request
    /// the room joins, and seed every room's allow-list from the stored
    /// winner set. Membership events delivered before `start` returns are
    /// buffered by the reconcilers until that seed lands.
    pub async fn start(config: &Config, deps: BotDeps) -> Result<Self> {
        let channels: Vec<Channel> = config
            .channel_rooms
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect();

        let registry = ChannelRegistry::load(
            &channels,
            deps.drawings.clone(),
            deps.chat.clone(),
            deps.open_notice_interval,
        )
        .await?;

        let mut handles = HashMap::new();
        let mut channel_rooms = HashMap::new();
        for (channel, room) in &config.channel_rooms {
            channel_rooms.insert(channel.clone(), room.clone());
            if !handles.contains_key(room) {
                handles.insert(
                    room.clone(),
                    RoomReconciler::spawn(
                        room.clone(),
                        deps.rooms.clone(),
                        deps.bot_member.clone(),
                    ),
                );
                // Join failures are transient; the joined/rejected result
                // arrives as a room event either way.
                if let Err(e) = deps.rooms.join_room(room).await {
                    warn!(room = %room, "room join request failed: {e}");
                }
            }
        }

        let bot = Self {
            deps,
            registry,
            handles,
            channel_rooms,
        };

        for channel in channels {
            bot.refresh_allow_list(&channel).await?;
        }

        Ok(bot)
    }

    /// Route an inbound room event into that room's serial stream.
    pub async fn handle_room_event(&self, room: &RoomId, event: RoomEvent) -> Result<()> {
        match self.handles.get(room) {
            Some(handle) => handle.send(event).await,
            None => {
                debug!(room = %room, "event for unconfigured room ignored");
                Ok(())
            }
        }
    }

    /// Execute one inbound chat command.
    ///
    /// User errors are whispered back to the invoking identity and leave
    /// state unchanged; transient collaborator/storage errors are whispered
    /// as well and propagated to the caller.
    pub async fn dispatch(&self, call: CommandCall) -> Result<()> {
        let Some(command) = Command::parse(&call.args) else {
            return Ok(());
        };
        let Some(machine) = self.registry.get(&call.channel) else {
            debug!(channel = %call.channel, "command for unconfigured channel ignored");
            return Ok(());
        };

        if command.requires_moderator() && call.level < PermissionLevel::Moderator {
            self.whisper(&call.identity, "You don't have permission to run draw commands.")
                .await;
            return Ok(());
        }

        match command {
            Command::Play { link } => {
                let privileged = call.level >= PermissionLevel::Privileged;
                let result = resolve_and_enter(
                    &machine,
                    &self.deps,
                    &call.identity,
                    link.as_deref(),
                    privileged,
                )
                .await;

                match result {
                    Ok(_) => {
                        let tickets = if privileged {
                            self.deps.ticket_multiplier
                        } else {
                            1
                        };
                        self.whisper(
                            &call.identity,
                            &format!("You're in with {tickets} ticket(s). Good luck!"),
                        )
                        .await;
                        Ok(())
                    }
                    Err(e) => self.report(&call.identity, e.is_user_error(), e.into()).await,
                }
            }

            Command::Quit => {
                let result = machine.lock().await.quit(&call.identity).await;
                match result {
                    Ok(()) => {
                        self.whisper(&call.identity, "You're out of the drawing.").await;
                        Ok(())
                    }
                    Err(e) => self.report(&call.identity, e.is_user_error(), e.into()).await,
                }
            }

            Command::Winners => {
                let winners = machine.lock().await.winners().to_vec();
                let text = if winners.is_empty() {
                    "No winners yet.".to_string()
                } else {
                    format!(
                        "Current winners: {}",
                        winners
                            .iter()
                            .map(|w| w.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                };
                self.say(&call.channel, &text).await;
                Ok(())
            }

            Command::DrawOpen => {
                let result = machine.lock().await.open().await;
                match result {
                    Ok(()) => {
                        self.say(
                            &call.channel,
                            "A drawing is open! Type !play <profile link> to enter.",
                        )
                        .await;
                        Ok(())
                    }
                    Err(e) => self.report(&call.identity, e.is_user_error(), e.into()).await,
                }
            }

            Command::DrawClose { count } => {
                let Some(count) = count.parse::<u32>().ok().filter(|n| *n > 0) else {
                    self.whisper(&call.identity, &DrawingError::InvalidCount.to_string())
                        .await;
                    return Ok(());
                };

                let result = machine.lock().await.close(count).await;
                match result {
                    Ok(winners) => {
                        self.refresh_allow_list(&call.channel).await?;
                        let text = if winners.is_empty() {
                            "The drawing closed with no entrants.".to_string()
                        } else {
                            format!(
                                "The drawing is closed! Winners: {}",
                                winners
                                    .iter()
                                    .map(|w| w.as_str())
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            )
                        };
                        self.say(&call.channel, &text).await;
                        Ok(())
                    }
                    Err(e) => self.report(&call.identity, e.is_user_error(), e.into()).await,
                }
            }

            Command::DrawReroll { target } => {
                let result = machine.lock().await.reroll(&target).await;
                match result {
                    Ok(replacement) => {
                        self.refresh_allow_list(&call.channel).await?;
                        self.say(
                            &call.channel,
                            &format!("Rerolled: {replacement} replaces {target}."),
                        )
                        .await;
                        Ok(())
                    }
                    Err(e) => self.report(&call.identity, e.is_user_error(), e.into()).await,
                }
            }
        }
    }

    /// Recompute a channel's room allow-list from the current winners and
    /// stored identity mappings, and push it into the room's event stream.
    pub async fn refresh_allow_list(&self, channel: &Channel) -> Result<()> {
        let Some(machine) = self.registry.get(channel) else {
            return Ok(());
        };
        let Some(room) = self.channel_rooms.get(channel) else {
            return Ok(());
        };
        let Some(handle) = self.handles.get(room) else {
            return Ok(());
        };

        let winners = machine.lock().await.winners().to_vec();

        let mut mapping = HashMap::new();
        for winner in &winners {
            if let Some(external) = self.deps.identities.find_user(winner).await? {
                mapping.insert(winner.clone(), external);
            }
        }

        let outcome = compute_allow_list(&self.deps.main_member, &winners, &mapping);
        for winner in &outcome.unresolved {
            warn!(
                channel = %channel,
                winner = %winner,
                "winner has no resolved external identity; excluded from allow-list"
            );
        }

        handle.install_allow_list(outcome.allow).await
    }

    async fn say(&self, channel: &Channel, text: &str) {
        if let Err(e) = self.deps.chat.say(channel, text).await {
            warn!(channel = %channel, "failed to send channel message: {e}");
        }
    }

    async fn whisper(&self, identity: &ChatIdentity, text: &str) {
        if let Err(e) = self.deps.chat.whisper(identity, text).await {
            warn!(identity = %identity, "failed to send whisper: {e}");
        }
    }

    /// Whisper an error to the invoking identity. User errors end there;
    /// transient errors also propagate to the caller.
    async fn report(
        &self,
        identity: &ChatIdentity,
        user_error: bool,
        error: anyhow::Error,
    ) -> Result<()> {
        self.whisper(identity, &error.to_string()).await;
        if user_error {
            Ok(())
        } else {
            Err(error)
        }
    }
}
