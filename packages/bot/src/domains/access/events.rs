//! Explicit room event types.
//!
//! Membership changes and allow-list updates for a room are routed through
//! one serial stream per room, so enforcement decisions always see a
//! consistent allow-list.

use std::collections::HashSet;

use crate::common::ExternalIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberEventKind {
    Entered,
    Left,
    Disconnected,
    Kicked,
    Banned,
    VoiceStart,
    VoiceEnd,
}

#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Result of a join request issued by the bot.
    Joined { success: bool },

    /// A member's room state changed.
    Member {
        kind: MemberEventKind,
        member: ExternalIdentity,
        /// Moderator responsible for a kick/ban, when the transport knows it.
        actor: Option<ExternalIdentity>,
    },

    /// A freshly computed allow-list to install and enforce.
    AllowList(HashSet<ExternalIdentity>),
}
