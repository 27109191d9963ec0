//! Command boundary - inbound chat command contract.
//!
//! The chat collaborator delivers already-tokenized invocations; this module
//! only recognizes the command surface. Execution lives on [`crate::Bot`].

use crate::common::{Channel, ChatIdentity};

/// Permission level attached to an inbound command by the chat collaborator.
///
/// `Privileged` identities get the ticket multiplier; `Moderator` and above
/// may run `draw` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionLevel {
    User,
    Privileged,
    Moderator,
    Admin,
}

/// One inbound command invocation from the chat surface.
#[derive(Debug, Clone)]
pub struct CommandCall {
    pub identity: ChatIdentity,
    pub level: PermissionLevel,
    pub args: Vec<String>,
    pub channel: Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Enter the drawing, optionally (re)linking a profile page.
    Play { link: Option<String> },
    /// Withdraw from the open drawing.
    Quit,
    /// Report the current winners.
    Winners,
    DrawOpen,
    /// Close and select winners; the count is validated at execution so a
    /// bad count can be reported to the caller as a user error.
    DrawClose { count: String },
    DrawReroll { target: ChatIdentity },
}

impl Command {
    /// Recognize a tokenized command. Returns None for anything that is not
    /// part of the command surface.
    pub fn parse(args: &[String]) -> Option<Self> {
        match args {
            [cmd] if cmd == "play" => Some(Command::Play { link: None }),
            [cmd, link] if cmd == "play" => Some(Command::Play {
                link: Some(link.clone()),
            }),
            [cmd] if cmd == "quit" => Some(Command::Quit),
            [cmd] if cmd == "winners" => Some(Command::Winners),
            [cmd, sub] if cmd == "draw" && sub == "open" => Some(Command::DrawOpen),
            [cmd, sub, count] if cmd == "draw" && sub == "close" => Some(Command::DrawClose {
                count: count.clone(),
            }),
            [cmd, sub, target] if cmd == "draw" && sub == "reroll" => {
                Some(Command::DrawReroll {
                    target: ChatIdentity::new(target.clone()),
                })
            }
            _ => None,
        }
    }

    /// Whether this command mutates the drawing lifecycle and therefore
    /// requires moderator rights.
    pub fn requires_moderator(&self) -> bool {
        matches!(
            self,
            Command::DrawOpen | Command::DrawClose { .. } | Command::DrawReroll { .. }
        )
    }
}
