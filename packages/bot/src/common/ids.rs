//! Typed identifiers.
//!
//! Chat identities, external room identities, channels, and rooms are all
//! strings on the wire; the newtypes keep them from being mixed up at call
//! sites. `EpochId` identifies one open→closed cycle of a channel's drawing.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// A chat channel (e.g. "#demo") with its own drawing lifecycle.
    Channel
);

string_id!(
    /// A user's identity on the chat surface.
    ChatIdentity
);

string_id!(
    /// A user's stable identity in the external room system. Room membership
    /// events carry these, so allow-lists are sets of external identities.
    ExternalIdentity
);

string_id!(
    /// An external room whose membership is reconciled against an allow-list.
    RoomId
);

/// Identifier for one drawing epoch. Assigned when a drawing opens and stable
/// through reroll; a new open assigns a fresh epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochId(Uuid);

impl EpochId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
