// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (drawing transitions, reconciliation decisions) lives in
// domain code that uses these traits.
//
// Naming convention: Base* for trait names (e.g., BaseChatTransport)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{Channel, ChatIdentity, ExternalIdentity, RoomId};

// =============================================================================
// Chat Transport Trait (Infrastructure - outbound chat surface)
// =============================================================================

#[async_trait]
pub trait BaseChatTransport: Send + Sync {
    /// Send a message to a channel
    async fn say(&self, channel: &Channel, text: &str) -> Result<()>;

    /// Send a direct notice to one chat identity
    async fn whisper(&self, identity: &ChatIdentity, text: &str) -> Result<()>;
}

// =============================================================================
// Room Transport Trait (Infrastructure - external room primitives)
// =============================================================================

#[async_trait]
pub trait BaseRoomTransport: Send + Sync {
    /// Request to join a room; the result arrives as a room-joined event
    async fn join_room(&self, room: &RoomId) -> Result<()>;

    /// Kick a member from a room
    async fn kick(&self, room: &RoomId, member: &ExternalIdentity) -> Result<()>;

    /// List the members currently present in a room
    async fn list_members(&self, room: &RoomId) -> Result<Vec<ExternalIdentity>>;
}

// =============================================================================
// Profile Resolver Trait (Infrastructure - profile link → external identity)
// =============================================================================

#[async_trait]
pub trait BaseProfileResolver: Send + Sync {
    /// Resolve a profile link to the external identity shown on the page
    async fn resolve(&self, profile_link: &str) -> Result<ExternalIdentity>;
}
