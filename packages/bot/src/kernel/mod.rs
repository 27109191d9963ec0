//! Kernel module - infrastructure traits and dependencies.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::{BotDeps, ProfileAdapter};
pub use test_dependencies::{
    MemoryStore, MockChatTransport, MockProfileResolver, MockRoomTransport,
};
pub use traits::*;
