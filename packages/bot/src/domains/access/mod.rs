//! Access domain - allow-list derivation and room membership reconciliation

pub mod allowlist;
pub mod engine;
pub mod events;

pub use allowlist::{compute_allow_list, AllowListOutcome};
pub use engine::{JoinState, RoomReconciler, RoomReconcilerHandle};
pub use events::{MemberEventKind, RoomEvent};
