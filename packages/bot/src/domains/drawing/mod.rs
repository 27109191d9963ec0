//! Drawing domain - per-channel raffle lifecycle and winner selection

pub mod machine;
pub mod models;
pub mod registry;
pub mod store;

pub use machine::{DrawingError, DrawingMachine, DrawingStatus};
pub use models::{DrawingRow, WinnerRow};
pub use registry::ChannelRegistry;
pub use store::BaseDrawingStore;
