// Drawbridge - raffle and room-access core
//
// This crate runs channel drawings (raffles) and keeps a restricted external
// room's membership reconciled against the winner set. Chat and room
// transports are host-supplied collaborators wired in through the kernel
// traits; the core owns the drawing lifecycle, winner selection, identity
// resolution, and allow-list enforcement.

pub mod bot;
pub mod commands;
pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod storage;

pub use bot::Bot;
pub use config::Config;
