//! Identity domain - chat identity → external identity mappings

pub mod models;
pub mod resolver;
pub mod store;

pub use models::UserRow;
pub use resolver::{resolve_and_enter, ResolveError};
pub use store::BaseIdentityStore;
