//! Identity store trait - persisted chat→external identity mappings.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{ChatIdentity, ExternalIdentity};

#[async_trait]
pub trait BaseIdentityStore: Send + Sync {
    async fn find_user(&self, chat_identity: &ChatIdentity) -> Result<Option<ExternalIdentity>>;

    /// Create or replace the mapping for a chat identity
    async fn upsert_user(
        &self,
        chat_identity: &ChatIdentity,
        external: &ExternalIdentity,
    ) -> Result<()>;
}
