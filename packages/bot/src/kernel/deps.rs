//! Bot dependencies (using traits for testability)
//!
//! Central dependency container handed to domain code. All external services
//! use trait abstractions to enable testing.

use anyhow::Result;
use async_trait::async_trait;
use profile::ProfileClient;
use std::sync::Arc;
use std::time::Duration;

use crate::common::ExternalIdentity;
use crate::domains::drawing::BaseDrawingStore;
use crate::domains::identity::BaseIdentityStore;
use crate::kernel::{BaseChatTransport, BaseProfileResolver, BaseRoomTransport};

// =============================================================================
// ProfileClient Adapter (implements BaseProfileResolver trait)
// =============================================================================

/// Wrapper around ProfileClient that implements BaseProfileResolver
pub struct ProfileAdapter(pub Arc<ProfileClient>);

impl ProfileAdapter {
    pub fn new(client: Arc<ProfileClient>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl BaseProfileResolver for ProfileAdapter {
    async fn resolve(&self, profile_link: &str) -> Result<ExternalIdentity> {
        self.0
            .resolve(profile_link)
            .await
            .map(ExternalIdentity::new)
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// BotDeps
// =============================================================================

/// Dependencies accessible to domain code (using traits for testability)
#[derive(Clone)]
pub struct BotDeps {
    pub drawings: Arc<dyn BaseDrawingStore>,
    pub identities: Arc<dyn BaseIdentityStore>,
    pub chat: Arc<dyn BaseChatTransport>,
    pub rooms: Arc<dyn BaseRoomTransport>,
    pub resolver: Arc<dyn BaseProfileResolver>,
    /// Entry copies granted to privileged identities
    pub ticket_multiplier: u32,
    /// Cadence of the "entries are open" chat notice
    pub open_notice_interval: Duration,
    /// Member seeded into every room's allow-list
    pub main_member: ExternalIdentity,
    /// The bot's own room identity; exempt from enforcement
    pub bot_member: ExternalIdentity,
}

impl BotDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        drawings: Arc<dyn BaseDrawingStore>,
        identities: Arc<dyn BaseIdentityStore>,
        chat: Arc<dyn BaseChatTransport>,
        rooms: Arc<dyn BaseRoomTransport>,
        resolver: Arc<dyn BaseProfileResolver>,
        ticket_multiplier: u32,
        open_notice_interval: Duration,
        main_member: ExternalIdentity,
        bot_member: ExternalIdentity,
    ) -> Self {
        Self {
            drawings,
            identities,
            chat,
            rooms,
            resolver,
            ticket_multiplier,
            open_notice_interval,
            main_member,
            bot_member,
        }
    }
}
