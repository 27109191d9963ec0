// Common test utilities

use std::sync::Arc;
use std::time::Duration;

use bot_core::commands::{CommandCall, PermissionLevel};
use bot_core::common::{Channel, ChatIdentity, ExternalIdentity, RoomId};
use bot_core::kernel::{
    BotDeps, MemoryStore, MockChatTransport, MockProfileResolver, MockRoomTransport,
};
use bot_core::{Bot, Config};

pub const MAIN_MEMBER: &str = "main-member";
pub const BOT_MEMBER: &str = "bot-member";

pub fn channel() -> Channel {
    Channel::from("#demo")
}

pub fn room() -> RoomId {
    RoomId::from("room-1")
}

/// One configured channel bound to one room; a notice interval long enough
/// that no periodic notice fires inside a test.
pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        channel_rooms: vec![(channel(), room())],
        ticket_multiplier: 3,
        open_notice_interval: Duration::from_secs(3600),
        main_member: ExternalIdentity::from(MAIN_MEMBER),
        bot_member: ExternalIdentity::from(BOT_MEMBER),
        profile_id_selector: "#room-identity".to_string(),
    }
}

pub struct TestHarness {
    pub bot: Bot,
    pub chat: Arc<MockChatTransport>,
    pub rooms: Arc<MockRoomTransport>,
}

pub async fn start_bot(store: MemoryStore, resolver: MockProfileResolver) -> TestHarness {
    start_bot_with_rooms(store, resolver, MockRoomTransport::new()).await
}

pub async fn start_bot_with_rooms(
    store: MemoryStore,
    resolver: MockProfileResolver,
    rooms: MockRoomTransport,
) -> TestHarness {
    let store = Arc::new(store);
    let chat = Arc::new(MockChatTransport::new());
    let rooms = Arc::new(rooms);
    let config = test_config();

    let deps = BotDeps::new(
        store.clone(),
        store.clone(),
        chat.clone(),
        rooms.clone(),
        Arc::new(resolver),
        config.ticket_multiplier,
        config.open_notice_interval,
        config.main_member.clone(),
        config.bot_member.clone(),
    );

    let bot = Bot::start(&config, deps).await.expect("bot should start");

    TestHarness { bot, chat, rooms }
}

pub fn call(identity: &str, level: PermissionLevel, args: &[&str]) -> CommandCall {
    CommandCall {
        identity: ChatIdentity::from(identity),
        level,
        args: args.iter().map(ToString::to_string).collect(),
        channel: channel(),
    }
}

/// Poll until the condition holds or the deadline passes. The reconcilers run
/// as spawned tasks, so kick effects land asynchronously.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
