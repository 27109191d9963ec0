use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::common::{Channel, ExternalIdentity, RoomId};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Channel → external room pairs, e.g. "#demo=room-1,#other=room-2".
    pub channel_rooms: Vec<(Channel, RoomId)>,
    /// Entry copies granted to privileged identities.
    pub ticket_multiplier: u32,
    pub open_notice_interval: Duration,
    /// Member seeded into every room's allow-list.
    pub main_member: ExternalIdentity,
    /// The bot's own room identity; never kicked.
    pub bot_member: ExternalIdentity,
    /// CSS selector used to extract the external identity from profile pages.
    pub profile_id_selector: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let channel_rooms = parse_channel_rooms(
            &env::var("CHANNEL_ROOMS").context("CHANNEL_ROOMS must be set")?,
        )?;

        let notice_secs: u64 = env::var("OPEN_NOTICE_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("OPEN_NOTICE_INTERVAL_SECS must be a valid number")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            channel_rooms,
            ticket_multiplier: env::var("TICKET_MULTIPLIER")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("TICKET_MULTIPLIER must be a valid number")?,
            open_notice_interval: Duration::from_secs(notice_secs),
            main_member: ExternalIdentity::new(
                env::var("MAIN_MEMBER_ID").context("MAIN_MEMBER_ID must be set")?,
            ),
            bot_member: ExternalIdentity::new(
                env::var("BOT_MEMBER_ID").context("BOT_MEMBER_ID must be set")?,
            ),
            profile_id_selector: env::var("PROFILE_ID_SELECTOR")
                .unwrap_or_else(|_| "#room-identity".to_string()),
        })
    }
}

/// Parse "channel=room" comma-separated pairs.
fn parse_channel_rooms(raw: &str) -> Result<Vec<(Channel, RoomId)>> {
    let mut pairs = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((channel, room)) = part.split_once('=') else {
            bail!("CHANNEL_ROOMS entry '{part}' is not of the form channel=room");
        };
        let channel = channel.trim();
        let room = room.trim();
        if channel.is_empty() || room.is_empty() {
            bail!("CHANNEL_ROOMS entry '{part}' has an empty channel or room");
        }
        pairs.push((Channel::new(channel), RoomId::new(room)));
    }
    if pairs.is_empty() {
        bail!("CHANNEL_ROOMS must contain at least one channel=room pair");
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_room_pairs() {
        let pairs = parse_channel_rooms("#demo=room-1, #other=room-2").unwrap();
        assert_eq!(
            pairs,
            vec![
                (Channel::from("#demo"), RoomId::from("room-1")),
                (Channel::from("#other"), RoomId::from("room-2")),
            ]
        );
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(parse_channel_rooms("#demo").is_err());
        assert!(parse_channel_rooms("#demo=").is_err());
        assert!(parse_channel_rooms("").is_err());
    }
}
