//! Channel-keyed registry of drawing machines.
//!
//! Built once at startup from configuration and persisted snapshots; every
//! channel gets its own machine behind a tokio mutex so a channel's
//! operations (including their persistence writes) are serialized while
//! different channels run in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;

use crate::common::Channel;
use crate::domains::drawing::machine::DrawingMachine;
use crate::domains::drawing::store::BaseDrawingStore;
use crate::kernel::BaseChatTransport;

pub struct ChannelRegistry {
    channels: HashMap<Channel, Arc<Mutex<DrawingMachine>>>,
}

impl ChannelRegistry {
    /// Restore (or lazily create) a drawing machine for every configured
    /// channel.
    pub async fn load(
        channels: &[Channel],
        store: Arc<dyn BaseDrawingStore>,
        chat: Arc<dyn BaseChatTransport>,
        notice_interval: Duration,
    ) -> Result<Self> {
        let mut machines = HashMap::new();
        for channel in channels {
            let machine = DrawingMachine::restore(
                channel.clone(),
                Arc::clone(&store),
                Arc::clone(&chat),
                notice_interval,
            )
            .await?;
            machines.insert(channel.clone(), Arc::new(Mutex::new(machine)));
        }

        info!(channels = machines.len(), "channel registry loaded");
        Ok(Self { channels: machines })
    }

    /// The machine for a channel, if that channel is configured.
    pub fn get(&self, channel: &Channel) -> Option<Arc<Mutex<DrawingMachine>>> {
        self.channels.get(channel).map(Arc::clone)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.keys()
    }
}
