//! The simulated live world the recorder captures from.

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info};
use worldsnap_core::context::{ConfirmationPrompt, GameContext};
use worldsnap_types::{PlayerId, WorldInfo};

use crate::config::RecorderConfig;

/// Game ticks per in-game day.
const DAY_LENGTH: u64 = 24_000;

/// A world that is either a local level or a remote connection, with a
/// clock the producers advance.
#[derive(Debug)]
pub struct SimulatedWorld {
    local_name: Option<String>,
    remote_address: Option<String>,
    local_player: PlayerId,
    game_time: AtomicU64,
    stats_requests: AtomicU32,
    private_resets: AtomicU32,
}

impl SimulatedWorld {
    /// Build the world described by `config`.
    pub fn from_config(config: &RecorderConfig) -> Self {
        Self {
            local_name: config
                .remote_address
                .is_none()
                .then(|| config.local_world_name.clone()),
            remote_address: config.remote_address.clone(),
            local_player: PlayerId::new(),
            game_time: AtomicU64::new(0),
            stats_requests: AtomicU32::new(0),
            private_resets: AtomicU32::new(0),
        }
    }

    /// Advance the world clock by one tick.
    pub fn tick(&self) {
        self.game_time.fetch_add(1, Ordering::Relaxed);
    }

    /// Statistics refreshes requested so far.
    pub fn stats_requests(&self) -> u32 {
        self.stats_requests.load(Ordering::Relaxed)
    }

    /// Private container resets requested so far.
    pub fn private_resets(&self) -> u32 {
        self.private_resets.load(Ordering::Relaxed)
    }
}

impl GameContext for SimulatedWorld {
    fn is_local(&self) -> bool {
        self.remote_address.is_none()
    }

    fn local_level_name(&self) -> Option<String> {
        self.local_name.clone()
    }

    fn remote_address(&self) -> Option<String> {
        self.remote_address.clone()
    }

    fn world_info(&self) -> WorldInfo {
        let game_time = self.game_time.load(Ordering::Relaxed);
        WorldInfo {
            dimension: String::from("minecraft:overworld"),
            day_time: game_time.checked_rem(DAY_LENGTH).unwrap_or_default(),
            game_time,
        }
    }

    fn local_player(&self) -> Option<PlayerId> {
        Some(self.local_player)
    }

    fn advancements(&self) -> serde_json::Value {
        serde_json::json!({
            "minecraft:story/root": { "done": true },
            "minecraft:adventure/root": {
                "done": self.game_time.load(Ordering::Relaxed) > DAY_LENGTH
            },
        })
    }

    fn request_stats_refresh(&self) {
        self.stats_requests.fetch_add(1, Ordering::Relaxed);
        debug!("Statistics refresh requested");
    }

    fn reset_private_container(&self) {
        self.private_resets.fetch_add(1, Ordering::Relaxed);
        info!("Private container reset to a fresh, empty one");
    }
}

/// Forwards overwrite prompts to the recorder's main task, which answers
/// them from configuration.
#[derive(Debug)]
pub struct ChannelPrompt {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelPrompt {
    /// A prompt plus the receiver its requests arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ConfirmationPrompt for ChannelPrompt {
    fn request_overwrite(&self, level_name: &str, target: &Path) {
        info!(
            level_name,
            target = %target.display(),
            "Level already exists; asking whether to overwrite"
        );
        if self.sender.send(level_name.to_owned()).is_err() {
            debug!(level_name, "Nobody is listening for overwrite prompts");
        }
    }
}
