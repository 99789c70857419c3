//! Headless player used by the shell.
//!
//! There is no widget behind it: commands are logged and the player's
//! callbacks are typed in by the user (`ready`, `error`, `state`).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;
use tubeloop_core::player::{PlayerConfig, PlayerFactory, PlayerHandle};
use tubeloop_core::{Result, VideoId};

/// Values the user feeds to the headless player.
#[derive(Debug, Clone, Default)]
pub struct PlayerControls {
    duration_bits: Arc<AtomicU64>,
}

impl PlayerControls {
    /// Create controls with no known duration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration the player reports for the loaded video.
    pub fn set_duration(&self, secs: f64) {
        self.duration_bits.store(secs.to_bits(), Ordering::Relaxed);
    }

    /// Forget the reported duration.
    pub fn clear_duration(&self) {
        self.duration_bits.store(0, Ordering::Relaxed);
    }

    fn duration(&self) -> Option<f64> {
        Some(f64::from_bits(self.duration_bits.load(Ordering::Relaxed))).filter(|secs| *secs > 0.0)
    }
}

/// Player that only logs what it is asked to do.
#[derive(Debug)]
pub struct HeadlessPlayer {
    controls: PlayerControls,
}

impl PlayerHandle for HeadlessPlayer {
    fn load_by_id(&mut self, id: &VideoId) {
        self.controls.clear_duration();
        info!(video_id = %id, "player: load");
    }

    fn play(&mut self) {
        info!("player: play");
    }

    fn stop(&mut self) {
        info!("player: stop");
    }

    fn set_rate(&mut self, rate: f64) {
        info!(rate, "player: set rate");
    }

    fn duration(&self) -> Option<f64> {
        self.controls.duration()
    }
}

/// Builds [`HeadlessPlayer`]s sharing one set of controls.
#[derive(Debug)]
pub struct HeadlessPlayerFactory {
    controls: PlayerControls,
}

impl HeadlessPlayerFactory {
    /// Create a factory whose players read from `controls`.
    #[must_use]
    pub const fn new(controls: PlayerControls) -> Self {
        Self { controls }
    }
}

impl PlayerFactory for HeadlessPlayerFactory {
    fn create(&mut self, config: PlayerConfig) -> Result<Box<dyn PlayerHandle>> {
        info!(
            container = %config.container,
            video_id = %config.initial_video_id,
            autoplay = config.autoplay,
            "player: create"
        );
        self.controls.clear_duration();
        Ok(Box::new(HeadlessPlayer {
            controls: self.controls.clone(),
        }))
    }
}
