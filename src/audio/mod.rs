//! Audio output for synthesized speech
//!
//! Remote backends return MP3 bytes; a sink turns them into sound. Each call
//! acquires its own device stream or temporary file and releases it before
//! returning.

mod device;
mod player;

pub use device::DevicePlayback;
pub use player::PlayerCommand;

use std::sync::Arc;

use crate::Result;
use crate::config::AudioConfig;

/// Destination for MP3 audio
pub trait AudioSink: Send + Sync {
    /// Play MP3 bytes to completion
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    fn play_mp3(&self, data: &[u8]) -> Result<()>;
}

/// Build the configured sink
///
/// # Errors
///
/// Returns error if the player command is malformed
pub fn sink_from_config(config: &AudioConfig) -> Result<Arc<dyn AudioSink>> {
    match config.player.as_deref() {
        Some(command) => Ok(Arc::new(PlayerCommand::parse(command)?)),
        None => Ok(Arc::new(DevicePlayback::new())),
    }
}

/// Play MP3 bytes on a blocking thread
///
/// # Errors
///
/// Returns error if playback fails or the playback thread panics
pub async fn play_blocking(sink: Arc<dyn AudioSink>, data: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || sink.play_mp3(&data))
        .await
        .map_err(|e| crate::Error::Audio(format!("playback task failed: {e}")))?
}
