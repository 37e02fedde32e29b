//! Playback through an external player process

use std::io::Write;
use std::process::{Command, Stdio};

use super::AudioSink;
use crate::{Error, Result};

/// Runs a player command (e.g. `mpg123 -q`) on a temporary MP3 file
///
/// The file path is appended as the last argument. The temporary file is
/// removed when playback returns, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct PlayerCommand {
    program: String,
    args: Vec<String>,
}

impl PlayerCommand {
    /// Parse a whitespace-separated command line
    ///
    /// # Errors
    ///
    /// Returns error if the command is empty
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(ToString::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("audio player command is empty".to_string()))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl AudioSink for PlayerCommand {
    fn play_mp3(&self, data: &[u8]) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("announcement-")
            .suffix(".mp3")
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;

        tracing::debug!(
            player = %self.program,
            path = %file.path().display(),
            bytes = data.len(),
            "playing through external player"
        );

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| Error::Audio(format!("failed to start {}: {e}", self.program)))?;

        if !status.success() {
            return Err(Error::Audio(format!("{} exited with {status}", self.program)));
        }

        Ok(())
    }
}
