//! Sound playback through a `flac | aplay` process chain

use can_audio_reactor::{PlaybackPipeline, ReactorError};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// A running decoder → player chain
pub struct ProcessChain {
    decoder: Child,
    player: Child,
}

impl ProcessChain {
    fn kill(&mut self) {
        for child in [&mut self.player, &mut self.decoder] {
            // Already exited is fine
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn reap(mut self) {
        let _ = self.decoder.wait();
        let _ = self.player.wait();
    }
}

/// Decodes a FLAC file to stdout and pipes it into the ALSA player
pub struct ProcessPipeline {
    flac_path: PathBuf,
    aplay_path: PathBuf,
}

impl ProcessPipeline {
    pub fn new(flac_path: impl Into<PathBuf>, aplay_path: impl Into<PathBuf>) -> Self {
        Self {
            flac_path: flac_path.into(),
            aplay_path: aplay_path.into(),
        }
    }
}

impl PlaybackPipeline for ProcessPipeline {
    type Handle = ProcessChain;

    fn start(&mut self, resource: &Path) -> can_audio_reactor::Result<ProcessChain> {
        let mut decoder = Command::new(&self.flac_path)
            .arg("-c")
            .arg("-d")
            .arg(resource)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ReactorError::Playback(format!("Failed to start {:?}: {}", self.flac_path, e))
            })?;

        let Some(pcm) = decoder.stdout.take() else {
            let _ = decoder.kill();
            let _ = decoder.wait();
            return Err(ReactorError::Playback("decoder has no stdout".to_string()));
        };

        let player = Command::new(&self.aplay_path)
            .arg("-q")
            .stdin(Stdio::from(pcm))
            .stdout(Stdio::null())
            .spawn();

        match player {
            Ok(player) => Ok(ProcessChain { decoder, player }),
            Err(e) => {
                let _ = decoder.kill();
                let _ = decoder.wait();
                Err(ReactorError::Playback(format!(
                    "Failed to start {:?}: {}",
                    self.aplay_path, e
                )))
            }
        }
    }

    fn stop(&mut self, mut handle: ProcessChain) {
        handle.kill();
    }

    fn detach(&mut self, handle: ProcessChain) {
        // Reap on a side thread so short tones don't leave zombies behind
        std::thread::spawn(move || handle.reap());
    }
}
