//! Sound playback boundary.

use std::fmt;

/// Identifies a sound effect or music track. The mapping from id to
/// asset belongs to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundId(pub u32);

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sound-{}", self.0)
    }
}

/// An audio backend able to play a sound by id.
pub trait SoundPlayer: Send + 'static {
    fn play(&mut self, sound: SoundId);
}

/// The client's two optional players.
///
/// Either may be absent; playing through an absent player does nothing.
#[derive(Default)]
pub struct Audio {
    music: Option<Box<dyn SoundPlayer>>,
    sfx: Option<Box<dyn SoundPlayer>>,
}

impl Audio {
    pub fn new(music: Option<Box<dyn SoundPlayer>>, sfx: Option<Box<dyn SoundPlayer>>) -> Self {
        tracing::debug!(
            music = music.is_some(),
            sfx = sfx.is_some(),
            "audio players configured"
        );
        Self { music, sfx }
    }

    /// No players at all.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Plays a sound effect. No-op without an effects player.
    pub fn play_sound(&mut self, sound: SoundId) {
        match self.sfx.as_mut() {
            Some(player) => player.play(sound),
            None => tracing::trace!(%sound, "no sfx player; sound dropped"),
        }
    }

    /// Starts a music track. No-op without a music player.
    pub fn play_music(&mut self, track: SoundId) {
        if let Some(player) = self.music.as_mut() {
            player.play(track);
        }
    }

    pub fn has_music(&self) -> bool {
        self.music.is_some()
    }

    pub fn has_sfx(&self) -> bool {
        self.sfx.is_some()
    }
}

impl fmt::Debug for Audio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audio")
            .field("music", &self.music.is_some())
            .field("sfx", &self.sfx.is_some())
            .finish()
    }
}
