//! Presentation and audio boundaries for Meridian clients.
//!
//! The session coordinator never draws anything. It needs exactly two
//! things from the frontend:
//!
//! 1. **A presentation surface**, negotiated once at startup by the
//!    [`DisplayAdapter`], which tries exclusive fullscreen when asked and
//!    falls back to a window (remembering the downgrade) when the device
//!    can't do it.
//! 2. **A way to play sounds**: [`Audio`], which silently does nothing
//!    when no player was configured.
//!
//! Window systems plug in through the [`Presenter`] trait; audio backends
//! through [`SoundPlayer`]. [`HeadlessPresenter`] is a complete presenter
//! for runs without a real display (bots, CI, the console demo).

mod audio;
mod display;
mod error;
mod headless;

pub use audio::{Audio, SoundId, SoundPlayer};
pub use display::{
    Bounds, ContentView, DeviceInfo, DisplayAdapter, DisplayMode, DisplayPreferences, Frame,
    ModeSelection, Presenter, SurfaceId,
};
pub use error::{DisplayError, PresentError};
pub use headless::{HeadlessPresenter, SurfaceRecord};

/// Everything the session needs from the frontend to start.
///
/// The presenter is mandatory. Either audio player may be absent; a
/// missing player is a valid configuration, not an error.
pub struct DisplayResources {
    /// The window-system backend.
    pub presenter: Box<dyn Presenter>,
    /// Background music player, if audio is enabled.
    pub music: Option<Box<dyn SoundPlayer>>,
    /// Sound-effects player, if audio is enabled.
    pub sfx: Option<Box<dyn SoundPlayer>>,
}

impl DisplayResources {
    /// Resources with the given presenter and no audio.
    pub fn new(presenter: impl Presenter) -> Self {
        Self {
            presenter: Box::new(presenter),
            music: None,
            sfx: None,
        }
    }

    /// Adds a background music player.
    pub fn with_music(mut self, player: impl SoundPlayer) -> Self {
        self.music = Some(Box::new(player));
        self
    }

    /// Adds a sound-effects player.
    pub fn with_sfx(mut self, player: impl SoundPlayer) -> Self {
        self.sfx = Some(Box::new(player));
        self
    }
}
