//! Display-mode negotiation.
//!
//! The adapter owns the one presentation surface the client has. It is
//! created once at startup in either windowed or exclusive-fullscreen
//! mode; the mode is a tagged [`Frame`] so the mode-specific steps
//! (fullscreen needs an extra "go exclusive" call after `show`) are
//! resolved once, here, and nowhere else.
//!
//! ## Fallback policy
//!
//! ```text
//! requested windowed ───────────────────────────────→ Windowed
//! requested fullscreen ─┬─ device supports it ──ok──→ Fullscreen
//!                       │                       └err─┐
//!                       └─ unsupported ──────────────┴─→ Windowed
//!                                                        + preference.windowed = true
//!                                                        + one warning
//! ```
//!
//! The downgrade is one-way: the adapter never flips the preference back.
//! A caller that wants fullscreen again must ask for it explicitly, and
//! only a fullscreen surface that actually opens clears `windowed`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DisplayError, PresentError};

// ===========================================================================
// Geometry and identity
// ===========================================================================

/// A rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// A rectangle anchored at the origin.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Handle to a surface created by a [`Presenter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// What the display device reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// No physical display attached. Not fatal by itself: a presenter
    /// may still hand out (virtual) surfaces.
    pub headless: bool,
    /// Whether exclusive fullscreen is available.
    pub fullscreen_supported: bool,
    /// Bounds of the default screen.
    pub screen: Bounds,
}

/// The two presentation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayMode {
    Windowed,
    Fullscreen,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windowed => write!(f, "windowed"),
            Self::Fullscreen => write!(f, "fullscreen"),
        }
    }
}

/// The stored display preference. Persisted by the client config layer
/// so a fallback survives restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayPreferences {
    /// `false` asks for exclusive fullscreen.
    pub windowed: bool,
}

/// The content view (the game canvas) attached to the surface. Sized to
/// the surface it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentView {
    pub bounds: Bounds,
}

// ===========================================================================
// Presenter boundary
// ===========================================================================

/// The window-system backend.
///
/// Only called during startup, mode fallback, reselection, and teardown;
/// never per frame.
pub trait Presenter: Send + 'static {
    /// Describes the default display device.
    fn device(&self) -> DeviceInfo;

    /// Creates a surface for `mode` covering `bounds`.
    fn create_surface(
        &mut self,
        mode: DisplayMode,
        bounds: Bounds,
    ) -> Result<SurfaceId, PresentError>;

    /// Attaches the content view to the surface.
    fn attach_content_view(
        &mut self,
        surface: SurfaceId,
        view: &ContentView,
    ) -> Result<(), PresentError>;

    /// Makes the surface visible.
    fn show(&mut self, surface: SurfaceId) -> Result<(), PresentError>;

    /// Switches a visible fullscreen surface to exclusive mode.
    fn enter_exclusive(&mut self, surface: SurfaceId) -> Result<(), PresentError>;

    /// Releases the surface. Unknown ids are ignored.
    fn destroy_surface(&mut self, surface: SurfaceId);
}

// ===========================================================================
// Frame
// ===========================================================================

/// The active surface, tagged with its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Windowed { surface: SurfaceId, bounds: Bounds },
    Fullscreen { surface: SurfaceId, bounds: Bounds },
}

impl Frame {
    /// Creates the surface and runs the mode's presentation steps. On any
    /// failure after creation the surface is destroyed again.
    fn open(
        presenter: &mut dyn Presenter,
        mode: DisplayMode,
        bounds: Bounds,
    ) -> Result<Self, PresentError> {
        let surface = presenter.create_surface(mode, bounds)?;
        let frame = match mode {
            DisplayMode::Windowed => Self::Windowed { surface, bounds },
            DisplayMode::Fullscreen => Self::Fullscreen { surface, bounds },
        };
        if let Err(e) = frame.present(presenter) {
            presenter.destroy_surface(surface);
            return Err(e);
        }
        Ok(frame)
    }

    fn present(&self, presenter: &mut dyn Presenter) -> Result<(), PresentError> {
        let view = ContentView {
            bounds: self.bounds(),
        };
        presenter.attach_content_view(self.surface(), &view)?;
        presenter.show(self.surface())?;
        if let Self::Fullscreen { surface, .. } = self {
            presenter.enter_exclusive(*surface)?;
        }
        Ok(())
    }

    /// The mode this frame was opened in.
    pub fn mode(&self) -> DisplayMode {
        match self {
            Self::Windowed { .. } => DisplayMode::Windowed,
            Self::Fullscreen { .. } => DisplayMode::Fullscreen,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        match self {
            Self::Windowed { surface, .. } | Self::Fullscreen { surface, .. } => *surface,
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Windowed { bounds, .. } | Self::Fullscreen { bounds, .. } => *bounds,
        }
    }
}

// ===========================================================================
// DisplayAdapter
// ===========================================================================

/// Result of [`DisplayAdapter::select_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSelection {
    /// The surface now on screen.
    pub frame: Frame,
    /// `true` when this call fell back from fullscreen to windowed.
    pub downgraded: bool,
}

/// Owns the presenter and the single presentation surface.
pub struct DisplayAdapter {
    presenter: Box<dyn Presenter>,
    preferences: DisplayPreferences,
    frame: Option<Frame>,
    fallback_applied: bool,
}

impl DisplayAdapter {
    /// Creates the adapter and opens the surface the preferences ask for.
    ///
    /// # Errors
    /// [`DisplayError::PresentationUnavailable`] if not even a windowed
    /// surface could be created.
    pub fn start(
        presenter: Box<dyn Presenter>,
        preferences: DisplayPreferences,
    ) -> Result<Self, DisplayError> {
        let mut adapter = Self {
            presenter,
            preferences,
            frame: None,
            fallback_applied: false,
        };
        adapter.select_mode(preferences.windowed)?;
        Ok(adapter)
    }

    /// Opens a surface in the requested mode, replacing the current one.
    ///
    /// The stored preference follows the mode that was actually opened:
    /// an explicit fullscreen request that succeeds clears `windowed`, a
    /// downgrade sets it. See the module docs for the fallback policy.
    pub fn select_mode(
        &mut self,
        requested_windowed: bool,
    ) -> Result<ModeSelection, DisplayError> {
        let device = self.presenter.device();
        if device.headless {
            tracing::info!("display device reports a headless environment");
        }

        if let Some(old) = self.frame.take() {
            self.presenter.destroy_surface(old.surface());
        }
        self.fallback_applied = false;

        let frame = if requested_windowed {
            self.open_windowed(device.screen)?
        } else if !device.fullscreen_supported {
            tracing::warn!(
                "fullscreen mode is not supported by this display device; using windowed mode instead"
            );
            self.fallback_applied = true;
            self.open_windowed(device.screen)?
        } else {
            match Frame::open(self.presenter.as_mut(), DisplayMode::Fullscreen, device.screen) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "could not open a fullscreen surface; using windowed mode instead"
                    );
                    self.fallback_applied = true;
                    self.open_windowed(device.screen)?
                }
            }
        };
        self.preferences.windowed = frame.mode() == DisplayMode::Windowed;

        tracing::info!(
            mode = %frame.mode(),
            surface = %frame.surface(),
            width = frame.bounds().width,
            height = frame.bounds().height,
            "presentation surface ready"
        );
        self.frame = Some(frame);
        Ok(ModeSelection {
            frame,
            downgraded: self.fallback_applied,
        })
    }

    fn open_windowed(&mut self, bounds: Bounds) -> Result<Frame, DisplayError> {
        Frame::open(self.presenter.as_mut(), DisplayMode::Windowed, bounds).map_err(|e| {
            tracing::error!(error = %e, "no presentation surface could be created");
            DisplayError::PresentationUnavailable(e)
        })
    }

    /// The current frame, `None` after [`close`](Self::close).
    pub fn frame(&self) -> Option<Frame> {
        self.frame
    }

    /// Bounds of the current surface.
    pub fn surface_bounds(&self) -> Option<Bounds> {
        self.frame.map(|f| f.bounds())
    }

    /// The stored preference; reads `windowed = true` after a fallback.
    pub fn preferences(&self) -> DisplayPreferences {
        self.preferences
    }

    pub fn is_windowed(&self) -> bool {
        self.preferences.windowed
    }

    /// `true` when the most recent selection downgraded a fullscreen
    /// request to windowed.
    pub fn fallback_applied(&self) -> bool {
        self.fallback_applied
    }

    /// Destroys the surface. Idempotent.
    pub fn close(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.presenter.destroy_surface(frame.surface());
            tracing::debug!(surface = %frame.surface(), "presentation surface closed");
        }
    }
}

impl Drop for DisplayAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
