//! A presenter with no window system behind it.
//!
//! Surfaces are bookkept in memory. Clones share state, so a test (or the
//! console demo) can keep a clone and inspect what the adapter did after
//! handing the original over.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Bounds, ContentView, DeviceInfo, DisplayMode, PresentError, Presenter, SurfaceId};

/// What the presenter knows about one live surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRecord {
    pub mode: DisplayMode,
    pub bounds: Bounds,
    pub content_attached: bool,
    pub visible: bool,
    pub exclusive: bool,
}

#[derive(Debug)]
struct State {
    device: DeviceInfo,
    refused: Vec<DisplayMode>,
    surfaces: HashMap<SurfaceId, SurfaceRecord>,
    next_id: u64,
}

/// In-memory [`Presenter`].
#[derive(Debug, Clone)]
pub struct HeadlessPresenter {
    state: Arc<Mutex<State>>,
}

impl HeadlessPresenter {
    /// A presenter for the given device.
    pub fn new(device: DeviceInfo) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                device,
                refused: Vec::new(),
                surfaces: HashMap::new(),
                next_id: 1,
            })),
        }
    }

    /// A headless 1280x720 device without fullscreen support.
    pub fn windowed_only() -> Self {
        Self::new(DeviceInfo {
            headless: true,
            fullscreen_supported: false,
            screen: Bounds::sized(1280, 720),
        })
    }

    /// A 1920x1080 device that advertises fullscreen support.
    pub fn with_fullscreen() -> Self {
        Self::new(DeviceInfo {
            headless: false,
            fullscreen_supported: true,
            screen: Bounds::sized(1920, 1080),
        })
    }

    /// Makes surface creation in `mode` fail.
    pub fn refusing(self, mode: DisplayMode) -> Self {
        self.lock().refused.push(mode);
        self
    }

    /// The record for a live surface.
    pub fn surface(&self, id: SurfaceId) -> Option<SurfaceRecord> {
        self.lock().surfaces.get(&id).copied()
    }

    /// Number of surfaces created and not yet destroyed.
    pub fn live_surfaces(&self) -> usize {
        self.lock().surfaces.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Presenter for HeadlessPresenter {
    fn device(&self) -> DeviceInfo {
        self.lock().device
    }

    fn create_surface(
        &mut self,
        mode: DisplayMode,
        bounds: Bounds,
    ) -> Result<SurfaceId, PresentError> {
        let mut state = self.lock();
        if state.refused.contains(&mode) {
            return Err(PresentError::CreateFailed(format!(
                "{mode} surfaces are unavailable"
            )));
        }
        let id = SurfaceId(state.next_id);
        state.next_id += 1;
        state.surfaces.insert(
            id,
            SurfaceRecord {
                mode,
                bounds,
                content_attached: false,
                visible: false,
                exclusive: false,
            },
        );
        Ok(id)
    }

    fn attach_content_view(
        &mut self,
        surface: SurfaceId,
        view: &ContentView,
    ) -> Result<(), PresentError> {
        let mut state = self.lock();
        let record = state
            .surfaces
            .get_mut(&surface)
            .ok_or(PresentError::UnknownSurface(surface))?;
        if view.bounds != record.bounds {
            return Err(PresentError::OperationFailed(
                "content view does not match surface bounds".into(),
            ));
        }
        record.content_attached = true;
        Ok(())
    }

    fn show(&mut self, surface: SurfaceId) -> Result<(), PresentError> {
        let mut state = self.lock();
        let record = state
            .surfaces
            .get_mut(&surface)
            .ok_or(PresentError::UnknownSurface(surface))?;
        record.visible = true;
        Ok(())
    }

    fn enter_exclusive(&mut self, surface: SurfaceId) -> Result<(), PresentError> {
        let mut state = self.lock();
        let fullscreen_supported = state.device.fullscreen_supported;
        let record = state
            .surfaces
            .get_mut(&surface)
            .ok_or(PresentError::UnknownSurface(surface))?;
        if !fullscreen_supported || record.mode != DisplayMode::Fullscreen || !record.visible {
            return Err(PresentError::OperationFailed(
                "exclusive mode not available for this surface".into(),
            ));
        }
        record.exclusive = true;
        Ok(())
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        self.lock().surfaces.remove(&surface);
    }
}
