//! Error types for the frontend layer.

use crate::SurfaceId;

/// Errors reported by a [`Presenter`](crate::Presenter) backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresentError {
    /// The window system refused to create a surface.
    #[error("surface creation failed: {0}")]
    CreateFailed(String),

    /// The presenter does not know this surface (already destroyed?).
    #[error("unknown surface {0}")]
    UnknownSurface(SurfaceId),

    /// The surface exists but could not be shown or switched to
    /// exclusive mode.
    #[error("surface operation failed: {0}")]
    OperationFailed(String),
}

/// Errors from display-mode negotiation.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// No presentation surface could be created at all, not even the
    /// windowed fallback. Fatal at startup.
    #[error("presentation unavailable: {0}")]
    PresentationUnavailable(#[source] PresentError),
}
