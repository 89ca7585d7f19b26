//! The game-state root and the only path that mutates it.
//!
//! The session holds the root by reference ([`GameRoot`] is a shared
//! handle). Anyone may read through [`GameRoot::read`]; structural writes
//! happen only in [`ModelGateway::apply`], which runs on the coordinator
//! task. A root swap replaces the handle, so a reader holding the old one
//! keeps seeing a whole, consistent old state.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::SessionError;

/// The game model the session carries.
///
/// The session never interprets game data; this trait only tells it the
/// shapes involved and how an update is folded into the state.
pub trait GameModel: Send + Sync + 'static {
    /// The full client-side game state.
    type State: Send + Sync + 'static;

    /// A structural change decoded from a server message.
    type Update: Send + 'static;

    /// A user action handed to the active controller.
    type Intent: Send + 'static;

    /// Folds one update into the state.
    fn apply(state: &mut Self::State, update: Self::Update);
}

// ===========================================================================
// GameRoot
// ===========================================================================

/// Shared handle to one game state.
///
/// Equality is identity: two handles are equal when they point at the
/// same state, not when the states compare equal.
pub struct GameRoot<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> GameRoot<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Runs `f` with shared access to the state.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<S> Clone for GameRoot<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> PartialEq for GameRoot<S> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<S> Eq for GameRoot<S> {}

impl<S> fmt::Debug for GameRoot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameRoot")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

// ===========================================================================
// ModelGateway
// ===========================================================================

/// Owns the session's reference to the current root and applies updates.
pub struct ModelGateway<M: GameModel> {
    root: Option<GameRoot<M::State>>,
    applied: u64,
}

impl<M: GameModel> ModelGateway<M> {
    pub fn new() -> Self {
        Self {
            root: None,
            applied: 0,
        }
    }

    pub fn root(&self) -> Option<&GameRoot<M::State>> {
        self.root.as_ref()
    }

    /// Replaces the current root. Returns the previous one.
    pub fn assign(&mut self, root: GameRoot<M::State>) -> Option<GameRoot<M::State>> {
        self.root.replace(root)
    }

    /// Drops the session's reference to the root.
    pub fn release(&mut self) -> Option<GameRoot<M::State>> {
        self.root.take()
    }

    /// Applies one update under the write lock.
    ///
    /// # Errors
    /// [`SessionError::NoGameState`] if no root is assigned; the update
    /// is dropped.
    pub fn apply(&mut self, update: M::Update) -> Result<(), SessionError> {
        let root = self.root.as_ref().ok_or(SessionError::NoGameState)?;
        root.write(|state| M::apply(state, update));
        self.applied += 1;
        Ok(())
    }

    /// Number of updates applied since construction.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

impl<M: GameModel> Default for ModelGateway<M> {
    fn default() -> Self {
        Self::new()
    }
}
