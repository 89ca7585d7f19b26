//! In-process connection pair.
//!
//! Used when the client hosts its own server for a single-player game:
//! the embedded server holds one end, the session the other, and no
//! socket is involved. Tests use it as a scriptable fake server.

use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, TransportError};

/// One end of an in-memory duplex link.
pub struct MemoryConnection {
    id: ConnectionId,
    /// `None` once this end has been closed; dropping the sender is what
    /// makes the peer's `recv` return `Ok(None)`.
    tx: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    alive: AtomicBool,
}

impl MemoryConnection {
    /// Creates a connected pair. Bytes sent on one end arrive on the other.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            id: ConnectionId::next(),
            tx: StdMutex::new(Some(tx)),
            rx: Mutex::new(rx),
            alive: AtomicBool::new(true),
        }
    }

    fn shut(&self) {
        self.alive.store(false, Ordering::Release);
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(TransportError::ConnectionClosed("local end closed".into()));
        };
        tx.send(data.to_vec()).map_err(|_| {
            self.alive.store(false, Ordering::Release);
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let msg = self.rx.lock().await.recv().await;
        if msg.is_none() {
            self.alive.store(false, Ordering::Release);
        }
        Ok(msg)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.shut();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
