//! Wire protocol for Meridian clients.
//!
//! - **Types** ([`Envelope`], [`Payload`], [`SystemMessage`], [`PlayerId`]):
//!   what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (identity, phase)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Envelope, PROTOCOL_VERSION, Payload, PlayerId, SystemMessage};
