//! FIX 4.2 session and message codec (§4.1).
//!
//! Framing, checksum, tag-value parsing and message validation live here.
//! Nothing in this module understands order books or sessions; it only
//! turns bytes into [`FixMessage`] values and back.

mod codec;
mod error;
mod message;
pub mod tags;

pub use codec::{checksum, decode, encode, FrameSplitter};
pub use error::ProtocolError;
pub use message::{FixMessage, FixMessageBuilder};
