//! Errors produced while decoding or framing FIX 4.2 messages.

use thiserror::Error;

/// Failure modes distinguished by the decoder (§4.1 decoding contract).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// No SOH delimiter found, or the message does not open with `8=`.
    #[error("malformed framing: {0}")]
    MalformedFraming(String),

    /// The trailing `10=NNN` checksum does not match the computed value.
    #[error("checksum mismatch: expected {expected:03}, computed {actual:03}")]
    ChecksumMismatch {
        /// Checksum value carried in the message.
        expected: u8,
        /// Checksum computed over the received bytes.
        actual: u8,
    },

    /// A required envelope field (8, 9, 35, 49, 56, 34, 52, 10) is absent.
    #[error("missing required envelope field: tag {0}")]
    MissingEnvelopeField(u32),

    /// A field required by the specific message type is absent.
    #[error("missing mandatory field for message type {msg_type}: tag {tag}")]
    MissingMandatoryField {
        /// The `MsgType` (tag 35) code being parsed.
        msg_type: String,
        /// The missing tag.
        tag: u32,
    },

    /// Tag 35 carries a value this exchange does not support.
    #[error("unknown or unsupported message type: {0}")]
    UnknownMessageType(String),

    /// A tag's value could not be parsed as the type the field requires.
    #[error("invalid value for tag {tag}: {value}")]
    InvalidFieldValue {
        /// The offending tag.
        tag: u32,
        /// The raw value that failed to parse.
        value: String,
    },

    /// Extra bytes trailed the final `10=NNN<SOH>` outside of stream splitting.
    #[error("trailing bytes after message terminator")]
    TrailingBytes,
}
