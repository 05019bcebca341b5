//! Byte-level encode/decode for FIX 4.2 messages (§4.1).
//!
//! The wire format is `tag=value` pairs separated by the SOH byte (0x01):
//! `8=FIX.4.2␁9=NNN␁35=D␁...␁10=NNN␁`. Tag 9 is the byte length of
//! everything between it and the SOH that precedes `10=`; tag 10 is the
//! three-digit decimal of the mod-256 sum of those same bytes.

use super::error::ProtocolError;
use super::message::{FixMessage, FixMessageBuilder};
use super::tags::{self, SOH};

/// Computes the FIX checksum: `sum(bytes) mod 256`, over exactly the bytes
/// given (§4.1 "Checksum tie-break": never re-canonicalize before summing).
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encodes a message built with [`FixMessageBuilder`] into its wire bytes.
///
/// Field order on the wire is exactly: 8, 9, 35, then the builder's fields
/// in the order appended, then 10 — satisfying encoding contract (a)-(c).
pub fn encode(sender: &str, target: &str, seq: u32, sending_time: &str, builder: FixMessageBuilder) -> Vec<u8> {
    let msg_type = builder.msg_type();

    let mut body = Vec::new();
    write_field(&mut body, tags::MSG_TYPE, msg_type.code());
    write_field(&mut body, tags::SENDER_COMP_ID, sender);
    write_field(&mut body, tags::TARGET_COMP_ID, target);
    write_field(&mut body, tags::MSG_SEQ_NUM, &seq.to_string());
    write_field(&mut body, tags::SENDING_TIME, sending_time);
    for (tag, value) in builder.fields() {
        write_field(&mut body, *tag, value);
    }

    let header = format!(
        "{}={}{}{}={}{}",
        tags::BEGIN_STRING,
        tags::BEGIN_STRING_FIX42,
        SOH as char,
        tags::BODY_LENGTH,
        body.len(),
        SOH as char,
    );

    let mut pre_checksum = Vec::with_capacity(header.len() + body.len());
    pre_checksum.extend_from_slice(header.as_bytes());
    pre_checksum.extend_from_slice(&body);

    let sum = checksum(&pre_checksum);

    let mut out = pre_checksum;
    out.extend_from_slice(format!("{}={:03}{}", tags::CHECK_SUM, sum, SOH as char).as_bytes());
    out
}

fn write_field(out: &mut Vec<u8>, tag: u32, value: &str) {
    out.extend_from_slice(tag.to_string().as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.as_bytes());
    out.push(SOH);
}

/// Decodes exactly one complete FIX message from `bytes`.
///
/// `bytes` must contain precisely one frame: `8=...` through the SOH that
/// terminates `10=NNN`. Any trailing bytes are rejected
/// ([`ProtocolError::TrailingBytes`]) — callers that read from a stream of
/// concatenated messages must first split frames with [`FrameSplitter`].
pub fn decode(bytes: &[u8]) -> Result<FixMessage, ProtocolError> {
    let (msg, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(ProtocolError::TrailingBytes);
    }
    Ok(msg)
}

/// Decodes the first complete frame found at the start of `bytes`, returning
/// the message and the number of bytes it occupied. Used by both
/// [`decode`] and [`FrameSplitter`].
fn decode_prefix(bytes: &[u8]) -> Result<(FixMessage, usize), ProtocolError> {
    let begin_string_field = format!("{}={}", tags::BEGIN_STRING, tags::BEGIN_STRING_FIX42);
    if !bytes.starts_with(begin_string_field.as_bytes()) {
        return Err(ProtocolError::MalformedFraming(
            "message does not start with 8=FIX.4.2".into(),
        ));
    }
    if bytes.iter().position(|&b| b == SOH).is_none() {
        return Err(ProtocolError::MalformedFraming("no SOH delimiter found".into()));
    }

    let mut pos = 0usize;
    let mut raw_fields: Vec<(u32, String)> = Vec::new();
    let mut checked_sum_ok = false;
    let mut computed_checksum: u8 = 0;

    while pos < bytes.len() {
        let eq = bytes[pos..]
            .iter()
            .position(|&b| b == b'=')
            .map(|p| p + pos)
            .ok_or_else(|| ProtocolError::MalformedFraming("field missing '='".into()))?;
        let tag_str = std::str::from_utf8(&bytes[pos..eq])
            .map_err(|_| ProtocolError::MalformedFraming("non-UTF8 tag".into()))?;
        let tag: u32 = tag_str
            .parse()
            .map_err(|_| ProtocolError::MalformedFraming(format!("non-numeric tag: {tag_str}")))?;

        let value_start = eq + 1;
        let soh = bytes[value_start..]
            .iter()
            .position(|&b| b == SOH)
            .map(|p| p + value_start)
            .ok_or_else(|| ProtocolError::MalformedFraming("field missing SOH terminator".into()))?;
        let value = std::str::from_utf8(&bytes[value_start..soh])
            .map_err(|_| ProtocolError::MalformedFraming("non-UTF8 value".into()))?
            .to_string();

        if tag == tags::CHECK_SUM {
            let expected: u8 = value.parse().map_err(|_| ProtocolError::InvalidFieldValue {
                tag,
                value: value.clone(),
            })?;
            computed_checksum = checksum(&bytes[..pos]);
            if computed_checksum != expected {
                return Err(ProtocolError::ChecksumMismatch {
                    expected,
                    actual: computed_checksum,
                });
            }
            checked_sum_ok = true;
            raw_fields.push((tag, value));
            pos = soh + 1;
            break;
        }

        raw_fields.push((tag, value));
        pos = soh + 1;
    }

    if !checked_sum_ok {
        return Err(ProtocolError::MalformedFraming(
            "message did not contain a terminating 10= field".into(),
        ));
    }
    let _ = computed_checksum;

    let mut msg = FixMessage::default();
    for (tag, value) in raw_fields {
        msg.set(tag, value);
    }
    msg.validate_envelope()?;
    if let Some(msg_type) = msg.msg_type() {
        msg.validate_required_fields(msg_type)?;
    } else {
        let raw = msg.get(tags::MSG_TYPE).unwrap_or_default().to_string();
        return Err(ProtocolError::UnknownMessageType(raw));
    }

    Ok((msg, pos))
}

/// Extracts complete FIX frames out of a growing byte buffer fed by a TCP
/// read loop (§4.8: "Unknown or partial frames buffer until complete").
///
/// The splitter locates `9=<body_length>` to find the frame's declared
/// length, then confirms a `10=` trailer follows at the expected offset,
/// mirroring the cursor-walking technique used by FIX parsers that must
/// work over a byte stream rather than one message at a time.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends newly-read bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Whether a partial, not-yet-complete frame is sitting in the buffer.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Pops and decodes the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` when the buffer holds only a partial frame.
    /// A malformed prefix that can never become a valid frame is reported
    /// as `Err` and the offending bytes are discarded so the splitter can
    /// resynchronize on the next `8=FIX.4.2` it finds.
    pub fn next_frame(&mut self) -> Result<Option<FixMessage>, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match find_frame_end(&self.buffer) {
            FrameSearch::Incomplete => Ok(None),
            FrameSearch::Complete(len) => {
                let frame = self.buffer.drain(..len).collect::<Vec<u8>>();
                let (msg, consumed) = decode_prefix(&frame)?;
                debug_assert_eq!(consumed, frame.len());
                Ok(Some(msg))
            }
            FrameSearch::Invalid => {
                // Drop one byte and let the caller retry; resynchronizes on
                // the next occurrence of the begin-string.
                self.buffer.remove(0);
                Err(ProtocolError::MalformedFraming(
                    "could not locate a valid frame boundary".into(),
                ))
            }
        }
    }
}

enum FrameSearch {
    Incomplete,
    Complete(usize),
    Invalid,
}

fn find_frame_end(buf: &[u8]) -> FrameSearch {
    let begin_string_field = format!("{}={}", tags::BEGIN_STRING, tags::BEGIN_STRING_FIX42);
    if !buf.starts_with(begin_string_field.as_bytes()) {
        return FrameSearch::Invalid;
    }
    let body_len_tag = format!("{}{}=", SOH as char, tags::BODY_LENGTH);
    let tag9_start = match find_subslice(buf, body_len_tag.as_bytes()) {
        Some(p) => p + body_len_tag.len(),
        None => return FrameSearch::Incomplete,
    };
    let tag9_end = match buf[tag9_start..].iter().position(|&b| b == SOH) {
        Some(p) => tag9_start + p,
        None => return FrameSearch::Incomplete,
    };
    let body_len: usize = match std::str::from_utf8(&buf[tag9_start..tag9_end]).ok().and_then(|s| s.parse().ok()) {
        Some(n) => n,
        None => return FrameSearch::Invalid,
    };
    let body_start = tag9_end + 1;
    let body_end = body_start + body_len;
    let checksum_tag = format!("{}=", tags::CHECK_SUM);
    let checksum_start = body_end + checksum_tag.len();
    if buf.len() < checksum_start {
        return FrameSearch::Incomplete;
    }
    if &buf[body_end..body_end + checksum_tag.len()] != checksum_tag.as_bytes() {
        return FrameSearch::Invalid;
    }
    match buf[checksum_start..].iter().position(|&b| b == SOH) {
        Some(p) => FrameSearch::Complete(checksum_start + p + 1),
        None => FrameSearch::Incomplete,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
