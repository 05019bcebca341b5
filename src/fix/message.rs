//! The decoded tag-value representation of a FIX message, and a builder
//! used to assemble one for encoding.

use std::collections::BTreeMap;

use super::error::ProtocolError;
use super::tags;

/// A decoded FIX message: an ordered map of tag to raw string value.
///
/// `BTreeMap` is used rather than a hash map so that iteration order is
/// deterministic for logging and tests; the *wire* field order during
/// encoding is controlled separately by [`FixMessageBuilder`], never by
/// this map's iteration order (§4.1: "implementations must not
/// re-canonicalize field order before checksum").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixMessage {
    fields: BTreeMap<u32, String>,
}

impl FixMessage {
    /// Returns the string value of `tag`, if present.
    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields.get(&tag).map(String::as_str)
    }

    /// Parses the value of `tag` with `FromStr`, mapping failure to
    /// [`ProtocolError::InvalidFieldValue`].
    pub fn parse<T: std::str::FromStr>(&self, tag: u32) -> Result<T, ProtocolError> {
        let raw = self
            .get(tag)
            .ok_or(ProtocolError::MissingEnvelopeField(tag))?;
        raw.parse()
            .map_err(|_| ProtocolError::InvalidFieldValue {
                tag,
                value: raw.to_string(),
            })
    }

    /// Inserts or overwrites a tag's value.
    pub fn set(&mut self, tag: u32, value: impl Into<String>) {
        self.fields.insert(tag, value.into());
    }

    /// The decoded `MsgType` (tag 35), if present and recognized.
    pub fn msg_type(&self) -> Option<tags::MsgType> {
        self.get(tags::MSG_TYPE).and_then(tags::MsgType::from_code)
    }

    /// Validates that the envelope fields required by every message type
    /// are present: 8, 9, 35, 49, 56, 34, 52, 10.
    pub fn validate_envelope(&self) -> Result<(), ProtocolError> {
        for tag in [
            tags::BEGIN_STRING,
            tags::BODY_LENGTH,
            tags::MSG_TYPE,
            tags::SENDER_COMP_ID,
            tags::TARGET_COMP_ID,
            tags::MSG_SEQ_NUM,
            tags::SENDING_TIME,
            tags::CHECK_SUM,
        ] {
            if !self.fields.contains_key(&tag) {
                return Err(ProtocolError::MissingEnvelopeField(tag));
            }
        }
        Ok(())
    }

    /// Validates that the fields mandatory for `msg_type` beyond the
    /// envelope are present (§4.2, §6 field summary).
    ///
    /// New Order Single's business tags (55/54/38/40/44) are deliberately
    /// *not* enforced here: every frame flows through this check before a
    /// session ever sees it, so a codec-level rejection here would drop the
    /// frame silently instead of producing the Rejected Execution Report
    /// §7 requires for `ValidationError::MissingField`. That enforcement
    /// lives in `Session::handle_new_order`.
    pub fn validate_required_fields(&self, msg_type: tags::MsgType) -> Result<(), ProtocolError> {
        let required: &[u32] = match msg_type {
            tags::MsgType::Logon => &[tags::HEART_BT_INT],
            tags::MsgType::OrderCancelRequest => {
                &[tags::CL_ORD_ID, tags::ORDER_ID, tags::SYMBOL, tags::SIDE]
            }
            tags::MsgType::NewOrderSingle | tags::MsgType::Heartbeat | tags::MsgType::Logout => &[],
            tags::MsgType::ExecutionReport | tags::MsgType::OrderCancelReject | tags::MsgType::SessionReject => &[],
        };
        for &tag in required {
            if !self.fields.contains_key(&tag) {
                return Err(ProtocolError::MissingMandatoryField {
                    msg_type: msg_type.code().to_string(),
                    tag,
                });
            }
        }
        Ok(())
    }
}

/// Builds a FIX message body field-by-field, deferring tags 8, 9 and 10 to
/// [`FixMessageBuilder::build`] (§4.1 encoding contract (a)-(c)).
#[derive(Debug, Default)]
pub struct FixMessageBuilder {
    msg_type: Option<tags::MsgType>,
    fields: Vec<(u32, String)>,
}

impl FixMessageBuilder {
    /// Starts a new message of the given type. Tag 35 is emitted
    /// immediately after tag 9, per the encoding contract.
    pub fn new(msg_type: tags::MsgType) -> Self {
        Self {
            msg_type: Some(msg_type),
            fields: Vec::new(),
        }
    }

    /// Appends a field in the order it will be written (after 8, 9, 35).
    pub fn field(mut self, tag: u32, value: impl Into<String>) -> Self {
        self.fields.push((tag, value.into()));
        self
    }

    /// Appends a field only when `value` is `Some`.
    pub fn field_opt(self, tag: u32, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.field(tag, v),
            None => self,
        }
    }

    /// The message type this builder was started with.
    pub fn msg_type(&self) -> tags::MsgType {
        self.msg_type.expect("FixMessageBuilder always has a msg_type")
    }

    pub(super) fn fields(&self) -> &[(u32, String)] {
        &self.fields
    }
}
