//! FIX 4.2 tag numbers and the enumerations carried by their values.
//!
//! Only the subset of tags used by the supported message types (§6 of the
//! design) is named here.

#![allow(missing_docs)]

pub const BEGIN_STRING: u32 = 8;
pub const BODY_LENGTH: u32 = 9;
pub const MSG_TYPE: u32 = 35;
pub const SENDER_COMP_ID: u32 = 49;
pub const TARGET_COMP_ID: u32 = 56;
pub const MSG_SEQ_NUM: u32 = 34;
pub const SENDING_TIME: u32 = 52;
pub const CHECK_SUM: u32 = 10;

pub const HEART_BT_INT: u32 = 108;

pub const CL_ORD_ID: u32 = 11;
pub const SYMBOL: u32 = 55;
pub const SIDE: u32 = 54;
pub const ORDER_QTY: u32 = 38;
pub const ORD_TYPE: u32 = 40;
pub const PRICE: u32 = 44;
pub const TRANSACT_TIME: u32 = 60;

pub const ORDER_ID: u32 = 37;
pub const EXEC_ID: u32 = 17;
pub const EXEC_TYPE: u32 = 150;
pub const ORD_STATUS: u32 = 39;
pub const LAST_QTY: u32 = 32;
pub const LAST_PX: u32 = 31;
pub const CUM_QTY: u32 = 14;
pub const AVG_PX: u32 = 6;
pub const TEXT: u32 = 58;
pub const CXL_REJ_REASON: u32 = 434;

pub const BEGIN_STRING_FIX42: &str = "FIX.4.2";

pub const SOH: u8 = 0x01;

/// FIX 4.2 `MsgType` (tag 35) values supported by this exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Logon,
    Heartbeat,
    Logout,
    NewOrderSingle,
    OrderCancelRequest,
    ExecutionReport,
    OrderCancelReject,
    SessionReject,
}

impl MsgType {
    pub fn code(self) -> &'static str {
        match self {
            MsgType::Logon => "A",
            MsgType::Heartbeat => "0",
            MsgType::Logout => "5",
            MsgType::NewOrderSingle => "D",
            MsgType::OrderCancelRequest => "F",
            MsgType::ExecutionReport => "8",
            MsgType::OrderCancelReject => "9",
            MsgType::SessionReject => "3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "A" => MsgType::Logon,
            "0" => MsgType::Heartbeat,
            "5" => MsgType::Logout,
            "D" => MsgType::NewOrderSingle,
            "F" => MsgType::OrderCancelRequest,
            "8" => MsgType::ExecutionReport,
            "9" => MsgType::OrderCancelReject,
            "3" => MsgType::SessionReject,
            _ => return None,
        })
    }
}

/// FIX tag 54 `Side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FixSide {
    Buy,
    Sell,
}

impl FixSide {
    pub fn code(self) -> &'static str {
        match self {
            FixSide::Buy => "1",
            FixSide::Sell => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(FixSide::Buy),
            "2" => Some(FixSide::Sell),
            _ => None,
        }
    }
}

/// FIX tag 40 `OrdType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FixOrdType {
    Market,
    Limit,
}

impl FixOrdType {
    pub fn code(self) -> &'static str {
        match self {
            FixOrdType::Market => "1",
            FixOrdType::Limit => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(FixOrdType::Market),
            "2" => Some(FixOrdType::Limit),
            _ => None,
        }
    }
}

/// FIX tag 39 `OrdStatus` (subset emitted by this exchange).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FixOrdStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl FixOrdStatus {
    pub fn code(self) -> &'static str {
        match self {
            FixOrdStatus::New => "0",
            FixOrdStatus::PartiallyFilled => "1",
            FixOrdStatus::Filled => "2",
            FixOrdStatus::Canceled => "4",
            FixOrdStatus::Rejected => "8",
        }
    }
}

/// FIX tag 150 `ExecType` (subset emitted by this exchange).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FixExecType {
    New,
    PartialFill,
    Fill,
    Canceled,
    Rejected,
}

impl FixExecType {
    pub fn code(self) -> &'static str {
        match self {
            FixExecType::New => "0",
            FixExecType::PartialFill => "1",
            FixExecType::Fill => "2",
            FixExecType::Canceled => "4",
            FixExecType::Rejected => "8",
        }
    }
}
