//! Event vocabulary and data model: `Order`, `DBOrder`, and the tagged
//! variants decoded from the exchange's integer/character encodings.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the book an order lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy (bid) side.
    Buy,
    /// Sell (ask) side.
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl Side {
    /// Decodes the feed's `"1"`/`"2"` side code (field 2).
    pub fn from_code(code: &str) -> Option<Side> {
        match code.trim() {
            "1" => Some(Side::Buy),
            "2" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// An order-lifecycle event tag (field 5 of the feed).
///
/// Every integer in the decoding table is representable, including the
/// four tags (`newstop`, `reject`, `removed`, `stopped`) that the event
/// interpreter never gives distinct behavior to — they are recognized,
/// not invented, and fall into the same `unknown-event` dispatch arm as a
/// genuinely unrecognized code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Order enters the book.
    New,
    /// Order is replaced in place.
    Update,
    /// Order is withdrawn by its owner.
    Cancel,
    /// Order is (partially or fully) executed.
    Trade,
    /// No-op lifecycle marker.
    Reentry,
    /// Recognized but behaviorally inert (see module docs).
    NewStop,
    /// Recognized but behaviorally inert (see module docs).
    Reject,
    /// Recognized but behaviorally inert (see module docs).
    Removed,
    /// Recognized but behaviorally inert (see module docs).
    Stopped,
    /// Order's time-in-force elapses.
    Expire,
    /// Any code not in the feed's decoding table.
    Unknown(u16),
}

impl EventKind {
    /// Decodes the feed's integer event code (field 5).
    pub fn from_code(code: u16) -> EventKind {
        match code {
            1 => EventKind::New,
            2 => EventKind::Update,
            3 => EventKind::Cancel,
            4 => EventKind::Trade,
            5 => EventKind::Reentry,
            6 => EventKind::NewStop,
            7 => EventKind::Reject,
            8 => EventKind::Removed,
            9 => EventKind::Stopped,
            11 => EventKind::Expire,
            other => EventKind::Unknown(other),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::New => write!(f, "new"),
            EventKind::Update => write!(f, "update"),
            EventKind::Cancel => write!(f, "cancel"),
            EventKind::Trade => write!(f, "trade"),
            EventKind::Reentry => write!(f, "reentry"),
            EventKind::NewStop => write!(f, "newstop"),
            EventKind::Reject => write!(f, "reject"),
            EventKind::Removed => write!(f, "removed"),
            EventKind::Stopped => write!(f, "stopped"),
            EventKind::Expire => write!(f, "expire"),
            EventKind::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// The exchange's per-order state tag (field 13). Parsed for completeness;
/// no engine behavior depends on it (spec §9, open question).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// `0`
    New,
    /// `1`
    Partial,
    /// `2`
    Executed,
    /// `4`
    Cancelled,
    /// `5`
    Modified,
    /// `8`
    Rejected,
    /// `C`
    Expired,
    /// Any code not in the feed's decoding table.
    Unknown(String),
}

impl OrderState {
    /// Decodes the feed's state code (field 13).
    pub fn from_code(code: &str) -> OrderState {
        match code.trim() {
            "0" => OrderState::New,
            "1" => OrderState::Partial,
            "2" => OrderState::Executed,
            "4" => OrderState::Cancelled,
            "5" => OrderState::Modified,
            "8" => OrderState::Rejected,
            "C" => OrderState::Expired,
            other => OrderState::Unknown(other.to_string()),
        }
    }
}

/// An immutable order-lifecycle event, as produced by the ingestion layer.
///
/// `price` is an integer in ticks × 100 (two-decimal fixed point); `size`
/// and `executed` are integers in lots (100 shares per lot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Absolute timestamp establishing priority order in the stream.
    pub prio_date: NaiveDateTime,
    /// Trading-session calendar date; shared by every event in one run.
    pub session_date: NaiveDate,
    /// Exchange-assigned order identifier, stable across the order's lifecycle.
    pub seq: u64,
    /// Generation identifier (field 4); carried through but not consulted.
    pub gen_id: u64,
    /// Buy or sell.
    pub side: Side,
    /// Lifecycle event tag.
    pub event: EventKind,
    /// Exchange state tag; parsed, never consulted.
    pub state: OrderState,
    /// `1` designates a market-order execution.
    pub condition: i32,
    /// Price in ticks × 100.
    pub price: i64,
    /// Order quantity in lots.
    pub size: i64,
    /// Executed quantity in lots. Invariant: `0 <= executed <= size`.
    pub executed: i64,
}

impl Order {
    /// Outstanding (unexecuted) quantity in lots.
    pub fn outstanding(&self) -> i64 {
        self.size - self.executed
    }
}

/// The engine's materialized view of one live order, keyed by `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DBOrder {
    /// Order quantity in lots.
    pub size: i64,
    /// Executed quantity in lots.
    pub executed: i64,
    /// Price in ticks × 100.
    pub price: i64,
    /// Buy or sell.
    pub side: Side,
}

impl DBOrder {
    /// Outstanding (unexecuted) quantity in lots.
    pub fn outstanding(&self) -> i64 {
        self.size - self.executed
    }
}

impl From<&Order> for DBOrder {
    fn from(order: &Order) -> Self {
        DBOrder {
            size: order.size,
            executed: order.executed,
            price: order.price,
            side: order.side,
        }
    }
}
