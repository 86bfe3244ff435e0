//! Fatal and non-fatal anomaly taxonomy (spec §7).
//!
//! [`EngineError`] covers conditions the engine cannot proceed past.
//! [`AnomalyTag`] covers self-healing conditions that are instead appended
//! to a side's `debug` log alongside the offending [`Order`](super::types::Order).

use super::types::Side;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal engine errors (spec §7): the engine cannot proceed and must
/// surface a structured error rather than silently continue.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Two events in one ingested stream carry different `session_date`s.
    #[error(
        "orders from more than one session ({first} vs {found}): one engine instance processes a single session"
    )]
    MultiSessionStream {
        /// The session date established by the first event.
        first: NaiveDate,
        /// The conflicting session date encountered later.
        found: NaiveDate,
    },

    /// `executed > size` on an incoming event.
    #[error("executed ({executed}) exceeds size ({size}) for seq {seq}")]
    ExecutedExceedsSize {
        /// The offending order's `seq`.
        seq: u64,
        /// The order's `size`.
        size: i64,
        /// The order's `executed`.
        executed: i64,
    },

    /// The event stream regressed in `prio_date`.
    #[error("event stream out of order: last applied {last_mod} is after incoming {prio_date}")]
    OutOfOrder {
        /// The watermark of the last successfully applied event.
        last_mod: NaiveDateTime,
        /// The `prio_date` of the event that would regress it.
        prio_date: NaiveDateTime,
    },

    /// `remove` would have driven a book bucket negative: the book vector
    /// and the order database have desynchronized.
    #[error(
        "removing seq {seq} from the {side} book would drive bucket {price} negative (book has {book_qty}, order carries {outstanding})"
    )]
    NegativeBookBucket {
        /// The `seq` being removed.
        seq: u64,
        /// Which side's book desynchronized.
        side: Side,
        /// The bucket's price.
        price: i64,
        /// The aggregate lots currently recorded in the bucket.
        book_qty: i64,
        /// The outstanding lots the removed order expected to find there.
        outstanding: i64,
    },

    /// `remove` was asked to retire a `seq` with no entry in the live-order
    /// database. Every call site checks `contains_key`/`Some(..)` first, so
    /// this should be unreachable in practice; it is surfaced as a
    /// structured error rather than a panic so a violated invariant fails
    /// the run instead of crashing the process.
    #[error("remove called for seq {seq} on the {side} side, but it has no live entry in the order database")]
    MissingLiveOrder {
        /// The `seq` that was not found.
        seq: u64,
        /// Which side's database was queried.
        side: Side,
    },

    /// A snapshot (or a best-price query) was requested while a side's
    /// book had no resting liquidity.
    #[error("snapshot requested while the {side} side has no resting liquidity")]
    EmptyBook {
        /// The empty side.
        side: Side,
    },

    /// A snapshot schedule or `process_orders` call was made before any
    /// events were ingested, so no session date is known.
    #[error("no session date established; ingest events before scheduling or processing")]
    NoSessionDate,

    /// A configured timestamp string could not be parsed.
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        /// The raw string that failed to parse.
        value: String,
        /// The underlying parse failure.
        #[source]
        source: chrono::ParseError,
    },

    /// A feed record had a field that could not be parsed into its
    /// expected type.
    #[error("malformed field {field:?} in feed record: {message}")]
    MalformedField {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// The persisted cache's checksum did not match its payload.
    #[error("cache integrity check failed: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        /// The checksum stored alongside the payload.
        expected: String,
        /// The checksum recomputed over the payload just read.
        actual: String,
    },

    /// The cache file was shorter than a checksum header.
    #[error("cache file is truncated (missing checksum header)")]
    TruncatedCache,

    /// Binary (de)serialization of the cached event list failed.
    #[cfg(feature = "bincode")]
    #[error("cache (de)serialization error: {0}")]
    Cache(String),

    /// I/O failure while reading a feed file at `path`.
    #[error("I/O error reading {path}: {source}")]
    IngestIo {
        /// The file path being read.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// I/O failure unrelated to a specific feed file (e.g. cache access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A feed record could not be parsed as delimited text.
    #[error("malformed CSV record: {0}")]
    Csv(#[from] csv::Error),
}

/// A short, forensic tag recorded alongside a self-healed or tolerated
/// anomaly (spec §3 `debug`, §7 non-fatal list, §9 "non-fatal anomalies
/// as data"). `Display` renders the same kebab-case tag the research
/// tooling expects to grep for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyTag {
    /// A sell order arrived at price zero and was dropped.
    SellPriceZero,
    /// An order's price was at or above `psup` and was dropped.
    PriceAbovePsup,
    /// A `new` event's `seq` was already live; prior state was replaced.
    NewOrderInDb,
    /// A `new` event arrived with `executed != 0`; accepted anyway.
    NewOrderWithExecuted,
    /// An `update` event's `seq` was not live; treated as if it were `new`.
    UpdateNotInDb,
    /// A `trade` event's `seq` was not live; treated as if it were `new`.
    TradeNotInDb,
    /// A `cancel`/`expire` event's `seq` was not live; ignored.
    CancelNotInDb,
    /// An `update` event's `executed` differed from the stored value.
    ExecutedChangedInUpdate,
    /// A `trade` event's `size` differed from the stored value.
    SizeChangeInTrade,
    /// A `trade` event's `price` differed from the stored value.
    PriceChangeInTrade,
    /// An event tag with no defined book-state behavior was discarded.
    UnknownEvent,
}

impl fmt::Display for AnomalyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            AnomalyTag::SellPriceZero => "sell-price-zero",
            AnomalyTag::PriceAbovePsup => "price-above-psup",
            AnomalyTag::NewOrderInDb => "new-order-in-db",
            AnomalyTag::NewOrderWithExecuted => "new-order-with-executed",
            AnomalyTag::UpdateNotInDb => "update-not-in-db",
            AnomalyTag::TradeNotInDb => "trade-not-in-db",
            AnomalyTag::CancelNotInDb => "cancel-not-in-db",
            AnomalyTag::ExecutedChangedInUpdate => "executed-changed-in-update",
            AnomalyTag::SizeChangeInTrade => "size-change-in-trade",
            AnomalyTag::PriceChangeInTrade => "price-change-in-trade",
            AnomalyTag::UnknownEvent => "unknown-event",
        };
        write!(f, "{tag}")
    }
}
