//! # b3lob-rs
//!
//! Price-time priority limit order book reconstruction for B3 equity
//! order-lifecycle feeds.
//!
//! This crate does not match orders. It replays an exchange's
//! order-lifecycle event stream (new/update/cancel/trade/expire) against a
//! price-indexed aggregate liquidity vector and a live-order database,
//! reproducing the resting book an exchange would have shown at any point
//! in the session. On top of that reconstruction it computes point-in-time
//! snapshots: best bid/ask, mid price, and the marginal/effective price
//! curve a marketable order of a given size would have paid.
//!
//! ## Key features
//!
//! - **Self-healing event interpretation**: a handful of anomaly classes
//!   (an `update` for an unknown order, a price at or above the configured
//!   ceiling, a trade whose size disagrees with the book) are logged and
//!   tolerated rather than aborting reconstruction. Everything else —
//!   `executed > size`, a desynchronized book bucket, an out-of-order
//!   event, a second session in one stream — is fatal.
//! - **Effective-price curves**: [`engine::snapshot::build_snapshot`]
//!   walks each side inward from its best price, cleaning any residual
//!   crossed liquidity first, and returns the running average price an
//!   order of each size up to `snapshot_size` would have achieved.
//! - **Checksummed caching**: parsed order streams can be persisted to and
//!   restored from a SHA-256-checksummed binary cache, avoiding a re-parse
//!   of the compressed feed on repeated runs.
//!
//! ## Example
//!
//! ```no_run
//! use b3lob_rs::prelude::*;
//!
//! # fn main() -> Result<(), EngineError> {
//! let mut engine = BookEngine::new(EngineConfig::with_datadir("./data"));
//! engine.read_orders_from_files("PETR4", &["20240102.csv.gz"])?;
//! engine.set_snapshot_freq(60)?;
//! engine.process_orders_default()?;
//!
//! for (time, snapshot) in engine.snapshots() {
//!     println!("{time}: bas={} mid={}", snapshot.bas, snapshot.mid_price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod prelude;
mod utils;

pub use engine::BookEngine;
pub use utils::init_tracing;
