//! Order book reconstruction: event interpretation, snapshot computation,
//! feed ingestion, and cache persistence.

pub mod book_engine;
#[cfg(feature = "bincode")]
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod side_book;
pub mod snapshot;
pub mod types;

pub use book_engine::BookEngine;
pub use config::EngineConfig;
pub use error::{AnomalyTag, EngineError};
pub use side_book::SideBook;
pub use snapshot::{SideSnapshot, Snapshot};
pub use types::{DBOrder, EventKind, Order, OrderState, Side};
