//! Prelude module that re-exports the types most code reaching for this
//! crate needs.
//!
//! ```rust
//! use b3lob_rs::prelude::*;
//! ```

pub use crate::engine::{
    AnomalyTag, BookEngine, DBOrder, EngineConfig, EngineError, EventKind, Order, OrderState,
    Side, SideBook, SideSnapshot, Snapshot,
};

pub use crate::utils::init_tracing;
