//! Engine construction parameters (spec §6 constructor contract).

use std::env;
use std::path::PathBuf;

/// Default price-support ceiling, in the same fixed-point units as `price`.
pub const DEFAULT_PSUP: i64 = 12_000;
/// Default tick size.
pub const DEFAULT_TICKSIZE: i64 = 1;
/// Default cap on the effective-price curve length.
pub const DEFAULT_SNAPSHOT_SIZE: usize = 1_000;
/// Default snapshot-grid start time.
pub const DEFAULT_SNAPSHOT_START: &str = "10:15:00";
/// Default snapshot-grid end time.
pub const DEFAULT_SNAPSHOT_END: &str = "16:49:00";
/// Default cutoff for `process_orders`.
pub const DEFAULT_TIME_LIMIT: &str = "16:30";

/// Construction parameters for a [`BookEngine`](super::book_engine::BookEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on representable prices.
    pub psup: i64,
    /// Minimum price increment.
    pub ticksize: i64,
    /// Directory feed files and cache files are resolved against.
    pub datadir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            psup: DEFAULT_PSUP,
            ticksize: DEFAULT_TICKSIZE,
            datadir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl EngineConfig {
    /// Builds the default configuration rooted at `datadir`.
    pub fn with_datadir(datadir: impl Into<PathBuf>) -> Self {
        EngineConfig {
            datadir: datadir.into(),
            ..Default::default()
        }
    }
}
