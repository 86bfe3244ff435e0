//! The top-level engine: owns both side books, the ingested order stream,
//! the snapshot schedule, and the replay loop that drives them (spec §2,
//! §6).

use super::config::{
    EngineConfig, DEFAULT_SNAPSHOT_END, DEFAULT_SNAPSHOT_SIZE, DEFAULT_SNAPSHOT_START,
    DEFAULT_TIME_LIMIT,
};
use super::error::EngineError;
use super::ingest;
use super::side_book::SideBook;
use super::snapshot::{self, Snapshot};
use super::types::{Order, Side};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::{info, instrument};

#[cfg(feature = "bincode")]
use super::cache;

/// Reconstructs a single trading session's order book from its
/// order-lifecycle feed and produces price-impact snapshots at scheduled
/// instants.
///
/// One `BookEngine` reconstructs exactly one ticker's book for exactly one
/// session; ingesting events from a second session is a fatal error.
#[derive(Debug, Clone)]
pub struct BookEngine {
    psup: i64,
    ticksize: i64,
    datadir: std::path::PathBuf,

    buy: SideBook,
    sell: SideBook,

    orders: Vec<Order>,
    session_date: Option<NaiveDate>,
    last_mod: Option<NaiveDateTime>,

    snapshot_times: Vec<NaiveDateTime>,
    next_snapshot_idx: usize,
    snapshot_size: usize,
    snapshots: Vec<(NaiveDateTime, Snapshot)>,
}

impl BookEngine {
    /// Builds an empty engine from `config`.
    pub fn new(config: EngineConfig) -> BookEngine {
        BookEngine {
            psup: config.psup,
            ticksize: config.ticksize,
            datadir: config.datadir,
            buy: SideBook::new(config.psup, config.ticksize, Side::Buy),
            sell: SideBook::new(config.psup, config.ticksize, Side::Sell),
            orders: Vec::new(),
            session_date: None,
            last_mod: None,
            snapshot_times: Vec::new(),
            next_snapshot_idx: 0,
            snapshot_size: DEFAULT_SNAPSHOT_SIZE,
            snapshots: Vec::new(),
        }
    }

    /// The buy-side book.
    pub fn buy(&self) -> &SideBook {
        &self.buy
    }

    /// The sell-side book.
    pub fn sell(&self) -> &SideBook {
        &self.sell
    }

    /// The ingested, priority-sorted order stream.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// The session date established by the first ingested event, if any.
    pub fn session_date(&self) -> Option<NaiveDate> {
        self.session_date
    }

    /// The priority timestamp of the last applied event, if any.
    pub fn last_mod(&self) -> Option<NaiveDateTime> {
        self.last_mod
    }

    /// Captured `(scheduled_time, snapshot)` pairs, in schedule order.
    pub fn snapshots(&self) -> &[(NaiveDateTime, Snapshot)] {
        &self.snapshots
    }

    /// The configured snapshot grid, sorted ascending.
    pub fn snapshot_times(&self) -> &[NaiveDateTime] {
        &self.snapshot_times
    }

    fn adopt_session_date(&mut self, found: NaiveDate) -> Result<(), EngineError> {
        match self.session_date {
            None => {
                self.session_date = Some(found);
                Ok(())
            }
            Some(existing) if existing != found => Err(EngineError::MultiSessionStream {
                first: existing,
                found,
            }),
            _ => Ok(()),
        }
    }

    /// Installs a pre-sorted chronological event list, replacing whatever
    /// was previously accumulated (spec §4.2).
    ///
    /// Derives `session_date` from the first event if none is established
    /// yet; every event must share it, or ingestion is rejected as a
    /// second session.
    pub fn ingest_events(&mut self, orders: Vec<Order>) -> Result<(), EngineError> {
        for order in &orders {
            self.adopt_session_date(order.session_date)?;
        }
        self.orders = orders;
        Ok(())
    }

    /// Decodes `fnames` (resolved under the configured `datadir`) for
    /// `ticker`, merges the result into the accumulated order stream,
    /// re-sorts the whole stream by `prio_date`, and installs it via
    /// [`ingest_events`](Self::ingest_events) (spec §6).
    ///
    /// Can be called more than once to accumulate several feed files, as
    /// long as every ingested event shares one `session_date`.
    #[instrument(skip(self, fnames))]
    pub fn read_orders_from_files(
        &mut self,
        ticker: &str,
        fnames: &[impl AsRef<str>],
    ) -> Result<(), EngineError> {
        let fetched = ingest::read_orders_from_files(&self.datadir, ticker, fnames)?;

        let mut combined = std::mem::take(&mut self.orders);
        combined.extend(fetched);
        combined.sort_by_key(|order| order.prio_date);

        let total = combined.len();
        self.ingest_events(combined)?;
        info!(ticker, total, "events ingested");
        Ok(())
    }

    /// Serializes the accumulated order stream to a checksummed cache file
    /// under `datadir`.
    #[cfg(feature = "bincode")]
    pub fn save_orders_to_cache(&self, fname: impl AsRef<Path>) -> Result<(), EngineError> {
        cache::save_orders_to_cache(&self.datadir.join(fname), &self.orders)
    }

    /// Replaces the accumulated order stream with the contents of a
    /// checksummed cache file, adopting its first event's `session_date`.
    #[cfg(feature = "bincode")]
    pub fn read_orders_from_cache(&mut self, fname: impl AsRef<Path>) -> Result<(), EngineError> {
        let orders = cache::read_orders_from_cache(&self.datadir.join(fname))?;
        self.session_date = orders.first().map(|o| o.session_date);
        self.orders = orders;
        Ok(())
    }

    fn require_session_date(&self) -> Result<NaiveDate, EngineError> {
        self.session_date.ok_or(EngineError::NoSessionDate)
    }

    fn parse_session_time(&self, time: &str, fmt: &str) -> Result<NaiveDateTime, EngineError> {
        let session_date = self.require_session_date()?;
        let joined = format!("{session_date} {time}");
        let full_fmt = format!("%Y-%m-%d {fmt}");
        NaiveDateTime::parse_from_str(&joined, &full_fmt).map_err(|source| {
            EngineError::InvalidTimestamp {
                value: joined,
                source,
            }
        })
    }

    /// Installs an explicit, arbitrary snapshot grid, given as `"HH:MM:SS"`
    /// times within the established session, sorted ascending.
    pub fn set_snapshot_times(&mut self, times: &[&str]) -> Result<(), EngineError> {
        let mut parsed = Vec::with_capacity(times.len());
        for time in times {
            parsed.push(self.parse_session_time(time, "%H:%M:%S")?);
        }
        parsed.sort();
        self.snapshot_times = parsed;
        self.next_snapshot_idx = 0;
        Ok(())
    }

    /// Installs a regular snapshot grid: every `interval` seconds from
    /// `start` through `end` inclusive, with a curve length cap of
    /// `max_size`.
    pub fn set_snapshot_freq_with(
        &mut self,
        interval_secs: i64,
        max_size: usize,
        start: &str,
        end: &str,
    ) -> Result<(), EngineError> {
        let t0 = self.parse_session_time(start, "%H:%M:%S")?;
        let t_end = self.parse_session_time(end, "%H:%M:%S")?;

        self.snapshot_size = max_size;

        let step = Duration::seconds(interval_secs);
        let mut times = Vec::new();
        let mut t = t0;
        while t <= t_end {
            times.push(t);
            t += step;
        }
        times.sort();
        self.snapshot_times = times;
        self.next_snapshot_idx = 0;
        Ok(())
    }

    /// [`set_snapshot_freq_with`] using the module defaults for
    /// `max_size`, `start`, and `end`.
    pub fn set_snapshot_freq(&mut self, interval_secs: i64) -> Result<(), EngineError> {
        self.set_snapshot_freq_with(
            interval_secs,
            DEFAULT_SNAPSHOT_SIZE,
            DEFAULT_SNAPSHOT_START,
            DEFAULT_SNAPSHOT_END,
        )
    }

    fn check_snapshot(&mut self, order_time: NaiveDateTime) -> Result<(), EngineError> {
        while self.next_snapshot_idx < self.snapshot_times.len()
            && order_time > self.snapshot_times[self.next_snapshot_idx]
        {
            let snapshot = snapshot::build_snapshot(&self.buy, &self.sell, self.snapshot_size)?;
            let t = self.snapshot_times[self.next_snapshot_idx];
            self.snapshots.push((t, snapshot));
            self.next_snapshot_idx += 1;
        }
        Ok(())
    }

    /// Replays the accumulated order stream through both side books up to
    /// `tlimit` (`"HH:MM"`, within the established session), capturing any
    /// due snapshots along the way.
    ///
    /// Fatal if the stream regresses in `prio_date`: unlike the schedule
    /// and accounting fields, this watermark is actively tracked rather
    /// than inert, so a regression is always caught (spec §8 scenario 5).
    #[instrument(skip(self))]
    pub fn process_orders(&mut self, tlimit: &str) -> Result<(), EngineError> {
        let limit = self.parse_session_time(tlimit, "%H:%M")?;
        self.process_orders_until(limit)
    }

    /// [`process_orders`] using the module default cutoff time.
    pub fn process_orders_default(&mut self) -> Result<(), EngineError> {
        self.process_orders(DEFAULT_TIME_LIMIT)
    }

    /// Replays the accumulated order stream up to an explicit cutoff
    /// timestamp.
    pub fn process_orders_until(&mut self, limit: NaiveDateTime) -> Result<(), EngineError> {
        let orders = self.orders.clone();

        for order in orders {
            if order.prio_date > limit {
                break;
            }

            self.check_snapshot(order.prio_date)?;

            if let Some(last_mod) = self.last_mod {
                if last_mod > order.prio_date {
                    return Err(EngineError::OutOfOrder {
                        last_mod,
                        prio_date: order.prio_date,
                    });
                }
            }

            match order.side {
                Side::Buy => self.buy.process_order(order.clone())?,
                Side::Sell => self.sell.process_order(order.clone())?,
            }

            self.last_mod = Some(order.prio_date);
        }

        Ok(())
    }

    /// The configured price-support ceiling.
    pub fn psup(&self) -> i64 {
        self.psup
    }

    /// The configured tick size.
    pub fn ticksize(&self) -> i64 {
        self.ticksize
    }
}
