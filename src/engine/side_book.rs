//! One side of the book: the aggregate price-indexed liquidity vector plus
//! the live-order database, and the event interpreter that mutates both
//! (spec §3, §4.1).

use super::error::{AnomalyTag, EngineError};
use super::types::{DBOrder, EventKind, Order, Side};
use std::collections::HashMap;
use tracing::{trace, warn};

/// One side (buy or sell) of a single-symbol limit order book.
///
/// `book[i]` holds the aggregate outstanding lots of every live order whose
/// price maps to bucket `i`. `db` holds the last-known state of every live
/// order, keyed by its exchange-assigned `seq`.
#[derive(Debug, Clone)]
pub struct SideBook {
    side: Side,
    ticksize: i64,
    psup: i64,
    book: Vec<i64>,
    db: HashMap<u64, DBOrder>,
    cum_trades: i64,
    cum_mos: i64,
    debug: Vec<(AnomalyTag, Order)>,
}

impl SideBook {
    /// Creates an empty side book.
    ///
    /// `booksize = ceil(psup / ticksize)`; the book vector is sized to
    /// cover every representable bucket up front (spec §9: dense vector).
    pub fn new(psup: i64, ticksize: i64, side: Side) -> SideBook {
        let booksize = psup.div_ceil(ticksize).max(0) as usize;
        SideBook {
            side,
            ticksize,
            psup,
            book: vec![0; booksize],
            db: HashMap::new(),
            cum_trades: 0,
            cum_mos: 0,
            debug: Vec::new(),
        }
    }

    /// The configured side.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of price buckets in the aggregate vector.
    pub fn booksize(&self) -> usize {
        self.book.len()
    }

    /// Total lots executed against this side since session start.
    pub fn cum_trades(&self) -> i64 {
        self.cum_trades
    }

    /// Total lots executed against this side with `condition == 1`.
    pub fn cum_mos(&self) -> i64 {
        self.cum_mos
    }

    /// The append-only anomaly log, paired with the offending event.
    pub fn debug(&self) -> &[(AnomalyTag, Order)] {
        &self.debug
    }

    /// Aggregate outstanding lots at bucket `index`, or `0` if out of range.
    pub fn book_at(&self, index: usize) -> i64 {
        self.book.get(index).copied().unwrap_or(0)
    }

    /// The number of live orders currently tracked on this side.
    pub fn live_order_count(&self) -> usize {
        self.db.len()
    }

    /// Looks up the materialized state of a live order.
    pub fn get(&self, seq: u64) -> Option<&DBOrder> {
        self.db.get(&seq)
    }

    /// `index(price) = floor(price / ticksize)`.
    pub fn index(&self, price: i64) -> usize {
        (price.div_euclid(self.ticksize)) as usize
    }

    /// `price(index) = index * ticksize`.
    pub fn price_at(&self, index: usize) -> i64 {
        index as i64 * self.ticksize
    }

    fn add_debug(&mut self, tag: AnomalyTag, order: Order) {
        warn!(tag = %tag, seq = order.seq, side = %self.side, "non-fatal book anomaly");
        self.debug.push((tag, order));
    }

    /// Adds an order to the database and to the aggregate book.
    ///
    /// No-ops (after logging) when the sell side sees a zero price or any
    /// price at or above `psup` — such orders cannot be indexed and are
    /// dropped rather than rejecting the whole stream (spec §7 non-fatal).
    fn add(&mut self, order: Order) {
        if self.side == Side::Sell && order.price == 0 {
            self.add_debug(AnomalyTag::SellPriceZero, order);
            return;
        }
        if order.price >= self.psup {
            self.add_debug(AnomalyTag::PriceAbovePsup, order);
            return;
        }

        let dborder = DBOrder::from(&order);
        let idx = self.index(dborder.price);
        self.book[idx] += dborder.outstanding();
        trace!(seq = order.seq, price = order.price, side = %self.side, "order added");
        self.db.insert(order.seq, dborder);
    }

    /// Removes a live order from the database and the aggregate book.
    ///
    /// Fatal if the bucket does not hold at least the order's outstanding
    /// quantity: that desynchronization means the book vector and the
    /// order database have drifted apart and reconstruction can no longer
    /// be trusted (spec §7).
    fn remove(&mut self, seq: u64) -> Result<(), EngineError> {
        let dborder = *self.db.get(&seq).ok_or(EngineError::MissingLiveOrder {
            seq,
            side: self.side,
        })?;
        let idx = self.index(dborder.price);
        let outstanding = dborder.outstanding();

        if self.book[idx] < outstanding {
            return Err(EngineError::NegativeBookBucket {
                seq,
                side: self.side,
                price: self.price_at(idx),
                book_qty: self.book[idx],
                outstanding,
            });
        }

        self.book[idx] -= outstanding;
        self.db.remove(&seq);
        trace!(seq, side = %self.side, "order removed");
        Ok(())
    }

    fn process_new(&mut self, order: Order) -> Result<(), EngineError> {
        if self.db.contains_key(&order.seq) {
            self.remove(order.seq)?;
            // the removed entry's original event is gone; log against the
            // incoming `new` so the anomaly is still attributable.
            self.add_debug(AnomalyTag::NewOrderInDb, order.clone());
        }
        if order.executed != 0 {
            self.add_debug(AnomalyTag::NewOrderWithExecuted, order.clone());
        }
        self.add(order);
        Ok(())
    }

    fn process_update(&mut self, order: Order) -> Result<(), EngineError> {
        match self.db.get(&order.seq) {
            None => {
                self.add_debug(AnomalyTag::UpdateNotInDb, order.clone());
                self.add(order);
                Ok(())
            }
            Some(existing) => {
                if existing.executed != order.executed {
                    self.add_debug(AnomalyTag::ExecutedChangedInUpdate, order.clone());
                }
                self.remove(order.seq)?;
                self.add(order);
                Ok(())
            }
        }
    }

    fn process_cancel(&mut self, order: Order) -> Result<(), EngineError> {
        if !self.db.contains_key(&order.seq) {
            self.add_debug(AnomalyTag::CancelNotInDb, order);
            return Ok(());
        }
        self.remove(order.seq)
    }

    fn update_cum_trades(&mut self, order: &Order) {
        let db_executed = self.db.get(&order.seq).map(|d| d.executed).unwrap_or(0);
        let delta = order.executed - db_executed;
        self.cum_trades += delta;
        if order.condition == 1 {
            self.cum_mos += delta;
        }
    }

    fn process_trade(&mut self, order: Order) -> Result<(), EngineError> {
        self.update_cum_trades(&order);

        match self.db.get(&order.seq) {
            None => {
                self.add_debug(AnomalyTag::TradeNotInDb, order.clone());
                self.add(order);
                Ok(())
            }
            Some(existing) => {
                if existing.size != order.size {
                    self.add_debug(AnomalyTag::SizeChangeInTrade, order.clone());
                }
                if existing.price != order.price {
                    self.add_debug(AnomalyTag::PriceChangeInTrade, order.clone());
                }
                self.remove(order.seq)?;
                self.add(order);
                Ok(())
            }
        }
    }

    /// Applies a single event to this side's book.
    ///
    /// Asserts `executed <= size` before any dispatch (fatal if violated),
    /// then routes to the per-event behavior described in spec §4.1.
    pub fn process_order(&mut self, order: Order) -> Result<(), EngineError> {
        if order.executed > order.size {
            return Err(EngineError::ExecutedExceedsSize {
                seq: order.seq,
                size: order.size,
                executed: order.executed,
            });
        }

        match order.event {
            EventKind::New => self.process_new(order),
            EventKind::Update => self.process_update(order),
            EventKind::Cancel | EventKind::Expire => self.process_cancel(order),
            EventKind::Trade => self.process_trade(order),
            EventKind::Reentry => {
                trace!(seq = order.seq, side = %self.side, "reentry no-op");
                Ok(())
            }
            EventKind::NewStop
            | EventKind::Reject
            | EventKind::Removed
            | EventKind::Stopped
            | EventKind::Unknown(_) => {
                self.add_debug(AnomalyTag::UnknownEvent, order);
                Ok(())
            }
        }
    }

    /// The best-price bucket index: highest non-empty bucket for buy,
    /// lowest non-empty bucket for sell.
    ///
    /// Fatal if no bucket holds outstanding liquidity.
    pub fn get_best_price_index(&self) -> Result<usize, EngineError> {
        let found = match self.side {
            Side::Buy => self.book.iter().rposition(|&qty| qty > 0),
            Side::Sell => self.book.iter().position(|&qty| qty > 0),
        };
        found.ok_or(EngineError::EmptyBook { side: self.side })
    }

    /// Walks the book inward from the best price, returning parallel
    /// `(prices, liquidity)` vectors over non-empty buckets only, best
    /// price first.
    ///
    /// The buy-side walk stops strictly before bucket `0` rather than
    /// including it — preserved verbatim from the original implementation
    /// per spec §9's open question, whether intentional filter or off-by-one
    /// is left unresolved upstream, but the behavior is not ours to change.
    pub fn get_liquidity(&self) -> Result<(Vec<i64>, Vec<i64>), EngineError> {
        let best_idx = self.get_best_price_index()?;

        let mut prices = Vec::new();
        let mut liq = Vec::new();

        match self.side {
            Side::Buy => {
                let mut idx = best_idx;
                while idx >= 1 {
                    if self.book[idx] > 0 {
                        prices.push(self.price_at(idx));
                        liq.push(self.book[idx]);
                    }
                    idx -= 1;
                }
            }
            Side::Sell => {
                for idx in best_idx..self.book.len() {
                    if self.book[idx] > 0 {
                        prices.push(self.price_at(idx));
                        liq.push(self.book[idx]);
                    }
                }
            }
        }

        if prices.is_empty() {
            return Err(EngineError::EmptyBook { side: self.side });
        }

        Ok((prices, liq))
    }

    /// All non-empty buckets in ascending price order, as `(liquidity,
    /// price)` pairs — the snapshot's raw, pre-cleaning `orig_book`.
    pub fn raw_nonempty_buckets(&self) -> Vec<(i64, i64)> {
        self.book
            .iter()
            .enumerate()
            .filter(|(_, &qty)| qty != 0)
            .map(|(idx, &qty)| (qty, self.price_at(idx)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(seconds: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, seconds)
            .unwrap()
    }

    fn order(seq: u64, side: Side, event: EventKind, price: i64, size: i64, executed: i64) -> Order {
        Order {
            prio_date: dt(seq as u32),
            session_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            seq,
            gen_id: 0,
            side,
            event,
            state: crate::engine::types::OrderState::New,
            condition: 0,
            price,
            size,
            executed,
        }
    }

    #[test]
    fn single_buy_new_populates_book_and_db() {
        let mut book = SideBook::new(12000, 1, Side::Buy);
        book.process_order(order(1, Side::Buy, EventKind::New, 2500, 3, 0))
            .unwrap();

        assert_eq!(book.book_at(2500), 3);
        let db = book.get(1).unwrap();
        assert_eq!((db.size, db.executed, db.price, db.side), (3, 0, 2500, Side::Buy));
    }

    #[test]
    fn trade_accounting_matches_spec_scenario_3() {
        let mut book = SideBook::new(12000, 1, Side::Buy);
        book.process_order(order(1, Side::Buy, EventKind::New, 2500, 5, 0))
            .unwrap();

        let mut trade = order(1, Side::Buy, EventKind::Trade, 2500, 5, 2);
        trade.condition = 1;
        book.process_order(trade).unwrap();

        assert_eq!(book.book_at(2500), 3);
        assert_eq!(book.get(1).unwrap().executed, 2);
        assert_eq!(book.cum_trades(), 2);
        assert_eq!(book.cum_mos(), 2);
    }

    #[test]
    fn self_healing_update_on_unknown_seq() {
        let mut book = SideBook::new(12000, 1, Side::Sell);
        book.process_order(order(9, Side::Sell, EventKind::Update, 2600, 4, 0))
            .unwrap();

        assert_eq!(book.book_at(2600), 4);
        assert_eq!(book.debug().len(), 1);
        assert_eq!(book.debug()[0].0, AnomalyTag::UpdateNotInDb);
    }

    #[test]
    fn new_then_cancel_restores_prior_state() {
        let mut book = SideBook::new(12000, 1, Side::Buy);
        let before = book.clone_book_vector_for_test();

        book.process_order(order(1, Side::Buy, EventKind::New, 2500, 3, 0))
            .unwrap();
        book.process_order(order(1, Side::Buy, EventKind::Cancel, 2500, 3, 0))
            .unwrap();

        assert_eq!(book.clone_book_vector_for_test(), before);
        assert_eq!(book.live_order_count(), 0);
    }

    #[test]
    fn price_at_psup_minus_ticksize_is_accepted_price_at_psup_is_dropped() {
        let mut book = SideBook::new(12000, 1, Side::Buy);
        book.process_order(order(1, Side::Buy, EventKind::New, 11999, 1, 0))
            .unwrap();
        assert_eq!(book.book_at(11999), 1);

        book.process_order(order(2, Side::Buy, EventKind::New, 12000, 1, 0))
            .unwrap();
        assert_eq!(book.debug().last().unwrap().0, AnomalyTag::PriceAbovePsup);
        assert_eq!(book.live_order_count(), 1);
    }

    #[test]
    fn sell_at_zero_price_is_dropped() {
        let mut book = SideBook::new(12000, 1, Side::Sell);
        book.process_order(order(1, Side::Sell, EventKind::New, 0, 1, 0))
            .unwrap();
        assert_eq!(book.live_order_count(), 0);
        assert_eq!(book.debug()[0].0, AnomalyTag::SellPriceZero);
    }

    #[test]
    fn executed_exceeding_size_is_fatal() {
        let mut book = SideBook::new(12000, 1, Side::Buy);
        let bad = order(1, Side::Buy, EventKind::New, 2500, 3, 5);
        let err = book.process_order(bad).unwrap_err();
        assert!(matches!(err, EngineError::ExecutedExceedsSize { .. }));
    }

    #[test]
    fn get_liquidity_excludes_bucket_zero_on_buy_side() {
        let mut book = SideBook::new(12000, 1, Side::Buy);
        book.process_order(order(1, Side::Buy, EventKind::New, 0, 5, 0))
            .unwrap();

        // the only liquidity sits at bucket 0; the preserved walk excludes it
        assert!(matches!(
            book.get_liquidity(),
            Err(EngineError::EmptyBook { side: Side::Buy })
        ));
    }

    impl SideBook {
        fn clone_book_vector_for_test(&self) -> Vec<i64> {
            self.book.clone()
        }
    }
}
