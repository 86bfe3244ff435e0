//! Pure computation over a frozen view of both side books: crossed-book
//! cleaning, the effective-price curve, and the assembled snapshot record
//! (spec §4.3).

use super::error::EngineError;
use super::side_book::SideBook;
use super::types::Side;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One side's contribution to a [`Snapshot`]: the marginal and effective
/// price curves derived from consuming liquidity inward from the best
/// price, plus the session totals carried through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideSnapshot {
    /// Best price on this side after crossed-book cleaning.
    pub best_price: i64,
    /// Running average price of the first `k+1` units consumed.
    pub eff_prices: Vec<f64>,
    /// Price paid for the `k`-th marginal unit.
    pub marg_prices: Vec<i64>,
    /// `eff_prices` relative to `best_price`, signed positive = adverse.
    pub eff_price_impact: Vec<f64>,
    /// `marg_prices` relative to `best_price`, signed positive = adverse.
    pub marg_price_impact: Vec<i64>,
    /// `1..=total_size`, parallel to `marg_prices`/`eff_prices`.
    pub quantity: Vec<i64>,
    /// Cleaned, non-empty `(liquidity, price)` buckets, best price first
    /// (the same order `prices`/`liq` were walked in).
    pub book: Vec<(i64, i64)>,
    /// Raw, pre-cleaning non-empty `(liquidity, price)` buckets, ascending.
    pub orig_book: Vec<(i64, i64)>,
    /// Session-total lots executed with `condition == 1` (pre-cleaning).
    pub cum_mos: i64,
    /// Session-total lots executed (pre-cleaning).
    pub cum_trades: i64,
}

/// A point-in-time analytical snapshot of the reconstructed book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// `best_sell - best_buy`, possibly negative.
    pub bas: i64,
    /// `(best_sell + best_buy) / 2`.
    pub mid_price: f64,
    /// `buy.cum_mos - sell.cum_mos`.
    pub cum_mos_net: i64,
    /// `buy.cum_mos + sell.cum_mos`.
    pub cum_mos_abs: i64,
    /// The buy side's curve.
    pub buy_snapshot: SideSnapshot,
    /// The sell side's curve.
    pub sell_snapshot: SideSnapshot,
}

impl Snapshot {
    /// Renders this snapshot as human-readable JSON, for research tooling
    /// that consumes snapshots outside of Rust (spec §1: "suitable for
    /// market-microstructure research").
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a snapshot previously produced by [`Snapshot::to_json`].
    pub fn from_json(data: &str) -> Result<Snapshot, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Resolves residual crossed liquidity (`bp[0] >= sp[0]`) by repeatedly
/// trading off the head of each queue until the book is no longer crossed
/// or one side runs dry. Mutates only the local copies passed in — the
/// underlying side books are never touched (spec §4.3 step 2).
fn clean_liquidity(bp: &mut Vec<i64>, bl: &mut Vec<i64>, sp: &mut Vec<i64>, sl: &mut Vec<i64>) {
    while !bp.is_empty() && !sp.is_empty() && bp[0] >= sp[0] {
        let trade = bl[0].min(sl[0]);
        bl[0] -= trade;
        sl[0] -= trade;

        if bl[0] == 0 {
            bp.remove(0);
            bl.remove(0);
        }
        if sl[0] == 0 {
            sp.remove(0);
            sl.remove(0);
        }
    }
}

fn build_side_snapshot(
    prices: &[i64],
    liq: &[i64],
    side: Side,
    max_size: usize,
) -> Result<SideSnapshot, EngineError> {
    if prices.is_empty() {
        return Err(EngineError::EmptyBook { side });
    }

    let total_liquidity: i64 = liq.iter().sum();
    let total = max_size.min(total_liquidity.max(0) as usize);

    let mut marg_prices = Vec::with_capacity(total);
    let mut filled = 0usize;
    for (&price, &qty) in prices.iter().zip(liq.iter()) {
        if filled >= total {
            break;
        }
        let take = (total - filled).min(qty.max(0) as usize);
        marg_prices.extend(std::iter::repeat(price).take(take));
        filled += take;
    }

    let quantity: Vec<i64> = (1..=total as i64).collect();

    let mut eff_prices = Vec::with_capacity(total);
    let mut running_sum: i64 = 0;
    for (k, &price) in marg_prices.iter().enumerate() {
        running_sum += price;
        eff_prices.push(running_sum as f64 / (k + 1) as f64);
    }

    let best_price = prices[0];

    let (marg_price_impact, eff_price_impact) = match side {
        Side::Buy => (
            marg_prices.iter().map(|p| p - best_price).collect::<Vec<_>>(),
            eff_prices.iter().map(|p| p - best_price as f64).collect::<Vec<_>>(),
        ),
        Side::Sell => (
            marg_prices.iter().map(|p| best_price - p).collect::<Vec<_>>(),
            eff_prices.iter().map(|p| best_price as f64 - p).collect::<Vec<_>>(),
        ),
    };

    // walked in best-first order; buy's walk descends from the best price,
    // so it is reversed here to read low-to-high like the sell side does
    // already (spec §4.3 step 3: "buy side reversed").
    let book: Vec<(i64, i64)> = match side {
        Side::Buy => liq.iter().copied().zip(prices.iter().copied()).rev().collect(),
        Side::Sell => liq.iter().copied().zip(prices.iter().copied()).collect(),
    };

    Ok(SideSnapshot {
        best_price,
        eff_prices,
        marg_prices,
        eff_price_impact,
        marg_price_impact,
        quantity,
        book,
        orig_book: Vec::new(),
        cum_mos: 0,
        cum_trades: 0,
    })
}

/// Builds one [`Snapshot`] from the current state of both side books.
///
/// Fatal if either side has no resting liquidity, either before cleaning
/// (an empty book can't report a best price) or after cleaning consumes a
/// side entirely (spec §8 scenario 2: "cleaned buy_prices=[2510], sell
/// empty → further snapshot requests on sell fail").
pub fn build_snapshot(
    buy: &SideBook,
    sell: &SideBook,
    snapshot_size: usize,
) -> Result<Snapshot, EngineError> {
    let (mut bp, mut bl) = buy.get_liquidity()?;
    let (mut sp, mut sl) = sell.get_liquidity()?;

    clean_liquidity(&mut bp, &mut bl, &mut sp, &mut sl);

    let mut buy_snapshot = build_side_snapshot(&bp, &bl, Side::Buy, snapshot_size)?;
    let mut sell_snapshot = build_side_snapshot(&sp, &sl, Side::Sell, snapshot_size)?;

    buy_snapshot.orig_book = buy.raw_nonempty_buckets();
    sell_snapshot.orig_book = sell.raw_nonempty_buckets();
    buy_snapshot.cum_mos = buy.cum_mos();
    buy_snapshot.cum_trades = buy.cum_trades();
    sell_snapshot.cum_mos = sell.cum_mos();
    sell_snapshot.cum_trades = sell.cum_trades();

    let best_buy = buy_snapshot.best_price;
    let best_sell = sell_snapshot.best_price;
    let bas = best_sell - best_buy;
    let mid_price = (best_sell + best_buy) as f64 / 2.0;
    let cum_mos_net = buy_snapshot.cum_mos - sell_snapshot.cum_mos;
    let cum_mos_abs = buy_snapshot.cum_mos + sell_snapshot.cum_mos;

    debug!(bas, mid_price, "snapshot captured");

    Ok(Snapshot {
        bas,
        mid_price,
        cum_mos_net,
        cum_mos_abs,
        buy_snapshot,
        sell_snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{EventKind, Order, OrderState, Side as S};
    use chrono::NaiveDate;

    fn order(seq: u64, side: S, price: i64, size: i64) -> Order {
        Order {
            prio_date: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, seq as u32)
                .unwrap(),
            session_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            seq,
            gen_id: 0,
            side,
            event: EventKind::New,
            state: OrderState::New,
            condition: 0,
            price,
            size,
            executed: 0,
        }
    }

    #[test]
    fn crossed_book_cleans_to_spec_scenario_2() {
        let mut buy = SideBook::new(12000, 1, S::Buy);
        let mut sell = SideBook::new(12000, 1, S::Sell);

        buy.process_order(order(1, S::Buy, 2510, 2)).unwrap();
        sell.process_order(order(2, S::Sell, 2500, 1)).unwrap();

        let err = build_snapshot(&buy, &sell, 10).unwrap_err();
        assert!(matches!(err, EngineError::EmptyBook { side: S::Sell }));
    }

    #[test]
    fn snapshot_size_caps_total_and_curve_length() {
        let mut buy = SideBook::new(12000, 1, S::Buy);
        let mut sell = SideBook::new(12000, 1, S::Sell);

        buy.process_order(order(1, S::Buy, 2500, 20)).unwrap();
        sell.process_order(order(2, S::Sell, 2600, 20)).unwrap();

        let snap = build_snapshot(&buy, &sell, 10).unwrap();
        assert_eq!(snap.buy_snapshot.eff_prices.len(), 10);
        assert_eq!(snap.sell_snapshot.eff_prices.len(), 10);
        assert_eq!(snap.buy_snapshot.quantity, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn effective_price_is_running_mean_of_marginal_prices() {
        let mut buy = SideBook::new(12000, 1, S::Buy);
        let mut sell = SideBook::new(12000, 1, S::Sell);

        buy.process_order(order(1, S::Buy, 2500, 2)).unwrap();
        buy.process_order(order(2, S::Buy, 2490, 3)).unwrap();
        sell.process_order(order(3, S::Sell, 2600, 5)).unwrap();

        let snap = build_snapshot(&buy, &sell, 100).unwrap();
        let marg = &snap.buy_snapshot.marg_prices;
        for (k, eff) in snap.buy_snapshot.eff_prices.iter().enumerate() {
            let mean: f64 = marg[..=k].iter().sum::<i64>() as f64 / (k + 1) as f64;
            assert!((mean - eff).abs() < 1e-9);
        }
        // buy side is non-increasing as we walk away from the best price
        assert!(marg.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn top_level_fields_match_spec_scenario_1() {
        let mut buy = SideBook::new(12000, 1, S::Buy);
        let mut sell = SideBook::new(12000, 1, S::Sell);

        buy.process_order(order(1, S::Buy, 2500, 3)).unwrap();
        sell.process_order(order(2, S::Sell, 2600, 4)).unwrap();

        let snap = build_snapshot(&buy, &sell, 100).unwrap();
        assert_eq!(snap.bas, 100);
        assert_eq!(snap.mid_price, 2550.0);
        assert_eq!(snap.cum_mos_net, 0);
        assert_eq!(snap.cum_mos_abs, 0);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut buy = SideBook::new(12000, 1, S::Buy);
        let mut sell = SideBook::new(12000, 1, S::Sell);

        buy.process_order(order(1, S::Buy, 2500, 3)).unwrap();
        sell.process_order(order(2, S::Sell, 2600, 4)).unwrap();

        let snap = build_snapshot(&buy, &sell, 100).unwrap();
        let json = snap.to_json().unwrap();
        let restored = Snapshot::from_json(&json).unwrap();

        assert_eq!(restored.bas, snap.bas);
        assert_eq!(restored.buy_snapshot.marg_prices, snap.buy_snapshot.marg_prices);
    }
}
