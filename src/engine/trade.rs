use std::cmp::Ordering;

use serde::Serialize;

use crate::model::Snapshot;

use super::TickOptions;

/// Target gold value of stock below which a city wants to buy.
const BUY_THRESHOLD_GOLD: f64 = 200.0;
/// Gold value of stock above which the surplus is offered for sale.
const SELL_THRESHOLD_GOLD: f64 = 600.0;

/// Unit threshold below which a resource counts as scarce: the same gold
/// value buys fewer units of an expensive good, so thresholds scale with
/// the inverse of the base price.
pub fn buy_threshold(base_price: f64) -> i64 {
    ((BUY_THRESHOLD_GOLD / base_price).round() as i64).max(1)
}

/// Unit threshold above which stock counts as surplus. Always strictly
/// above the buy threshold so a city never buys and sells the same good.
pub fn sell_threshold(base_price: f64) -> i64 {
    ((SELL_THRESHOLD_GOLD / base_price).round() as i64).max(buy_threshold(base_price) + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeAction {
    pub kind: TradeKind,
    pub resource: String,
    pub qty: i64,
    /// Gold value of the move, used only for ranking.
    pub score: f64,
}

/// Rank the trades a city wants this tick: buy up to the scarcity line,
/// sell down to the surplus line, biggest gold value first. The currency
/// itself is never traded. Pure function of the snapshot; planning twice
/// over the same snapshot yields the same plan.
pub fn plan_trades(snapshot: &Snapshot, currency: &str, opts: &TickOptions) -> Vec<TradeAction> {
    let mut actions = Vec::new();
    for (resource, &base) in &snapshot.base_prices {
        if resource == currency || base <= 0.0 {
            continue;
        }
        let stock = snapshot.amount(resource);
        let buy_at = buy_threshold(base);
        let sell_at = sell_threshold(base);
        if stock < buy_at {
            let qty = (buy_at - stock).min(opts.max_trade_qty);
            actions.push(TradeAction {
                kind: TradeKind::Buy,
                resource: resource.clone(),
                qty,
                score: qty as f64 * base,
            });
        } else if stock > sell_at {
            let qty = (stock - sell_at).min(opts.max_trade_qty);
            actions.push(TradeAction {
                kind: TradeKind::Sell,
                resource: resource.clone(),
                qty,
                score: qty as f64 * base,
            });
        }
    }
    actions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    actions.truncate(opts.max_trades_per_tick);
    actions
}
