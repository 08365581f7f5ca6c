use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A price quote from the market oracle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Quote {
    /// Unit price for the requested quantity and direction.
    pub price: f64,
    /// Global base price the quote was derived from.
    pub base: f64,
    /// Market stock at quote time, when the oracle tracks one (0 otherwise).
    pub stock_before: i64,
}

/// Pricing oracle supplied by the hosting game. The engine treats quotes as
/// authoritative and never second-guesses the formula behind them.
pub trait MarketOracle {
    /// `None` when the resource has no market listing.
    fn quote(&self, resource: &str, qty: i64, side: TradeSide) -> Option<Quote>;
}

/// Reference oracle: base price plus a symmetric spread (buys cost
/// `base * (1 + spread)`, sells fetch `base * (1 - spread)`).
#[derive(Debug, Clone, Default)]
pub struct BaseMarket {
    prices: BTreeMap<String, f64>,
    spread: f64,
}

impl BaseMarket {
    pub fn new(prices: BTreeMap<String, f64>) -> Self {
        Self {
            prices,
            spread: 0.0,
        }
    }

    pub fn with_spread(mut self, spread: f64) -> Self {
        self.spread = spread;
        self
    }
}

impl MarketOracle for BaseMarket {
    fn quote(&self, resource: &str, _qty: i64, side: TradeSide) -> Option<Quote> {
        let base = self.prices.get(resource).copied()?;
        let price = match side {
            TradeSide::Buy => base * (1.0 + self.spread),
            TradeSide::Sell => base * (1.0 - self.spread),
        };
        Some(Quote {
            price,
            base,
            stock_before: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_resource_has_no_quote() {
        let market = BaseMarket::new(BTreeMap::new());
        assert!(market.quote("wood", 10, TradeSide::Buy).is_none());
    }

    #[test]
    fn spread_is_directional() {
        let market =
            BaseMarket::new(BTreeMap::from([("wood".to_string(), 2.0)])).with_spread(0.1);
        let buy = market.quote("wood", 10, TradeSide::Buy).unwrap();
        let sell = market.quote("wood", 10, TradeSide::Sell).unwrap();
        assert!((buy.price - 2.2).abs() < 1e-9);
        assert!((sell.price - 1.8).abs() < 1e-9);
        assert!((buy.base - 2.0).abs() < 1e-9);
    }
}
