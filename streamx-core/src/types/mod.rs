//! Domain types shared by venue connectors.

pub mod balance;
pub mod funding_rate;
pub mod market;
pub mod ohlcv;
pub mod orderbook;
pub mod position;
pub mod trade;

/// Unified symbol, e.g. `BTC/USDT:USDT`.
pub type Symbol = String;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub use balance::{Asset, Balances};
pub use funding_rate::FundingRate;
pub use market::{Category, Market};
pub use ohlcv::{Ohlcv, PairTfKline};
pub use orderbook::{BookSide, OrderBook};
pub use position::{AccountConfig, Position, PositionSide};
pub use trade::{Fee, MyTrade, OrderState, Side, Trade};

#[cfg(test)]
mod proptests {
    use super::BookSide;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn level() -> impl Strategy<Value = (Decimal, Decimal)> {
        (1u32..500, 0u32..5).prop_map(|(p, s)| (Decimal::from(p), Decimal::from(s)))
    }

    proptest! {
        #[test]
        fn prop_side_sorted_positive_and_bounded(
            descending in any::<bool>(),
            depth in 1usize..20,
            batches in prop::collection::vec(prop::collection::vec(level(), 0..30), 1..8),
        ) {
            let mut side = BookSide::new(descending, depth, &[]);
            for batch in &batches {
                side.update(batch);
            }
            let levels = side.to_vec();
            prop_assert!(levels.len() <= depth);
            prop_assert!(levels.iter().all(|(_, s)| *s > Decimal::ZERO));
            for pair in levels.windows(2) {
                if descending {
                    prop_assert!(pair[0].0 > pair[1].0);
                } else {
                    prop_assert!(pair[0].0 < pair[1].0);
                }
            }
        }
    }
}
