#![cfg(feature = "sqlite")]
//! Trade lifecycle tests, run against the in-memory mock and a real SQLite store.

mod common;

use common::*;
use fxledger::adapters::sqlite_adapter::SqliteAdapter;
use fxledger::domain::currency::{Currency, RateQuote};
use fxledger::domain::error::LedgerError;
use fxledger::domain::ledger::{self, BuyOrder};
use fxledger::domain::trade::{Settlement, Trade, TradeId};
use fxledger::ports::ledger_port::LedgerPort;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn stores() -> Vec<(&'static str, Box<dyn LedgerPort>)> {
    vec![
        ("mock", Box::new(MockLedgerPort::new())),
        ("sqlite", Box::new(SqliteAdapter::in_memory().unwrap())),
    ]
}

fn buy(store: &dyn LedgerPort, currency: &str, amount: Decimal, display_rate: Decimal) -> Trade {
    let order = BuyOrder::new(
        Some(currency),
        Some(amount),
        Some(RateQuote::Display(display_rate)),
        None,
    )
    .unwrap();
    ledger::open_trade(store, order, at(2024, 5, 1, 9, 0)).unwrap()
}

fn buy_at(store: &dyn LedgerPort, currency: &str, minute: u32) -> TradeId {
    let order = BuyOrder::new(
        Some(currency),
        Some(dec!(100)),
        Some(RateQuote::Display(dec!(1300))),
        None,
    )
    .unwrap();
    ledger::open_trade(store, order, at(2024, 5, 1, 9, minute))
        .unwrap()
        .id
}

fn sell(store: &dyn LedgerPort, id: TradeId, display_rate: Decimal) -> Result<Settlement, LedgerError> {
    ledger::close_trade(
        store,
        id,
        Some(RateQuote::Display(display_rate)),
        date(2024, 6, 1),
    )
}

mod open_and_close {
    use super::*;

    #[test]
    fn usd_round_trip_profit() {
        for (name, store) in stores() {
            let trade = buy(&*store, "USD", dec!(100), dec!(1300));
            assert_eq!(trade.buy_local, dec!(130000), "{name}");

            let settlement = sell(&*store, trade.id, dec!(1350)).unwrap();
            assert_eq!(settlement.sell_local, dec!(135000), "{name}");
            assert_eq!(settlement.profit, dec!(5000), "{name}");

            let stored = store.get(trade.id).unwrap().unwrap();
            assert!(!stored.is_open(), "{name}");
            assert_eq!(stored.settlement(), Some(&settlement), "{name}");
        }
    }

    #[test]
    fn jpy_rates_are_stored_per_yen() {
        for (name, store) in stores() {
            let trade = buy(&*store, "JPY", dec!(10000), dec!(0.95));
            let stored = store.get(trade.id).unwrap().unwrap();
            assert_eq!(stored.buy_rate, dec!(0.0095), "{name}");
            assert_eq!(stored.buy_local, dec!(95), "{name}");
            assert_eq!(stored.display_buy_rate(), dec!(0.95), "{name}");

            let settlement = sell(&*store, trade.id, dec!(1.00)).unwrap();
            assert_eq!(settlement.sell_rate, dec!(0.01), "{name}");
            assert_eq!(settlement.sell_local, dec!(100), "{name}");
            assert_eq!(settlement.profit, dec!(5), "{name}");

            let stored = store.get(trade.id).unwrap().unwrap();
            assert_eq!(stored.display_sell_rate(), Some(dec!(1)), "{name}");
        }
    }

    #[test]
    fn amounts_near_decimal_limit() {
        for (name, store) in stores() {
            let order = BuyOrder::new(
                Some("USD"),
                Some(dec!(100000000000000000000)),
                Some(RateQuote::Display(dec!(10000000000))),
                None,
            )
            .unwrap();
            let err = ledger::open_trade(&*store, order, at(2024, 5, 1, 9, 0)).unwrap_err();
            assert!(matches!(err, LedgerError::Validation { .. }), "{name}: {err:?}");
            assert!(store.list(None).unwrap().is_empty(), "{name}");

            let trade = buy(&*store, "USD", dec!(100000000000000000000), dec!(1));
            let err = sell(&*store, trade.id, dec!(10000000000)).unwrap_err();
            assert!(matches!(err, LedgerError::Validation { .. }), "{name}: {err:?}");
            assert!(store.get(trade.id).unwrap().unwrap().is_open(), "{name}");

            let settlement = sell(&*store, trade.id, dec!(2)).unwrap();
            assert_eq!(settlement.profit, dec!(100000000000000000000), "{name}");
            let stored = store.get(trade.id).unwrap().unwrap();
            assert_eq!(stored.settlement(), Some(&settlement), "{name}");
        }
    }

    #[test]
    fn loss_is_negative_profit() {
        for (name, store) in stores() {
            let trade = buy(&*store, "EUR", dec!(50), dec!(1450.5));
            let settlement = sell(&*store, trade.id, dec!(1400)).unwrap();
            assert_eq!(settlement.profit, dec!(-2525), "{name}");
        }
    }

    #[test]
    fn buy_date_and_memo_come_from_order() {
        for (name, store) in stores() {
            let order = BuyOrder::new(
                Some("usd"),
                Some(dec!(10)),
                Some(RateQuote::Display(dec!(1300))),
                Some("  summer trip ".into()),
            )
            .unwrap();
            let trade = ledger::open_trade(&*store, order, at(2024, 7, 2, 23, 59)).unwrap();
            let stored = store.get(trade.id).unwrap().unwrap();
            assert_eq!(stored.buy_date, date(2024, 7, 2), "{name}");
            assert_eq!(stored.memo.as_deref(), Some("summer trip"), "{name}");
            assert_eq!(stored.currency, Currency::Usd, "{name}");
        }
    }

    #[test]
    fn invalid_order_inserts_nothing() {
        let store = MockLedgerPort::new();
        let result = BuyOrder::new(
            Some("USD"),
            Some(dec!(0)),
            Some(RateQuote::Display(dec!(1300))),
            None,
        );
        assert!(matches!(result, Err(LedgerError::Validation { .. })));
        assert_eq!(store.len(), 0);
    }
}

mod close_errors {
    use super::*;

    #[test]
    fn second_close_is_already_closed_and_keeps_first_settlement() {
        for (name, store) in stores() {
            let trade = buy(&*store, "USD", dec!(100), dec!(1300));
            let first = sell(&*store, trade.id, dec!(1350)).unwrap();

            match sell(&*store, trade.id, dec!(1400)) {
                Err(LedgerError::AlreadyClosed { id }) => assert_eq!(id, trade.id, "{name}"),
                other => panic!("{name}: expected AlreadyClosed, got {other:?}"),
            }

            let stored = store.get(trade.id).unwrap().unwrap();
            assert_eq!(stored.settlement(), Some(&first), "{name}");
        }
    }

    #[test]
    fn missing_trade_is_not_found() {
        for (name, store) in stores() {
            assert!(
                matches!(sell(&*store, 999, dec!(1300)), Err(LedgerError::NotFound { id: 999 })),
                "{name}"
            );
        }
    }

    #[test]
    fn rate_is_checked_before_lookup() {
        for (name, store) in stores() {
            let missing_rate = ledger::close_trade(&*store, 999, None, date(2024, 6, 1));
            assert!(
                matches!(missing_rate, Err(LedgerError::Validation { .. })),
                "{name}"
            );
            assert!(
                matches!(sell(&*store, 999, dec!(0)), Err(LedgerError::Validation { .. })),
                "{name}"
            );
            assert!(
                matches!(sell(&*store, 999, dec!(-1)), Err(LedgerError::Validation { .. })),
                "{name}"
            );
        }
    }

    /// Reports the trade as open but loses the conditional update.
    struct LosingRace(MockLedgerPort);

    impl LedgerPort for LosingRace {
        fn insert(&self, trade: &fxledger::domain::trade::NewTrade) -> Result<TradeId, LedgerError> {
            self.0.insert(trade)
        }
        fn get(&self, id: TradeId) -> Result<Option<Trade>, LedgerError> {
            self.0.get(id)
        }
        fn close(&self, id: TradeId, settlement: &Settlement) -> Result<usize, LedgerError> {
            self.0.close(id, settlement)?;
            Ok(0)
        }
        fn delete(&self, id: TradeId) -> Result<usize, LedgerError> {
            self.0.delete(id)
        }
        fn list(&self, currency: Option<Currency>) -> Result<Vec<Trade>, LedgerError> {
            self.0.list(currency)
        }
    }

    #[test]
    fn lost_conditional_update_is_already_closed() {
        let store = LosingRace(MockLedgerPort::new());
        let trade = buy(&store, "USD", dec!(1), dec!(1300));
        assert!(matches!(
            sell(&store, trade.id, dec!(1350)),
            Err(LedgerError::AlreadyClosed { .. })
        ));
    }

    #[test]
    fn concurrent_closes_settle_once() {
        let store = Arc::new(MockLedgerPort::new());
        let id = buy(&*store, "USD", dec!(100), dec!(1300)).id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || sell(&*store, id, dec!(1300) + Decimal::from(i)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LedgerError::AlreadyClosed { .. })));

        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored.settlement(), Some(winners[0]));
    }
}

mod delete_and_list {
    use super::*;

    #[test]
    fn delete_twice_is_not_found() {
        for (name, store) in stores() {
            let trade = buy(&*store, "USD", dec!(100), dec!(1300));
            ledger::delete_trade(&*store, trade.id).unwrap();
            assert!(store.get(trade.id).unwrap().is_none(), "{name}");
            assert!(
                matches!(
                    ledger::delete_trade(&*store, trade.id),
                    Err(LedgerError::NotFound { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn closed_trades_can_be_deleted() {
        for (name, store) in stores() {
            let trade = buy(&*store, "JPY", dec!(10000), dec!(0.95));
            sell(&*store, trade.id, dec!(1)).unwrap();
            ledger::delete_trade(&*store, trade.id).unwrap();
            assert!(ledger::list_trades(&*store, None).unwrap().is_empty(), "{name}");
        }
    }

    #[test]
    fn list_is_newest_first() {
        for (name, store) in stores() {
            let early = buy_at(&*store, "USD", 1);
            let late = buy_at(&*store, "EUR", 30);
            let middle = buy_at(&*store, "JPY", 10);

            let ids: Vec<_> = ledger::list_trades(&*store, None)
                .unwrap()
                .iter()
                .map(|t| t.id)
                .collect();
            assert_eq!(ids, vec![late, middle, early], "{name}");
        }
    }

    #[test]
    fn filter_by_currency() {
        for (name, store) in stores() {
            let usd = buy_at(&*store, "USD", 1);
            buy_at(&*store, "EUR", 2);
            let usd_later = buy_at(&*store, "USD", 3);

            let ids: Vec<_> = ledger::list_trades(&*store, Some("usd"))
                .unwrap()
                .iter()
                .map(|t| t.id)
                .collect();
            assert_eq!(ids, vec![usd_later, usd], "{name}");
        }
    }

    #[test]
    fn blank_filter_lists_everything_and_unknown_lists_nothing() {
        for (name, store) in stores() {
            buy_at(&*store, "USD", 1);
            buy_at(&*store, "JPY", 2);

            assert_eq!(ledger::list_trades(&*store, Some("")).unwrap().len(), 2, "{name}");
            assert_eq!(ledger::list_trades(&*store, None).unwrap().len(), 2, "{name}");
            assert!(ledger::list_trades(&*store, Some("GBP")).unwrap().is_empty(), "{name}");
        }
    }

    #[test]
    fn empty_store_lists_nothing() {
        for (name, store) in stores() {
            assert!(ledger::list_trades(&*store, Some("JPY")).unwrap().is_empty(), "{name}");
        }
    }
}

proptest! {
    #[test]
    fn jpy_display_round_trip_is_exact(mantissa in 1i64..100_000_000, scale in 0u32..=6) {
        let per_unit = Decimal::new(mantissa, scale + 2);
        let shown = Currency::Jpy.to_display_rate(per_unit);
        let back = RateQuote::Display(shown).per_unit(Currency::Jpy);
        prop_assert_eq!(back, per_unit.normalize());
        prop_assert_eq!(Currency::Jpy.to_display_rate(back), shown);
    }

    #[test]
    fn profit_is_sell_minus_buy(
        amount in 1i64..1_000_000,
        buy_rate in 1i64..2_000_000,
        sell_rate in 1i64..2_000_000,
    ) {
        let store = MockLedgerPort::new();
        let order = BuyOrder::new(
            Some("USD"),
            Some(Decimal::from(amount)),
            Some(RateQuote::Display(Decimal::new(buy_rate, 2))),
            None,
        ).unwrap();
        let trade = ledger::open_trade(&store, order, at(2024, 1, 1, 0, 0)).unwrap();
        let settlement = sell(&store, trade.id, Decimal::new(sell_rate, 2)).unwrap();
        prop_assert_eq!(settlement.profit, settlement.sell_local - trade.buy_local);
        prop_assert_eq!(
            settlement.profit,
            Decimal::from(amount) * (Decimal::new(sell_rate, 2) - Decimal::new(buy_rate, 2))
        );
    }
}
