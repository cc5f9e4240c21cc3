//! Property tests for the matching engine's balance and ordering invariants.

use proptest::prelude::*;

use crate::core::types::{EthAddress, Side, Symbol, BTC_ADDRESS, USDT_ADDRESS};
use crate::exchange::book::Order;
use crate::exchange::Exchange;

const TRADERS: usize = 4;
const BASE_SEED: u64 = 1_000_000;
const QUOTE_SEED: u64 = 10_000_000;

fn trader(index: usize) -> EthAddress {
    EthAddress([index as u8 + 1; 20])
}

fn seeded_exchange() -> Exchange {
    let mut ex = Exchange::genesis();
    for index in 0..TRADERS {
        ex.deposit(trader(index), BTC_ADDRESS, BASE_SEED);
        ex.deposit(trader(index), USDT_ADDRESS, QUOTE_SEED);
    }
    ex
}

fn arbitrary_order() -> impl Strategy<Value = (usize, Side, u64, u64)> {
    (
        0..TRADERS,
        prop_oneof![Just(Side::Buy), Just(Side::Sell)],
        1u64..500,
        1u64..500,
    )
}

proptest! {
    #[test]
    fn book_sides_stay_price_ordered(orders in prop::collection::vec(arbitrary_order(), 1..60)) {
        let mut ex = seeded_exchange();
        let symbol = Symbol::new("BTC/USDT");
        let mut notices = Vec::new();
        for (index, side, quantity, price) in orders {
            ex.new_order(
                Order { id: 0, trader: trader(index), symbol, side, price, quantity },
                &mut notices,
            );
        }
        if let Some(book) = ex.find_book(&symbol) {
            let bid_prices: Vec<_> = book.bids.iter().map(|o| o.price).collect();
            for pair in bid_prices.windows(2) {
                prop_assert!(pair[0] >= pair[1], "bids out of order: {:?}", bid_prices);
            }
            let ask_prices: Vec<_> = book.asks.iter().map(|o| o.price).collect();
            for pair in ask_prices.windows(2) {
                prop_assert!(pair[0] <= pair[1], "asks out of order: {:?}", ask_prices);
            }
        }
    }

    #[test]
    fn base_token_is_conserved(orders in prop::collection::vec(arbitrary_order(), 1..60)) {
        let mut ex = seeded_exchange();
        let symbol = Symbol::new("BTC/USDT");
        let mut notices = Vec::new();
        for (index, side, quantity, price) in orders {
            ex.new_order(
                Order { id: 0, trader: trader(index), symbol, side, price, quantity },
                &mut notices,
            );
        }
        // every unit of base sits either in a wallet or escrowed in a
        // resting ask; deposits are the only source
        let wallet_base: u64 = (0..TRADERS).map(|i| ex.balance(&trader(i), &BTC_ADDRESS)).sum();
        let escrowed_base: u64 = ex
            .find_book(&symbol)
            .map(|book| book.asks.iter().map(|o| o.quantity).sum())
            .unwrap_or(0);
        prop_assert_eq!(wallet_base + escrowed_base, BASE_SEED * TRADERS as u64);
    }

    #[test]
    fn quote_token_never_inflates(orders in prop::collection::vec(arbitrary_order(), 1..60)) {
        let mut ex = seeded_exchange();
        let symbol = Symbol::new("BTC/USDT");
        let mut notices = Vec::new();
        for (index, side, quantity, price) in orders {
            ex.new_order(
                Order { id: 0, trader: trader(index), symbol, side, price, quantity },
                &mut notices,
            );
        }
        // truncating settlement may burn dust but can never mint quote
        let wallet_quote: u64 = (0..TRADERS).map(|i| ex.balance(&trader(i), &USDT_ADDRESS)).sum();
        prop_assert!(wallet_quote <= QUOTE_SEED * TRADERS as u64);
    }
}
