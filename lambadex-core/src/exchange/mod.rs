//! The exchange root: instruments, books, wallets, and the id counter.
//!
//! Everything here is a pure function of the input history. No clocks, no
//! randomness, no iteration over unordered containers; the whole root
//! round-trips through the state image byte-identically.

pub mod book;
pub mod image;
pub mod matching;
pub mod wallet;

#[cfg(test)]
mod invariants_proptest;

use std::collections::BTreeMap;

use crate::core::types::{
    Currency, EthAddress, OrderId, Symbol, ADA_ADDRESS, BNB_ADDRESS, BTC_ADDRESS, CTSI_ADDRESS,
    DAI_ADDRESS, DOGE_ADDRESS, SOL_ADDRESS, TON_ADDRESS, USDT_ADDRESS, XRP_ADDRESS,
};

pub use book::{Book, BookSide, Order};
pub use wallet::{Wallet, Wallets};

/// A tradeable pair: `base` is the token being traded, `quote` prices one
/// unit of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub base: EthAddress,
    pub quote: EthAddress,
}

/// Root state record. Lives in the persistent arena between inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    instruments: BTreeMap<Symbol, Instrument>,
    books: BTreeMap<Symbol, Book>,
    wallets: Wallets,
    next_id: OrderId,
}

impl Exchange {
    /// Fresh state with the genesis instrument set and no wallets or books.
    pub fn genesis() -> Self {
        let mut instruments = BTreeMap::new();
        let pairs = [
            ("ADA/USDT", ADA_ADDRESS, USDT_ADDRESS),
            ("BNB/USDT", BNB_ADDRESS, USDT_ADDRESS),
            ("BTC/USDT", BTC_ADDRESS, USDT_ADDRESS),
            ("CTSI/USDT", CTSI_ADDRESS, USDT_ADDRESS),
            ("DAI/USDT", DAI_ADDRESS, USDT_ADDRESS),
            ("DOGE/USDT", DOGE_ADDRESS, USDT_ADDRESS),
            ("SOL/USDT", SOL_ADDRESS, USDT_ADDRESS),
            ("TON/USDT", TON_ADDRESS, USDT_ADDRESS),
            ("XRP/USDT", XRP_ADDRESS, USDT_ADDRESS),
            ("ADA/BTC", ADA_ADDRESS, BTC_ADDRESS),
            ("BNB/BTC", BNB_ADDRESS, BTC_ADDRESS),
            ("CTSI/BTC", CTSI_ADDRESS, BTC_ADDRESS),
            ("XRP/BTC", XRP_ADDRESS, BTC_ADDRESS),
        ];
        for (ticker, base, quote) in pairs {
            instruments.insert(Symbol::new(ticker), Instrument { base, quote });
        }
        Self {
            instruments,
            books: BTreeMap::new(),
            wallets: Wallets::new(),
            next_id: 0,
        }
    }

    /// Reassemble a root from its decoded parts. Only the image codec builds
    /// states this way.
    pub(crate) fn from_parts(
        instruments: BTreeMap<Symbol, Instrument>,
        books: BTreeMap<Symbol, Book>,
        wallets: Wallets,
        next_id: OrderId,
    ) -> Self {
        Self {
            instruments,
            books,
            wallets,
            next_id,
        }
    }

    pub fn instrument(&self, symbol: &Symbol) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    /// All instruments in symbol order.
    pub fn instruments(&self) -> impl Iterator<Item = (&Symbol, &Instrument)> {
        self.instruments.iter()
    }

    /// All books in symbol order.
    pub fn books(&self) -> impl Iterator<Item = (&Symbol, &Book)> {
        self.books.iter()
    }

    pub fn wallets(&self) -> &Wallets {
        &self.wallets
    }

    /// The last assigned order id.
    pub fn last_order_id(&self) -> OrderId {
        self.next_id
    }

    pub fn find_book(&self, symbol: &Symbol) -> Option<&Book> {
        self.books.get(symbol)
    }

    pub fn find_wallet(&self, trader: &EthAddress) -> Option<&Wallet> {
        self.wallets.get(trader)
    }

    pub fn balance(&self, trader: &EthAddress, token: &EthAddress) -> Currency {
        self.wallets.balance(trader, token)
    }

    /// Credit a confirmed ERC-20 deposit. Never fails.
    pub fn deposit(&mut self, trader: EthAddress, token: EthAddress, amount: Currency) {
        self.wallets.credit(trader, token, amount);
    }

    /// Debit a withdrawal if the balance covers it. Returns whether it did.
    pub fn withdraw(&mut self, trader: EthAddress, token: EthAddress, amount: Currency) -> bool {
        if self.wallets.balance(&trader, &token) < amount {
            return false;
        }
        self.wallets.debit(trader, token, amount);
        true
    }

    fn assign_id(&mut self) -> OrderId {
        self.next_id += 1;
        self.next_id
    }

    fn book_mut(books: &mut BTreeMap<Symbol, Book>, symbol: Symbol) -> &mut Book {
        books.entry(symbol).or_insert_with(|| Book::new(symbol))
    }
}
