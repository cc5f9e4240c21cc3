//! Deterministic flat encoding of the exchange root.
//!
//! The root record stored in the persistent arena is this byte image:
//! little-endian scalars, length-prefixed sections, every map walked in key
//! order and every book side in priority order. Encoding the same state twice
//! yields identical bytes, and decode(encode(state)) == state, which is what
//! makes restart idempotence and replay determinism hold at the byte level.
//!
//! ```text
//! root        next_id:u64 | instruments | wallets | books
//! instruments count:u64 | (symbol:10 | base:20 | quote:20)*
//! wallets     count:u64 | (trader:20 | entries:u64 | (token:20 | balance:u64)*)*
//! books       count:u64 | (symbol:10 | bids:side | asks:side)
//! side        count:u64 | order*            -- best first, FIFO in a level
//! order       id:u64 | trader:20 | symbol:10 | side:u8 | price:u64 | quantity:u64
//! ```

use std::collections::BTreeMap;

use crate::core::errors::{StateError, WireError};
use crate::core::types::Symbol;
use crate::exchange::book::{Book, BookSide, Order};
use crate::exchange::wallet::Wallets;
use crate::exchange::{Exchange, Instrument};
use crate::wire::codec::{ByteReader, ByteWriter};

impl Exchange {
    /// Serialize the root to its canonical byte image.
    pub fn to_image(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_u64(self.next_id);

        w.put_u64(self.instruments.len() as u64);
        for (symbol, instrument) in &self.instruments {
            w.put_symbol(symbol);
            w.put_address(&instrument.base);
            w.put_address(&instrument.quote);
        }

        w.put_u64(self.wallets.len() as u64);
        for (trader, wallet) in self.wallets.iter() {
            w.put_address(trader);
            w.put_u64(wallet.len() as u64);
            for (token, balance) in wallet {
                w.put_address(token);
                w.put_u64(*balance);
            }
        }

        w.put_u64(self.books.len() as u64);
        for book in self.books.values() {
            w.put_symbol(&book.symbol);
            encode_side(&mut w, &book.bids);
            encode_side(&mut w, &book.asks);
        }

        w.into_vec()
    }

    /// Rebuild the root from its byte image.
    pub fn from_image(image: &[u8]) -> Result<Self, StateError> {
        decode_root(image).map_err(|err| StateError::CorruptImage {
            reason: err.to_string(),
        })
    }
}

fn encode_side(w: &mut ByteWriter, side: &BookSide) {
    w.put_u64(side.len() as u64);
    for order in side.iter() {
        w.put_u64(order.id);
        w.put_address(&order.trader);
        w.put_symbol(&order.symbol);
        w.put_side(order.side);
        w.put_u64(order.price);
        w.put_u64(order.quantity);
    }
}

fn decode_side(r: &mut ByteReader<'_>, side: &mut BookSide) -> Result<(), WireError> {
    let count = r.read_u64()?;
    for _ in 0..count {
        let order = Order {
            id: r.read_u64()?,
            trader: r.read_address()?,
            symbol: r.read_symbol()?,
            side: r.read_side()?,
            price: r.read_u64()?,
            quantity: r.read_u64()?,
        };
        // encoded best-first, so re-insertion preserves FIFO within a level
        side.insert(order);
    }
    Ok(())
}

fn decode_root(image: &[u8]) -> Result<Exchange, WireError> {
    let mut r = ByteReader::new(image);
    let next_id = r.read_u64()?;

    let mut instruments = BTreeMap::new();
    let instrument_count = r.read_u64()?;
    for _ in 0..instrument_count {
        let symbol = r.read_symbol()?;
        let instrument = Instrument {
            base: r.read_address()?,
            quote: r.read_address()?,
        };
        instruments.insert(symbol, instrument);
    }

    let mut wallets = Wallets::new();
    let wallet_count = r.read_u64()?;
    for _ in 0..wallet_count {
        let trader = r.read_address()?;
        let entry_count = r.read_u64()?;
        for _ in 0..entry_count {
            let token = r.read_address()?;
            let balance = r.read_u64()?;
            wallets.credit(trader, token, balance);
        }
    }

    let mut books: BTreeMap<Symbol, Book> = BTreeMap::new();
    let book_count = r.read_u64()?;
    for _ in 0..book_count {
        let symbol = r.read_symbol()?;
        let mut book = Book::new(symbol);
        decode_side(&mut r, &mut book.bids)?;
        decode_side(&mut r, &mut book.asks)?;
        books.insert(symbol, book);
    }

    Ok(Exchange::from_parts(instruments, books, wallets, next_id))
}
