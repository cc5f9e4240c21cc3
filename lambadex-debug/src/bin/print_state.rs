//! Dump a LambadeX state image as JSON.
//!
//! Maps the image read-only (no fixed base needed: the flat root record is
//! position-independent), decodes the exchange root, and prints wallets and
//! books for operator inspection.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use memmap2::Mmap;
use serde::Serialize;
use std::collections::BTreeMap;

use lambadex_core::exchange::Exchange;

const HEADER_LENGTH: usize = 16;

/// Print the wallets and order books stored in a state image
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// State image file
    image_filename: PathBuf,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,
}

#[derive(Serialize)]
struct OrderDump {
    id: u64,
    trader: String,
    quantity: u64,
    price: u64,
}

#[derive(Serialize)]
struct BookDump {
    bids: Vec<OrderDump>,
    asks: Vec<OrderDump>,
}

#[derive(Serialize)]
struct StateDump {
    last_order_id: u64,
    instruments: BTreeMap<String, [String; 2]>,
    wallets: BTreeMap<String, BTreeMap<String, u64>>,
    books: BTreeMap<String, BookDump>,
}

fn dump(state: &Exchange) -> StateDump {
    let instruments = state
        .instruments()
        .map(|(symbol, instrument)| {
            (
                symbol.to_string(),
                [instrument.base.to_string(), instrument.quote.to_string()],
            )
        })
        .collect();
    let wallets = state
        .wallets()
        .iter()
        .map(|(trader, wallet)| {
            let entries = wallet
                .iter()
                .map(|(token, balance)| (token.to_string(), *balance))
                .collect();
            (trader.to_string(), entries)
        })
        .collect();
    let books = state
        .books()
        .map(|(symbol, book)| {
            let side_dump = |side: &lambadex_core::BookSide| {
                side.iter()
                    .map(|order| OrderDump {
                        id: order.id,
                        trader: order.trader.to_string(),
                        quantity: order.quantity,
                        price: order.price,
                    })
                    .collect()
            };
            (
                symbol.to_string(),
                BookDump {
                    bids: side_dump(&book.bids),
                    asks: side_dump(&book.asks),
                },
            )
        })
        .collect();
    StateDump {
        last_order_id: state.last_order_id(),
        instruments,
        wallets,
        books,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let file = File::open(&args.image_filename)
        .with_context(|| format!("unable to open '{}'", args.image_filename.display()))?;
    // SAFETY: read-only view; the tool owns no concurrent writer.
    let map = unsafe { Mmap::map(&file) }
        .with_context(|| format!("unable to map '{}'", args.image_filename.display()))?;

    if map.len() < HEADER_LENGTH {
        bail!("state image too small: {} bytes", map.len());
    }
    let next_free = u64::from_le_bytes(map[8..16].try_into().unwrap()) as usize;
    if HEADER_LENGTH + next_free > map.len() {
        bail!("allocator header inconsistent: next_free={next_free}");
    }
    let state = Exchange::from_image(&map[HEADER_LENGTH..HEADER_LENGTH + next_free])
        .context("unable to decode exchange root")?;

    let dump = dump(&state);
    let json = if args.pretty {
        serde_json::to_string_pretty(&dump)?
    } else {
        serde_json::to_string(&dump)?
    };
    println!("{json}");
    Ok(())
}
