//! LambadeX Core - Deterministic Limit-Order Exchange Kernel
//!
//! LambadeX is an on-chain limit-order exchange running inside a rollup
//! execution environment. External actors submit typed inputs (ERC-20
//! deposits forwarded by a trusted portal, user-signed orders, cancels, and
//! withdrawals) that deterministically mutate a persistent state of trader
//! wallets and per-instrument order books; inspectors run read-only queries
//! against the same state.
//!
//! ## Architecture
//! - **Single-threaded, run-to-completion** - one input at a time, no
//!   suspension points, no background work
//! - **Pure function of the input history** - no clocks, no randomness, only
//!   ordered containers; the output byte stream replays bit-identically
//! - **Fixed-base persistent arena** - the whole state lives in one mmap'd
//!   image, committed after every accepted input and reloadable at the same
//!   virtual address after a restart
//! - **Byte-exact wire contracts** - all inputs and outputs are hand-coded
//!   packed records, never serde
//!
//! ## Core Modules
//! - `core`: scalar types (addresses, symbols, fixed-point money) and errors
//! - `wire`: packed codecs for inputs, notices, vouchers, queries, reports
//! - `arena`: the fixed-base state image and the [`StateStore`] seam
//! - `exchange`: wallets, order books, and the matching engine
//! - `dispatch`: advance/inspect routing and the commit barrier
//! - `rollup`: the [`OutputPort`] seam and the file-replay back-end

pub mod arena;
pub mod core;
pub mod dispatch;
pub mod exchange;
pub mod rollup;
pub mod wire;

// Re-export the types almost every embedder needs
pub use crate::core::errors::{AdvanceError, StateError, WireError};
pub use crate::core::types::{fixed_point, Currency, EthAddress, OrderId, Side, Symbol};
pub use arena::{Arena, MemoryStore, StateStore, DEFAULT_VIRTUAL_START};
pub use dispatch::Dispatcher;
pub use exchange::{Book, BookSide, Exchange, Instrument, Order, Wallet, Wallets};
pub use rollup::{MemoryPort, OutputPort};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::{Arena, MemoryStore, StateStore};
    pub use crate::core::errors::{AdvanceError, StateError, WireError};
    pub use crate::core::types::{fixed_point, Currency, EthAddress, OrderId, Side, Symbol};
    pub use crate::dispatch::Dispatcher;
    pub use crate::exchange::{Exchange, Order};
    pub use crate::rollup::{MemoryPort, OutputPort};
    pub use crate::wire::types::{InputMetadata, Notice, Query, Report, UserInput};
}
