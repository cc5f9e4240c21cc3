//! Core scalar types and error kinds.

pub mod errors;
pub mod types;

pub use errors::{AdvanceError, StateError, WireError};
pub use types::{fixed_point, Currency, EthAddress, OrderId, Side, Symbol};
