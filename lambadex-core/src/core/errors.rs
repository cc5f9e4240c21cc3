//! Error types for the exchange kernel
//!
//! Three failure families, matching how the dispatcher reports them:
//! wire decoding, persistent-state handling, and request rejection. Business
//! rejections (bad symbol, insufficient funds) are *not* errors; they surface
//! as notices and the input still counts as processed.

use std::io;

use thiserror::Error;

/// A raw blob could not be decoded into a typed input, query, or record.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("payload truncated: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("unknown user input tag 0x{tag:02x}")]
    UnknownInputTag { tag: u8 },

    #[error("unknown query tag 0x{tag:02x}")]
    UnknownQueryTag { tag: u8 },

    #[error("invalid side byte 0x{byte:02x}")]
    InvalidSide { byte: u8 },
}

/// The persistent state image could not be mapped, read, or committed.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("unable to open state image '{path}': {source}")]
    ImageOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to map state image: {source}")]
    MapFailed {
        #[source]
        source: io::Error,
    },

    #[error("state image mapped at 0x{got:x}, expected 0x{expected:x}")]
    WrongAddress { expected: u64, got: u64 },

    #[error("state image too small: {length} bytes")]
    ImageTooSmall { length: u64 },

    #[error("arena exhausted: root record needs {needed} bytes, {available} available")]
    ArenaExhausted { needed: u64, available: u64 },

    #[error("corrupt state image: {reason}")]
    CorruptImage { reason: String },

    #[error("unable to sync state image: {source}")]
    SyncFailed {
        #[source]
        source: io::Error,
    },
}

/// An advance request was rejected before or during processing.
///
/// Rejected inputs leave the persistent state untouched; the host records the
/// rejection and moves on to the next input.
#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error("malformed input: {0}")]
    Malformed(#[from] WireError),

    #[error("erc20 deposit transfer failed")]
    DepositFailed,

    #[error(transparent)]
    State(#[from] StateError),

    #[error("unable to issue voucher: {0}")]
    Voucher(#[source] io::Error),
}
