//! Byte-exact wire codecs for rollup inputs, outputs, and queries.
//!
//! The rollup host hands the dispatcher raw blobs; everything crossing that
//! boundary is encoded here by hand. Scalars are little-endian, on-chain
//! amounts big-endian 256-bit, layouts packed. Serde never touches these.

pub mod codec;
pub mod types;

pub use codec::{Be256, ByteReader, ByteWriter};
pub use types::{
    encode_erc20_transfer, BookEntry, BookQuery, BookReport, CancelOrderInput, DepositStatus,
    Erc20Deposit, EventKind, ExecutionNotice, InputMetadata, NewOrderInput, Notice, Query, Report,
    UserInput, WalletEntry, WalletNotice, WalletQuery, WalletReport, WithdrawInput,
    ERC20_DEPOSIT_LENGTH, ERC20_TRANSFER_PAYLOAD_LENGTH, ERC20_TRANSFER_SELECTOR, MAX_BOOK_ENTRY,
    MAX_WALLET_ENTRY,
};
