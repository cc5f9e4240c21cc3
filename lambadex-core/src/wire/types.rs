//! Typed input, output, and query records with their packed codecs
//!
//! Layouts (packed, little-endian scalars, big-endian 256-bit amounts):
//!
//! ```text
//! deposit      status:u8 | token:20 | sender:20 | amount:be256        = 73
//! new_order    'N' | symbol:10 | side:u8 | quantity:u64 | price:u64   = 28
//! cancel       'C' | id:u64                                           = 9
//! withdraw     'W' | token:20 | quantity:u64                          = 29
//! metadata     sender:20 | block:u64 | time:u64 | epoch:u64 | index:u64 = 52
//! notice       'E' | execution_notice  or  'W'/'D' | wallet_notice
//! query        'B' | symbol:10 | depth:u64  or  'W' | trader:20
//! report       'B' | book_report  or  'W' | wallet_report
//! voucher      a9 05 9c bb | pad12 | destination:20 | amount:be256    = 68
//! ```

use crate::core::errors::WireError;
use crate::core::types::{Currency, EthAddress, OrderId, Side, Symbol};
use crate::wire::codec::{Be256, ByteReader, ByteWriter};

/// Exact length of an ERC-20 deposit record; part of the deposit routing rule.
pub const ERC20_DEPOSIT_LENGTH: usize = 73;

/// Selector of solidity `transfer(address,uint256)`.
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Length of an encoded ERC-20 transfer voucher payload.
pub const ERC20_TRANSFER_PAYLOAD_LENGTH: usize = 68;

/// Book reports carry at most this many entries.
pub const MAX_BOOK_ENTRY: usize = 64;

/// Wallet reports carry at most this many entries.
pub const MAX_WALLET_ENTRY: usize = 16;

/// Outcome of the ERC-20 transfer behind a deposit, as reported by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DepositStatus {
    Failed = 0,
    Successful = 1,
}

impl DepositStatus {
    /// Any status byte other than 1 counts as a failed transfer.
    pub const fn from_u8(byte: u8) -> Self {
        match byte {
            1 => Self::Successful,
            _ => Self::Failed,
        }
    }
}

/// An ERC-20 deposit forwarded by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20Deposit {
    pub status: DepositStatus,
    pub token: EthAddress,
    pub sender: EthAddress,
    pub amount: Be256,
}

impl Erc20Deposit {
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(payload);
        Ok(Self {
            status: DepositStatus::from_u8(r.read_u8()?),
            token: r.read_address()?,
            sender: r.read_address()?,
            amount: r.read_be256()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(ERC20_DEPOSIT_LENGTH);
        w.put_u8(self.status as u8);
        w.put_address(&self.token);
        w.put_address(&self.sender);
        w.put_be256(&self.amount);
        w.into_vec()
    }
}

/// Host-provided metadata accompanying every input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputMetadata {
    pub sender: EthAddress,
    pub block_number: u64,
    pub timestamp: u64,
    pub epoch_index: u64,
    pub input_index: u64,
}

impl InputMetadata {
    pub const LENGTH: usize = 52;

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(payload);
        Ok(Self {
            sender: r.read_address()?,
            block_number: r.read_u64()?,
            timestamp: r.read_u64()?,
            epoch_index: r.read_u64()?,
            input_index: r.read_u64()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(Self::LENGTH);
        w.put_address(&self.sender);
        w.put_u64(self.block_number);
        w.put_u64(self.timestamp);
        w.put_u64(self.epoch_index);
        w.put_u64(self.input_index);
        w.into_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderInput {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Currency,
    pub price: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOrderInput {
    pub id: OrderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawInput {
    pub token: EthAddress,
    pub quantity: Currency,
}

/// A user-signed command, discriminated by its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    NewOrder(NewOrderInput),
    CancelOrder(CancelOrderInput),
    Withdraw(WithdrawInput),
}

impl UserInput {
    /// Decode a user input blob. Trailing bytes beyond the tagged payload are
    /// ignored; short payloads are malformed.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(payload);
        match r.read_u8()? {
            b'N' => Ok(Self::NewOrder(NewOrderInput {
                symbol: r.read_symbol()?,
                side: r.read_side()?,
                quantity: r.read_u64()?,
                price: r.read_u64()?,
            })),
            b'C' => Ok(Self::CancelOrder(CancelOrderInput { id: r.read_u64()? })),
            b'W' => Ok(Self::Withdraw(WithdrawInput {
                token: r.read_address()?,
                quantity: r.read_u64()?,
            })),
            tag => Err(WireError::UnknownInputTag { tag }),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        match self {
            Self::NewOrder(order) => {
                w.put_u8(b'N');
                w.put_symbol(&order.symbol);
                w.put_side(order.side);
                w.put_u64(order.quantity);
                w.put_u64(order.price);
            }
            Self::CancelOrder(cancel) => {
                w.put_u8(b'C');
                w.put_u64(cancel.id);
            }
            Self::Withdraw(withdraw) => {
                w.put_u8(b'W');
                w.put_address(&withdraw.token);
                w.put_u64(withdraw.quantity);
            }
        }
        w.into_vec()
    }
}

/// Event discriminator inside an execution notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    NewOrder = b'N',
    CancelOrder = b'C',
    Execution = b'E',
    RejectionInvalidSymbol = b'r',
    RejectionInsufficientFunds = b'R',
}

/// Per-order lifecycle notice: ack, execution, or rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionNotice {
    pub trader: EthAddress,
    pub event: EventKind,
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Currency,
    pub price: Currency,
}

impl ExecutionNotice {
    fn encode_into(&self, w: &mut ByteWriter) {
        w.put_address(&self.trader);
        w.put_u8(self.event as u8);
        w.put_u64(self.id);
        w.put_symbol(&self.symbol);
        w.put_side(self.side);
        w.put_u64(self.quantity);
        w.put_u64(self.price);
    }
}

/// Deposit or withdraw confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletNotice {
    pub trader: EthAddress,
    pub token: EthAddress,
    pub quantity: Currency,
}

impl WalletNotice {
    fn encode_into(&self, w: &mut ByteWriter) {
        w.put_address(&self.trader);
        w.put_address(&self.token);
        w.put_u64(self.quantity);
    }
}

/// A per-input informational output, discriminated by its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Execution(ExecutionNotice),
    WalletWithdraw(WalletNotice),
    WalletDeposit(WalletNotice),
}

impl Notice {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        match self {
            Self::Execution(notice) => {
                w.put_u8(b'E');
                notice.encode_into(&mut w);
            }
            Self::WalletWithdraw(notice) => {
                w.put_u8(b'W');
                notice.encode_into(&mut w);
            }
            Self::WalletDeposit(notice) => {
                w.put_u8(b'D');
                notice.encode_into(&mut w);
            }
        }
        w.into_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookQuery {
    pub symbol: Symbol,
    pub depth: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletQuery {
    pub trader: EthAddress,
}

/// A read-only inspect query, discriminated by its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Book(BookQuery),
    Wallet(WalletQuery),
}

impl Query {
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(payload);
        match r.read_u8()? {
            b'B' => Ok(Self::Book(BookQuery {
                symbol: r.read_symbol()?,
                depth: r.read_u64()?,
            })),
            b'W' => Ok(Self::Wallet(WalletQuery {
                trader: r.read_address()?,
            })),
            tag => Err(WireError::UnknownQueryTag { tag }),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        match self {
            Self::Book(query) => {
                w.put_u8(b'B');
                w.put_symbol(&query.symbol);
                w.put_u64(query.depth);
            }
            Self::Wallet(query) => {
                w.put_u8(b'W');
                w.put_address(&query.trader);
            }
        }
        w.into_vec()
    }
}

/// One resting order inside a book report. 45 bytes packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub trader: EthAddress,
    pub id: OrderId,
    pub side: Side,
    pub quantity: Currency,
    pub price: Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookReport {
    pub symbol: Symbol,
    pub entries: Vec<BookEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalletEntry {
    pub token: EthAddress,
    pub quantity: Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalletReport {
    pub entries: Vec<WalletEntry>,
}

/// Reply to an inspect query. The entry array is a fixed-width slab on the
/// wire (64 book entries, 16 wallet entries), zero-filled past `entry_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Book(BookReport),
    Wallet(WalletReport),
}

impl Report {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Book(report) => {
                debug_assert!(report.entries.len() <= MAX_BOOK_ENTRY);
                let mut w = ByteWriter::with_capacity(1 + 10 + 8 + MAX_BOOK_ENTRY * 45);
                w.put_u8(b'B');
                w.put_symbol(&report.symbol);
                w.put_u64(report.entries.len() as u64);
                for entry in report.entries.iter().take(MAX_BOOK_ENTRY) {
                    w.put_address(&entry.trader);
                    w.put_u64(entry.id);
                    w.put_side(entry.side);
                    w.put_u64(entry.quantity);
                    w.put_u64(entry.price);
                }
                // unused slots are zero-filled on the wire
                for _ in report.entries.len()..MAX_BOOK_ENTRY {
                    w.put_bytes(&[0u8; 45]);
                }
                w.into_vec()
            }
            Self::Wallet(report) => {
                debug_assert!(report.entries.len() <= MAX_WALLET_ENTRY);
                let mut w = ByteWriter::with_capacity(1 + 8 + MAX_WALLET_ENTRY * 28);
                w.put_u8(b'W');
                w.put_u64(report.entries.len() as u64);
                for entry in report.entries.iter().take(MAX_WALLET_ENTRY) {
                    w.put_address(&entry.token);
                    w.put_u64(entry.quantity);
                }
                for _ in report.entries.len()..MAX_WALLET_ENTRY {
                    w.put_bytes(&[0u8; 28]);
                }
                w.into_vec()
            }
        }
    }
}

/// Encode the calldata of an ERC-20 `transfer(destination, amount)`.
///
/// The destination address is left-padded to 32 bytes after the selector, so
/// the layout is `selector | pad12 | destination | amount`.
pub fn encode_erc20_transfer(destination: EthAddress, amount: Be256) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(ERC20_TRANSFER_PAYLOAD_LENGTH);
    w.put_bytes(&ERC20_TRANSFER_SELECTOR);
    w.put_bytes(&[0u8; 12]);
    w.put_address(&destination);
    w.put_be256(&amount);
    w.into_vec()
}
