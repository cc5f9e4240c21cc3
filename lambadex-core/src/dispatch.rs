//! Request dispatcher: routes raw input blobs into the advance and inspect
//! handlers and enforces the output and commit discipline.
//!
//! Routing is exact: an input whose metadata sender is the ERC-20 portal
//! *and* whose payload is exactly the deposit record length is a deposit;
//! everything else is a user command tagged by its first byte. Every accepted
//! advance ends with a commit barrier through the [`StateStore`] seam; a
//! commit that fails (arena exhausted) rejects the input and restores the
//! previously stored state, so rejected inputs never leave a trace.

use tracing::{debug, error, warn};

use crate::arena::StateStore;
use crate::core::errors::{AdvanceError, StateError, WireError};
use crate::core::types::{EthAddress, ERC20_PORTAL_ADDRESS};
use crate::exchange::book::Order;
use crate::exchange::Exchange;
use crate::rollup::OutputPort;
use crate::wire::codec::Be256;
use crate::wire::types::{
    encode_erc20_transfer, BookEntry, BookQuery, BookReport, CancelOrderInput, DepositStatus,
    Erc20Deposit, ExecutionNotice, InputMetadata, NewOrderInput, Notice, Query, Report, UserInput,
    WalletEntry, WalletNotice, WalletQuery, WalletReport, WithdrawInput, ERC20_DEPOSIT_LENGTH,
    MAX_BOOK_ENTRY, MAX_WALLET_ENTRY,
};

/// The state machine tying the exchange root to its persistent store.
pub struct Dispatcher<S: StateStore> {
    state: Exchange,
    store: S,
}

impl<S: StateStore> Dispatcher<S> {
    /// Resume from the store's current root record.
    pub fn open(store: S) -> Result<Self, StateError> {
        let state = store.load()?;
        Ok(Self { state, store })
    }

    /// Start from genesis and commit it as the first root record.
    pub fn genesis(mut store: S) -> Result<Self, StateError> {
        let state = Exchange::genesis();
        store.commit(&state)?;
        Ok(Self { state, store })
    }

    pub fn state(&self) -> &Exchange {
        &self.state
    }

    /// Process one advance input to completion.
    pub fn advance(
        &mut self,
        metadata: &InputMetadata,
        payload: &[u8],
        port: &mut dyn OutputPort,
    ) -> Result<(), AdvanceError> {
        if metadata.sender == ERC20_PORTAL_ADDRESS && payload.len() == ERC20_DEPOSIT_LENGTH {
            let deposit = Erc20Deposit::decode(payload).map_err(AdvanceError::Malformed)?;
            return self.advance_deposit(deposit, port);
        }
        match UserInput::decode(payload).map_err(AdvanceError::Malformed)? {
            UserInput::NewOrder(input) => self.advance_new_order(metadata.sender, input, port),
            UserInput::CancelOrder(input) => self.advance_cancel_order(metadata.sender, input),
            UserInput::Withdraw(input) => self.advance_withdraw(metadata.sender, input, port),
        }
    }

    fn advance_deposit(
        &mut self,
        deposit: Erc20Deposit,
        port: &mut dyn OutputPort,
    ) -> Result<(), AdvanceError> {
        if deposit.status != DepositStatus::Successful {
            warn!(sender = %deposit.sender, token = %deposit.token, "erc20 deposit transfer failed");
            return Err(AdvanceError::DepositFailed);
        }
        let quantity = deposit.amount.to_u64();
        debug!(sender = %deposit.sender, token = %deposit.token, quantity, "deposit");
        self.state.deposit(deposit.sender, deposit.token, quantity);
        emit_notice(
            port,
            &Notice::WalletDeposit(WalletNotice {
                trader: deposit.sender,
                token: deposit.token,
                quantity,
            }),
        );
        self.commit()
    }

    fn advance_new_order(
        &mut self,
        sender: EthAddress,
        input: NewOrderInput,
        port: &mut dyn OutputPort,
    ) -> Result<(), AdvanceError> {
        let order = Order {
            id: 0,
            trader: sender,
            symbol: input.symbol,
            side: input.side,
            price: input.price,
            quantity: input.quantity,
        };
        let mut notices: Vec<ExecutionNotice> = Vec::new();
        self.state.new_order(order, &mut notices);
        for notice in notices {
            emit_notice(port, &Notice::Execution(notice));
        }
        self.commit()
    }

    fn advance_cancel_order(
        &mut self,
        sender: EthAddress,
        input: CancelOrderInput,
    ) -> Result<(), AdvanceError> {
        // accepted no-op: reservation refunds are a follow-up
        debug!(sender = %sender, id = input.id, "cancel order (no-op)");
        self.commit()
    }

    fn advance_withdraw(
        &mut self,
        sender: EthAddress,
        input: WithdrawInput,
        port: &mut dyn OutputPort,
    ) -> Result<(), AdvanceError> {
        if self.state.withdraw(sender, input.token, input.quantity) {
            let payload = encode_erc20_transfer(sender, Be256::from_u64(input.quantity));
            if let Err(err) = port.emit_voucher(input.token, &payload) {
                error!(error = %err, "unable to issue withdraw voucher");
                self.restore();
                return Err(AdvanceError::Voucher(err));
            }
            emit_notice(
                port,
                &Notice::WalletWithdraw(WalletNotice {
                    trader: sender,
                    token: input.token,
                    quantity: input.quantity,
                }),
            );
        } else {
            warn!(sender = %sender, token = %input.token, quantity = input.quantity,
                "withdraw exceeds balance; ignored");
        }
        self.commit()
    }

    /// Process one inspect query. Never mutates state.
    pub fn inspect(&self, payload: &[u8], port: &mut dyn OutputPort) -> Result<(), WireError> {
        match Query::decode(payload)? {
            Query::Book(query) => self.inspect_book(query, port),
            Query::Wallet(query) => self.inspect_wallet(query, port),
        }
        Ok(())
    }

    fn inspect_book(&self, query: BookQuery, port: &mut dyn OutputPort) {
        let depth = query.depth.min(MAX_BOOK_ENTRY as u64) as usize;
        let mut entries = Vec::new();
        if let Some(book) = self.state.find_book(&query.symbol) {
            // interleave one bid and one ask per step, best first, until the
            // requested depth or both sides run dry
            let mut bids = book.bids.iter();
            let mut asks = book.asks.iter();
            let mut bid = bids.next();
            let mut ask = asks.next();
            'walk: while bid.is_some() || ask.is_some() {
                if let Some(order) = bid {
                    if entries.len() >= depth {
                        break 'walk;
                    }
                    entries.push(book_entry(order));
                    bid = bids.next();
                }
                if let Some(order) = ask {
                    if entries.len() >= depth {
                        break 'walk;
                    }
                    entries.push(book_entry(order));
                    ask = asks.next();
                }
            }
        }
        debug!(symbol = %query.symbol, entries = entries.len(), "book query");
        emit_report(
            port,
            &Report::Book(BookReport {
                symbol: query.symbol,
                entries,
            }),
        );
    }

    fn inspect_wallet(&self, query: WalletQuery, port: &mut dyn OutputPort) {
        let mut entries = Vec::new();
        if let Some(wallet) = self.state.find_wallet(&query.trader) {
            for (token, quantity) in wallet.iter().take(MAX_WALLET_ENTRY) {
                entries.push(WalletEntry {
                    token: *token,
                    quantity: *quantity,
                });
            }
        }
        debug!(trader = %query.trader, entries = entries.len(), "wallet query");
        emit_report(port, &Report::Wallet(WalletReport { entries }));
    }

    /// The commit barrier. On failure the previously stored state is
    /// reloaded so the rejected input leaves nothing behind.
    fn commit(&mut self) -> Result<(), AdvanceError> {
        match self.store.commit(&self.state) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "commit failed; rejecting input");
                self.restore();
                Err(AdvanceError::State(err))
            }
        }
    }

    fn restore(&mut self) {
        match self.store.load() {
            Ok(previous) => self.state = previous,
            Err(err) => error!(error = %err, "unable to restore state after failed commit"),
        }
    }
}

fn book_entry(order: &Order) -> BookEntry {
    BookEntry {
        trader: order.trader,
        id: order.id,
        side: order.side,
        quantity: order.quantity,
        price: order.price,
    }
}

// Notice and report emission failures are logged and swallowed: the host
// owns output durability, the kernel owns state.
fn emit_notice(port: &mut dyn OutputPort, notice: &Notice) {
    if let Err(err) = port.emit_notice(&notice.encode()) {
        error!(error = %err, "unable to issue notice");
    }
}

fn emit_report(port: &mut dyn OutputPort, report: &Report) {
    if let Err(err) = port.emit_report(&report.encode()) {
        error!(error = %err, "unable to issue report");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::MemoryStore;
    use crate::core::types::{Side, Symbol, BTC_ADDRESS, USDT_ADDRESS};
    use crate::exchange::Exchange;
    use crate::rollup::MemoryPort;

    fn trader(byte: u8) -> EthAddress {
        EthAddress([byte; 20])
    }

    fn metadata(sender: EthAddress, input_index: u64) -> InputMetadata {
        InputMetadata {
            sender,
            block_number: 1,
            timestamp: 0,
            epoch_index: 0,
            input_index,
        }
    }

    fn dispatcher() -> Dispatcher<MemoryStore> {
        Dispatcher::genesis(MemoryStore::new(1 << 20)).unwrap()
    }

    fn deposit_blob(sender: EthAddress, token: EthAddress, amount: u64, status: DepositStatus) -> Vec<u8> {
        Erc20Deposit {
            status,
            token,
            sender,
            amount: Be256::from_u64(amount),
        }
        .encode()
    }

    fn deposit(
        d: &mut Dispatcher<MemoryStore>,
        port: &mut MemoryPort,
        sender: EthAddress,
        token: EthAddress,
        amount: u64,
    ) {
        let blob = deposit_blob(sender, token, amount, DepositStatus::Successful);
        d.advance(&metadata(ERC20_PORTAL_ADDRESS, 0), &blob, port)
            .unwrap();
    }

    fn new_order(
        d: &mut Dispatcher<MemoryStore>,
        port: &mut MemoryPort,
        sender: EthAddress,
        symbol: &str,
        side: Side,
        quantity: u64,
        price: u64,
    ) {
        let blob = UserInput::NewOrder(NewOrderInput {
            symbol: Symbol::new(symbol),
            side,
            quantity,
            price,
        })
        .encode();
        d.advance(&metadata(sender, 0), &blob, port).unwrap();
    }

    #[test]
    fn test_deposit_credits_and_notifies() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 1_000_000);
        deposit(&mut d, &mut port, trader(2), BTC_ADDRESS, 1_000_000);

        assert_eq!(port.notices.len(), 2);
        let expected = Notice::WalletDeposit(WalletNotice {
            trader: trader(1),
            token: USDT_ADDRESS,
            quantity: 1_000_000,
        })
        .encode();
        assert_eq!(port.notices[0], expected);
        assert_eq!(d.state().balance(&trader(1), &USDT_ADDRESS), 1_000_000);
        assert_eq!(d.state().balance(&trader(2), &BTC_ADDRESS), 1_000_000);
    }

    #[test]
    fn test_deposit_shape_from_user_is_not_a_deposit() {
        // same 73-byte blob, but the metadata sender is not the portal:
        // first byte (status 0x01) is no known user input tag
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        let blob = deposit_blob(trader(1), USDT_ADDRESS, 500, DepositStatus::Successful);
        let err = d.advance(&metadata(trader(1), 0), &blob, &mut port).unwrap_err();
        assert!(matches!(
            err,
            AdvanceError::Malformed(WireError::UnknownInputTag { tag: 1 })
        ));
        assert!(port.notices.is_empty());
        assert_eq!(d.state().balance(&trader(1), &USDT_ADDRESS), 0);
    }

    #[test]
    fn test_portal_input_with_wrong_length_is_not_a_deposit() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        let mut blob = deposit_blob(trader(1), USDT_ADDRESS, 500, DepositStatus::Successful);
        blob.pop();
        let err = d
            .advance(&metadata(ERC20_PORTAL_ADDRESS, 0), &blob, &mut port)
            .unwrap_err();
        assert!(matches!(err, AdvanceError::Malformed(_)));
        assert_eq!(d.state().balance(&trader(1), &USDT_ADDRESS), 0);
    }

    #[test]
    fn test_failed_deposit_status_is_rejected() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        let blob = deposit_blob(trader(1), USDT_ADDRESS, 500, DepositStatus::Failed);
        let err = d
            .advance(&metadata(ERC20_PORTAL_ADDRESS, 0), &blob, &mut port)
            .unwrap_err();
        assert!(matches!(err, AdvanceError::DepositFailed));
        assert!(port.notices.is_empty());
        assert_eq!(d.state().balance(&trader(1), &USDT_ADDRESS), 0);
    }

    #[test]
    fn test_unknown_tag_is_rejected_without_outputs() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        let err = d
            .advance(&metadata(trader(1), 0), &[b'X', 1, 2, 3], &mut port)
            .unwrap_err();
        assert!(matches!(
            err,
            AdvanceError::Malformed(WireError::UnknownInputTag { tag: b'X' })
        ));
        assert!(port.notices.is_empty());
        assert!(port.vouchers.is_empty());
    }

    #[test]
    fn test_new_order_notices_flow_through_port() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 1_000_000);
        deposit(&mut d, &mut port, trader(2), BTC_ADDRESS, 1_000_000);
        port.notices.clear();

        new_order(&mut d, &mut port, trader(1), "BTC/USDT", Side::Buy, 100, 120);
        assert_eq!(port.notices.len(), 1, "ack only against an empty book");

        new_order(&mut d, &mut port, trader(2), "BTC/USDT", Side::Sell, 100, 100);
        assert_eq!(port.notices.len(), 4, "ack plus two executions");
        // every notice on the wire is an execution notice here
        for notice in &port.notices {
            assert_eq!(notice[0], b'E');
            assert_eq!(notice.len(), 57);
        }
        // and the wallets settled at the documented mid price
        assert_eq!(d.state().balance(&trader(1), &USDT_ADDRESS), 999_890);
        assert_eq!(d.state().balance(&trader(1), &BTC_ADDRESS), 100);
        assert_eq!(d.state().balance(&trader(2), &BTC_ADDRESS), 999_900);
        assert_eq!(d.state().balance(&trader(2), &USDT_ADDRESS), 110);
    }

    #[test]
    fn test_business_rejection_still_accepts_the_input() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        // no funds at all: the order is rejected by notice, not by error
        new_order(&mut d, &mut port, trader(1), "BTC/USDT", Side::Buy, 100, 100);
        assert_eq!(port.notices.len(), 1);
        assert_eq!(port.notices[0][21], b'R');
    }

    #[test]
    fn test_cancel_is_an_accepted_no_op() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        let before = d.state().clone();
        let blob = UserInput::CancelOrder(CancelOrderInput { id: 42 }).encode();
        d.advance(&metadata(trader(1), 0), &blob, &mut port).unwrap();
        assert!(port.notices.is_empty());
        assert!(port.vouchers.is_empty());
        assert_eq!(d.state(), &before);
    }

    #[test]
    fn test_withdraw_emits_voucher_and_notice() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 500);
        port.notices.clear();

        let blob = UserInput::Withdraw(WithdrawInput {
            token: USDT_ADDRESS,
            quantity: 200,
        })
        .encode();
        d.advance(&metadata(trader(1), 0), &blob, &mut port).unwrap();

        assert_eq!(d.state().balance(&trader(1), &USDT_ADDRESS), 300);
        assert_eq!(port.vouchers.len(), 1);
        let (destination, payload) = &port.vouchers[0];
        assert_eq!(*destination, USDT_ADDRESS);
        assert_eq!(payload, &encode_erc20_transfer(trader(1), Be256::from_u64(200)));
        assert_eq!(port.notices.len(), 1);
        assert_eq!(
            port.notices[0],
            Notice::WalletWithdraw(WalletNotice {
                trader: trader(1),
                token: USDT_ADDRESS,
                quantity: 200,
            })
            .encode()
        );
    }

    #[test]
    fn test_withdraw_beyond_balance_is_silently_ignored() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 100);
        port.notices.clear();

        let blob = UserInput::Withdraw(WithdrawInput {
            token: USDT_ADDRESS,
            quantity: 200,
        })
        .encode();
        d.advance(&metadata(trader(1), 0), &blob, &mut port).unwrap();
        assert!(port.vouchers.is_empty());
        assert!(port.notices.is_empty());
        assert_eq!(d.state().balance(&trader(1), &USDT_ADDRESS), 100);
    }

    #[test]
    fn test_deposit_withdraw_round_trip() {
        // deposit a, withdraw a: the wallet ends where it started and the
        // voucher pays a back out
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), BTC_ADDRESS, 777);
        let blob = UserInput::Withdraw(WithdrawInput {
            token: BTC_ADDRESS,
            quantity: 777,
        })
        .encode();
        d.advance(&metadata(trader(1), 0), &blob, &mut port).unwrap();
        assert_eq!(d.state().balance(&trader(1), &BTC_ADDRESS), 0);
        assert_eq!(port.vouchers.len(), 1);
        assert_eq!(
            port.vouchers[0].1,
            encode_erc20_transfer(trader(1), Be256::from_u64(777))
        );
    }

    #[test]
    fn test_inspect_wallet_snapshot() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 1_000_000);

        let query = Query::Wallet(WalletQuery { trader: trader(1) }).encode();
        d.inspect(&query, &mut port).unwrap();
        assert_eq!(port.reports.len(), 1);
        let report = &port.reports[0];
        assert_eq!(report[0], b'W');
        assert_eq!(&report[1..9], &1u64.to_le_bytes());
        assert_eq!(&report[9..29], USDT_ADDRESS.as_bytes());
        assert_eq!(&report[29..37], &1_000_000u64.to_le_bytes());
    }

    #[test]
    fn test_inspect_wallet_of_unknown_trader_is_empty_success() {
        let d = dispatcher();
        let mut port = MemoryPort::new();
        let query = Query::Wallet(WalletQuery { trader: trader(9) }).encode();
        d.inspect(&query, &mut port).unwrap();
        assert_eq!(port.reports.len(), 1);
        assert_eq!(&port.reports[0][1..9], &0u64.to_le_bytes());
    }

    #[test]
    fn test_inspect_book_interleaves_bids_and_asks() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 1_000_000);
        deposit(&mut d, &mut port, trader(2), BTC_ADDRESS, 1_000_000);
        new_order(&mut d, &mut port, trader(1), "BTC/USDT", Side::Buy, 10, 90);
        new_order(&mut d, &mut port, trader(1), "BTC/USDT", Side::Buy, 10, 80);
        new_order(&mut d, &mut port, trader(2), "BTC/USDT", Side::Sell, 10, 110);
        new_order(&mut d, &mut port, trader(2), "BTC/USDT", Side::Sell, 10, 120);

        let query = Query::Book(BookQuery {
            symbol: Symbol::new("BTC/USDT"),
            depth: 10,
        })
        .encode();
        d.inspect(&query, &mut port).unwrap();
        let report = &port.reports[0];
        assert_eq!(report[0], b'B');
        assert_eq!(&report[1..11], &Symbol::new("BTC/USDT").0[..]);
        assert_eq!(&report[11..19], &4u64.to_le_bytes());
        // (bid 90, ask 110, bid 80, ask 120)
        let price_at = |slot: usize| {
            let base = 19 + slot * 45 + 37;
            u64::from_le_bytes(report[base..base + 8].try_into().unwrap())
        };
        let side_at = |slot: usize| report[19 + slot * 45 + 20 + 8];
        assert_eq!(price_at(0), 90);
        assert_eq!(side_at(0), b'B');
        assert_eq!(price_at(1), 110);
        assert_eq!(side_at(1), b'S');
        assert_eq!(price_at(2), 80);
        assert_eq!(side_at(2), b'B');
        assert_eq!(price_at(3), 120);
        assert_eq!(side_at(3), b'S');
    }

    #[test]
    fn test_inspect_book_depth_is_capped_at_64() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 100_000_000);
        deposit(&mut d, &mut port, trader(2), BTC_ADDRESS, 100_000_000);
        for i in 0..40u64 {
            new_order(&mut d, &mut port, trader(1), "BTC/USDT", Side::Buy, 10, 100 + i);
            new_order(&mut d, &mut port, trader(2), "BTC/USDT", Side::Sell, 10, 10_000 + i);
        }
        let query = Query::Book(BookQuery {
            symbol: Symbol::new("BTC/USDT"),
            depth: 1_000,
        })
        .encode();
        d.inspect(&query, &mut port).unwrap();
        let report = &port.reports[0];
        assert_eq!(&report[11..19], &64u64.to_le_bytes());
    }

    #[test]
    fn test_inspect_book_depth_zero_returns_no_entries() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 1_000_000);
        new_order(&mut d, &mut port, trader(1), "BTC/USDT", Side::Buy, 10, 90);
        let query = Query::Book(BookQuery {
            symbol: Symbol::new("BTC/USDT"),
            depth: 0,
        })
        .encode();
        d.inspect(&query, &mut port).unwrap();
        assert_eq!(&port.reports[0][11..19], &0u64.to_le_bytes());
    }

    #[test]
    fn test_inspect_unknown_symbol_echoes_empty_book() {
        let d = dispatcher();
        let mut port = MemoryPort::new();
        let query = Query::Book(BookQuery {
            symbol: Symbol::new("NO/BOOK"),
            depth: 10,
        })
        .encode();
        d.inspect(&query, &mut port).unwrap();
        let report = &port.reports[0];
        assert_eq!(&report[1..8], b"NO/BOOK");
        assert_eq!(&report[11..19], &0u64.to_le_bytes());
    }

    #[test]
    fn test_inspect_unknown_query_tag_is_rejected() {
        let d = dispatcher();
        let mut port = MemoryPort::new();
        let err = d.inspect(&[b'Z'], &mut port).unwrap_err();
        assert!(matches!(err, WireError::UnknownQueryTag { tag: b'Z' }));
        assert!(port.reports.is_empty());
    }

    #[test]
    fn test_inspect_does_not_mutate_state() {
        let mut d = dispatcher();
        let mut port = MemoryPort::new();
        deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 500);
        let before = d.state().clone();
        for _ in 0..3 {
            let query = Query::Wallet(WalletQuery { trader: trader(1) }).encode();
            d.inspect(&query, &mut port).unwrap();
            let query = Query::Book(BookQuery {
                symbol: Symbol::new("BTC/USDT"),
                depth: 64,
            })
            .encode();
            d.inspect(&query, &mut port).unwrap();
        }
        assert_eq!(d.state(), &before);
    }

    #[test]
    fn test_commit_failure_rejects_and_restores() {
        // a store too small for anything beyond genesis: the deposit must
        // bounce and leave the pre-input state behind
        let genesis_len = Exchange::genesis().to_image().len();
        let mut d = Dispatcher::genesis(MemoryStore::new(genesis_len)).unwrap();
        let mut port = MemoryPort::new();
        let blob = deposit_blob(trader(1), USDT_ADDRESS, 500, DepositStatus::Successful);
        let err = d
            .advance(&metadata(ERC20_PORTAL_ADDRESS, 0), &blob, &mut port)
            .unwrap_err();
        assert!(matches!(err, AdvanceError::State(StateError::ArenaExhausted { .. })));
        assert_eq!(d.state(), &Exchange::genesis());
        // and inputs whose record still fits keep working afterwards
        let before = d.state().clone();
        let blob = UserInput::CancelOrder(CancelOrderInput { id: 1 }).encode();
        d.advance(&metadata(trader(1), 0), &blob, &mut port).unwrap();
        assert_eq!(d.state(), &before);
    }

    #[test]
    fn test_byte_stream_is_deterministic() {
        let run = || {
            let mut d = dispatcher();
            let mut port = MemoryPort::new();
            deposit(&mut d, &mut port, trader(1), USDT_ADDRESS, 1_000_000);
            deposit(&mut d, &mut port, trader(2), BTC_ADDRESS, 1_000_000);
            new_order(&mut d, &mut port, trader(1), "BTC/USDT", Side::Buy, 100, 120);
            new_order(&mut d, &mut port, trader(2), "BTC/USDT", Side::Sell, 150, 100);
            let withdraw = UserInput::Withdraw(WithdrawInput {
                token: BTC_ADDRESS,
                quantity: 50,
            })
            .encode();
            d.advance(&metadata(trader(1), 4), &withdraw, &mut port).unwrap();
            let query = Query::Book(BookQuery {
                symbol: Symbol::new("BTC/USDT"),
                depth: 64,
            })
            .encode();
            d.inspect(&query, &mut port).unwrap();
            (port.notices, port.vouchers, port.reports)
        };
        assert_eq!(run(), run());
    }
}
