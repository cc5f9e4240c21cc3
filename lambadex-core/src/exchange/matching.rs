//! The matching engine: admission, reservation, price matching, settlement.
//!
//! Funds move in two stages. Admission reserves the full limit value out of
//! the initiator's wallet (quote for buys, base for sells). Each fill then
//! settles at the integer midpoint of the two limit prices: the buyer is
//! refunded the over-reservation at their own limit and pays the execution
//! value; the seller's reserved base *is* the delivery, so only their quote
//! credit touches the wallet. Truncating division strands sub-cent dust in
//! the reservation until the residual order drains; that is intentional.

use tracing::debug;

use crate::core::types::{fixed_point, Side};
use crate::exchange::book::Order;
use crate::exchange::Exchange;
use crate::wire::types::{EventKind, ExecutionNotice};

impl Exchange {
    /// Admit a new order, match it against the opposite side, and rest any
    /// residual.
    ///
    /// The order arrives with `id == 0`; the engine assigns the next id on
    /// admission and uses it for the ack, the executions, and the residual.
    /// Returns `false` on business rejection (unknown symbol, uncovered
    /// reservation), in which case exactly one rejection notice is appended
    /// and state is untouched.
    pub fn new_order(&mut self, mut order: Order, notices: &mut Vec<ExecutionNotice>) -> bool {
        let Some(instrument) = self.instruments.get(&order.symbol).copied() else {
            notices.push(rejection(&order, EventKind::RejectionInvalidSymbol));
            return false;
        };

        let (source, required) = match order.side {
            Side::Buy => (
                instrument.quote,
                fixed_point::notional(order.quantity, order.price),
            ),
            Side::Sell => (instrument.base, order.quantity),
        };
        if self.wallets.balance(&order.trader, &source) < required {
            notices.push(rejection(&order, EventKind::RejectionInsufficientFunds));
            return false;
        }
        self.wallets.debit(order.trader, source, required);

        order.id = self.assign_id();
        notices.push(ExecutionNotice {
            trader: order.trader,
            event: EventKind::NewOrder,
            id: order.id,
            symbol: order.symbol,
            side: order.side,
            quantity: order.quantity,
            price: order.price,
        });
        debug!(id = order.id, symbol = %order.symbol, side = %order.side,
            quantity = order.quantity, price = order.price, "order admitted");

        let book = Self::book_mut(&mut self.books, order.symbol);
        let opposite = book.side_mut(order.side.opposite());
        loop {
            if order.is_filled() {
                break;
            }
            let Some(best) = opposite.best() else {
                break;
            };
            if !order.crosses(best) {
                break;
            }
            let best = *best;

            let exec_quantity = order.quantity.min(best.quantity);
            let exec_price = fixed_point::mid_price(order.price, best.price);
            order.quantity -= exec_quantity;
            opposite.reduce_best(exec_quantity);

            let (buyer, seller) = match order.side {
                Side::Buy => (&order, &best),
                Side::Sell => (&best, &order),
            };
            // Refund the buyer's reservation at their limit, charge the
            // execution value, hand over the base. The seller's base left
            // their wallet at reservation time; only the proceeds land.
            self.wallets.credit(
                buyer.trader,
                instrument.quote,
                fixed_point::notional(exec_quantity, buyer.price),
            );
            self.wallets.debit(
                buyer.trader,
                instrument.quote,
                fixed_point::notional(exec_quantity, exec_price),
            );
            self.wallets
                .credit(buyer.trader, instrument.base, exec_quantity);
            self.wallets.credit(
                seller.trader,
                instrument.quote,
                fixed_point::notional(exec_quantity, exec_price),
            );

            notices.push(ExecutionNotice {
                trader: buyer.trader,
                event: EventKind::Execution,
                id: buyer.id,
                symbol: order.symbol,
                side: Side::Buy,
                quantity: exec_quantity,
                price: exec_price,
            });
            notices.push(ExecutionNotice {
                trader: seller.trader,
                event: EventKind::Execution,
                id: seller.id,
                symbol: order.symbol,
                side: Side::Sell,
                quantity: exec_quantity,
                price: exec_price,
            });
        }

        if !order.is_filled() {
            book.side_mut(order.side).insert(order);
        }
        true
    }
}

fn rejection(order: &Order, event: EventKind) -> ExecutionNotice {
    ExecutionNotice {
        trader: order.trader,
        event,
        id: order.id,
        symbol: order.symbol,
        side: order.side,
        quantity: order.quantity,
        price: order.price,
    }
}
