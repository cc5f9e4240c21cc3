//! Trader wallets: token balances keyed by trader address.
//!
//! Balances are plain u64 fixed-point. Wallets and token entries are created
//! lazily on first credit and never destroyed; a drained entry stays at zero.
//! `BTreeMap`s keep snapshot iteration in token-address order.

use std::collections::BTreeMap;

use crate::core::types::{Currency, EthAddress};

/// One trader's balances, token address to amount.
pub type Wallet = BTreeMap<EthAddress, Currency>;

/// Every trader wallet in the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wallets {
    wallets: BTreeMap<EthAddress, Wallet>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` of `token` to the trader's wallet, creating the wallet
    /// and the token entry as needed. Never fails.
    pub fn credit(&mut self, trader: EthAddress, token: EthAddress, amount: Currency) {
        let balance = self
            .wallets
            .entry(trader)
            .or_default()
            .entry(token)
            .or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Subtract `amount` of `token` from the trader's wallet.
    ///
    /// Callers MUST have checked the balance first; reservations in the
    /// matching engine and the withdraw handler guarantee this. An uncovered
    /// debit is a kernel bug, so it is asserted in debug builds and clamped
    /// to zero in release rather than wrapping into a giant balance.
    pub fn debit(&mut self, trader: EthAddress, token: EthAddress, amount: Currency) {
        let balance = self
            .wallets
            .entry(trader)
            .or_default()
            .entry(token)
            .or_insert(0);
        debug_assert!(*balance >= amount, "debit exceeds balance");
        *balance = balance.saturating_sub(amount);
    }

    /// Balance of `token` held by `trader`; zero when either is unknown.
    pub fn balance(&self, trader: &EthAddress, token: &EthAddress) -> Currency {
        self.wallets
            .get(trader)
            .and_then(|wallet| wallet.get(token))
            .copied()
            .unwrap_or(0)
    }

    pub fn get(&self, trader: &EthAddress) -> Option<&Wallet> {
        self.wallets.get(trader)
    }

    /// All wallets in trader-address order.
    pub fn iter(&self) -> impl Iterator<Item = (&EthAddress, &Wallet)> {
        self.wallets.iter()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
