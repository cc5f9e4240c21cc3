//! The rollup output port and its back-ends.
//!
//! The kernel emits notices, vouchers, and reports through [`OutputPort`]
//! and never cares which transport carries them. [`MemoryPort`] collects
//! them in memory for tests and embedders; [`replay`] implements the
//! file-based harness used to drive the exchange from recorded inputs.

pub mod replay;

use std::io;

use crate::core::types::EthAddress;

/// Abstract sink for the three kernel output kinds.
///
/// Per input, notices and vouchers must be delivered in emission order;
/// reports are the sole output of inspects.
pub trait OutputPort {
    /// Informational, ordered, per-input.
    fn emit_notice(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Outbound on-chain action addressed to `destination`.
    fn emit_voucher(&mut self, destination: EthAddress, payload: &[u8]) -> io::Result<()>;

    /// Reply to an inspect query.
    fn emit_report(&mut self, payload: &[u8]) -> io::Result<()>;
}

/// Collects outputs in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryPort {
    pub notices: Vec<Vec<u8>>,
    pub vouchers: Vec<(EthAddress, Vec<u8>)>,
    pub reports: Vec<Vec<u8>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputPort for MemoryPort {
    fn emit_notice(&mut self, payload: &[u8]) -> io::Result<()> {
        self.notices.push(payload.to_vec());
        Ok(())
    }

    fn emit_voucher(&mut self, destination: EthAddress, payload: &[u8]) -> io::Result<()> {
        self.vouchers.push((destination, payload.to_vec()));
        Ok(())
    }

    fn emit_report(&mut self, payload: &[u8]) -> io::Result<()> {
        self.reports.push(payload.to_vec());
        Ok(())
    }
}
