//! Per-invocation execution state.

use crate::{
    constants::TX_BASE_COST,
    errors::{ExceptionalHalt, VMError},
    memory::Memory,
    revision::Revision,
    stack::Stack,
};
use bytes::Bytes;
use ethereum_types::{Address, U256};

/// The kind of invocation a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

/// Everything the callee learns about its invocation.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: CallKind,
    pub is_static: bool,
    pub depth: u32,
    /// Gas supplied to this invocation.
    pub gas: u64,
    pub recipient: Address,
    pub sender: Address,
    /// Account whose code runs. Differs from `recipient` for CALLCODE and
    /// DELEGATECALL.
    pub code_address: Address,
    pub value: U256,
    pub input: Bytes,
    /// Salt for CREATE2, zero otherwise.
    pub create2_salt: U256,
}

impl Message {
    /// A depth-0 message as produced by the transaction layer.
    pub fn top_level(
        sender: Address,
        recipient: Address,
        value: U256,
        input: Bytes,
        gas: u64,
    ) -> Self {
        Self {
            kind: CallKind::Call,
            is_static: false,
            depth: 0,
            gas,
            recipient,
            sender,
            code_address: recipient,
            value,
            input,
            create2_salt: U256::zero(),
        }
    }
}

/// One entry of the call stack: program counter, evaluation stack, memory
/// and gas accounting for a single invocation.
#[derive(Debug)]
pub struct CallFrame {
    pub pc: usize,
    pub stack: Stack,
    pub memory: Memory,
    pub gas_left: u64,
    /// Gas supplied on entry, before the basic execution cost.
    pub gas_limit: u64,
    pub gas_refund: u64,
    pub message: Message,
    pub revision: Revision,
    /// Output of this frame, set by RETURN and REVERT.
    pub output: Bytes,
}

impl CallFrame {
    /// Creates a frame for `message`. A depth-0 frame pays the basic
    /// execution cost up front; sub-frames pay nothing here.
    pub fn new(message: Message, revision: Revision) -> Result<Self, VMError> {
        let basic_cost = if message.depth == 0 { TX_BASE_COST } else { 0 };
        let gas_left = message
            .gas
            .checked_sub(basic_cost)
            .ok_or(ExceptionalHalt::OutOfGas)?;

        Ok(Self {
            pc: 0,
            stack: Stack::default(),
            memory: Memory::default(),
            gas_left,
            gas_limit: message.gas,
            gas_refund: 0,
            message,
            revision,
            output: Bytes::new(),
        })
    }

    #[inline]
    pub fn increase_consumed_gas(&mut self, cost: u64) -> Result<(), VMError> {
        self.gas_left = self
            .gas_left
            .checked_sub(cost)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        Ok(())
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_left)
    }

    pub fn is_static(&self) -> bool {
        self.message.is_static
    }

    /// Applies a signed refund delta. The counter never goes below zero; a
    /// negative delta takes back credit granted earlier in the transaction.
    pub fn apply_refund_delta(&mut self, delta: i64) {
        if delta >= 0 {
            self.gas_refund = self.gas_refund.saturating_add(delta.unsigned_abs());
        } else {
            self.gas_refund = self.gas_refund.saturating_sub(delta.unsigned_abs());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(depth: u32, gas: u64) -> Message {
        Message {
            kind: CallKind::Call,
            is_static: false,
            depth,
            gas,
            recipient: Address::zero(),
            sender: Address::zero(),
            code_address: Address::zero(),
            value: U256::zero(),
            input: Bytes::new(),
            create2_salt: U256::zero(),
        }
    }

    #[test]
    fn top_level_frame_pays_basic_cost() {
        let frame = CallFrame::new(message(0, 100_000), Revision::Cancun).unwrap();
        assert_eq!(frame.gas_left, 100_000 - TX_BASE_COST);
        assert_eq!(frame.gas_limit, 100_000);
        assert_eq!(frame.gas_used(), TX_BASE_COST);
    }

    #[test]
    fn sub_frame_pays_nothing() {
        let frame = CallFrame::new(message(3, 5000), Revision::Cancun).unwrap();
        assert_eq!(frame.gas_left, 5000);
    }

    #[test]
    fn insufficient_gas_for_basic_cost() {
        assert!(CallFrame::new(message(0, 20_999), Revision::Cancun).is_err());
    }

    #[test]
    fn refund_delta_saturates_at_zero() {
        let mut frame = CallFrame::new(message(1, 1000), Revision::Cancun).unwrap();
        frame.apply_refund_delta(4800);
        frame.apply_refund_delta(-10_000);
        assert_eq!(frame.gas_refund, 0);
        frame.apply_refund_delta(2900);
        assert_eq!(frame.gas_refund, 2900);
    }
}
