//! The interpreter driver.

use crate::{
    bytecode::EvmModule,
    cache::ExecutionCache,
    call_frame::{CallFrame, Message},
    errors::{ExceptionalHalt, ExecutionReport, OpcodeResult, TxResult, VMError},
    host::{Host, TxContext},
    opcodes::opcode_table,
    revision::Revision,
};
use bytes::Bytes;
use tracing::trace;

/// Why the current frame is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameOutcome {
    Success,
    Revert,
    Fatal(ExceptionalHalt),
}

/// One EVM execution over one module.
///
/// The frame stack is split into the frame being executed and its suspended
/// parents; handlers reach the active frame directly through
/// `current_call_frame`.
pub struct Vm<'a> {
    pub current_call_frame: CallFrame,
    pub call_frames: Vec<CallFrame>,
    pub module: &'a EvmModule,
    pub host: &'a mut dyn Host,
    pub cache: ExecutionCache,
    /// Output of the most recent sub-call, RETURN or REVERT, as seen by
    /// RETURNDATASIZE and RETURNDATACOPY in the active frame.
    pub return_data: Bytes,
    pub revision: Revision,
}

impl<'a> Vm<'a> {
    /// Sets up an execution for `message`. Fails with `OutOfGas` if the
    /// supplied gas cannot cover the basic execution cost of a top-level
    /// frame.
    pub fn new(
        module: &'a EvmModule,
        host: &'a mut dyn Host,
        message: Message,
        revision: Revision,
    ) -> Result<Self, VMError> {
        let current_call_frame = CallFrame::new(message, revision)?;
        Ok(Self {
            current_call_frame,
            call_frames: Vec::new(),
            module,
            host,
            cache: ExecutionCache::default(),
            return_data: Bytes::new(),
            revision,
        })
    }

    /// Main dispatch loop. Fetches the byte at `pc`, dispatches through the
    /// revision's opcode table and advances `pc` unless the handler jumped.
    /// Runs until the frame stack drains.
    pub fn execute(&mut self) -> Result<ExecutionReport, VMError> {
        loop {
            let opcode = self.next_opcode();
            #[expect(clippy::indexing_slicing, reason = "a u8 index cannot exceed 255")]
            let op_result = opcode_table(self.revision)[usize::from(opcode)].call(self);

            match op_result {
                Ok(OpcodeResult::Continue { pc_increment }) => {
                    self.current_call_frame.pc =
                        self.current_call_frame.pc.wrapping_add(pc_increment);
                }
                Ok(OpcodeResult::Halt) => {
                    if let Some(report) = self.exit_frame(FrameOutcome::Success) {
                        return Ok(report);
                    }
                }
                Err(VMError::RevertOpcode) => {
                    if let Some(report) = self.exit_frame(FrameOutcome::Revert) {
                        return Ok(report);
                    }
                }
                Err(VMError::Internal(error)) => return Err(error.into()),
                Err(VMError::ExceptionalHalt(halt)) => {
                    trace!(?halt, pc = self.current_call_frame.pc, "frame halted");
                    if let Some(report) = self.exit_frame(FrameOutcome::Fatal(halt)) {
                        return Ok(report);
                    }
                }
            }
        }
    }

    #[inline]
    fn next_opcode(&self) -> u8 {
        // The module is padded with STOP bytes, so running off the code end
        // terminates cleanly even without this fallback.
        self.module
            .code()
            .get(self.current_call_frame.pc)
            .copied()
            .unwrap_or(0)
    }

    /// Frees the active frame. On success the refund is capped at
    /// `gas_used / quotient`; a revert keeps the remaining gas but forfeits
    /// the refund; a fatal halt forfeits both and clears the output. When a
    /// suspended parent exists it is resumed and credited; otherwise the
    /// final report is produced.
    pub(crate) fn exit_frame(&mut self, outcome: FrameOutcome) -> Option<ExecutionReport> {
        let frame = &mut self.current_call_frame;

        let (gas_left, refund) = match outcome {
            FrameOutcome::Success => {
                let cap = frame.gas_used() / frame.revision.refund_quotient();
                (frame.gas_left, frame.gas_refund.min(cap))
            }
            FrameOutcome::Revert => (frame.gas_left, 0),
            FrameOutcome::Fatal(_) => {
                frame.output = Bytes::new();
                (0, 0)
            }
        };
        let gas_limit = frame.gas_limit;
        let output = std::mem::take(&mut frame.output);

        match self.call_frames.pop() {
            Some(parent) => {
                self.current_call_frame = parent;
                self.current_call_frame.gas_left =
                    self.current_call_frame.gas_left.saturating_add(gas_left);
                self.current_call_frame.gas_refund =
                    self.current_call_frame.gas_refund.saturating_add(refund);
                self.return_data = output;
                None
            }
            None => {
                let result = match outcome {
                    FrameOutcome::Success => TxResult::Success,
                    FrameOutcome::Revert => TxResult::Revert,
                    FrameOutcome::Fatal(halt) => TxResult::Halt(halt),
                };
                Some(ExecutionReport {
                    result,
                    gas_used: gas_limit
                        .saturating_sub(gas_left)
                        .saturating_sub(refund),
                    gas_left,
                    gas_refunded: refund,
                    output,
                })
            }
        }
    }

    /// The memoised transaction context.
    pub fn tx_context(&mut self) -> TxContext {
        self.cache.tx_context(self.host).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        call_frame::CallKind,
        constants::TX_BASE_COST,
        host::{AccessStatus, CallResult, StorageStatus},
    };
    use ethereum_types::{Address, H256, U256};

    struct NullHost;

    impl Host for NullHost {
        fn account_exists(&self, _address: Address) -> bool {
            false
        }
        fn access_account(&mut self, _address: Address) -> AccessStatus {
            AccessStatus::Warm
        }
        fn access_storage(&mut self, _address: Address, _key: U256) -> AccessStatus {
            AccessStatus::Warm
        }
        fn get_storage(&self, _address: Address, _key: U256) -> U256 {
            U256::zero()
        }
        fn set_storage(&mut self, _address: Address, _key: U256, _value: U256) -> StorageStatus {
            StorageStatus::Assigned
        }
        fn get_transient_storage(&self, _address: Address, _key: U256) -> U256 {
            U256::zero()
        }
        fn set_transient_storage(&mut self, _address: Address, _key: U256, _value: U256) {}
        fn get_balance(&self, _address: Address) -> U256 {
            U256::zero()
        }
        fn get_code_size(&self, _address: Address) -> u64 {
            0
        }
        fn get_code_hash(&self, _address: Address) -> H256 {
            H256::zero()
        }
        fn copy_code(&self, _address: Address, _offset: usize, _buf: &mut [u8]) -> usize {
            0
        }
        fn selfdestruct(&mut self, _address: Address, _beneficiary: Address) {}
        fn call(&mut self, _message: &Message) -> CallResult {
            CallResult::failure()
        }
        fn get_tx_context(&self) -> TxContext {
            TxContext::default()
        }
        fn get_block_hash(&self, _block_number: u64) -> H256 {
            H256::zero()
        }
        fn emit_log(&mut self, _address: Address, _data: &[u8], _topics: &[H256]) {}
    }

    fn sub_message(gas: u64) -> Message {
        Message {
            kind: CallKind::Call,
            is_static: false,
            depth: 1,
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
    fn top_level_execution_creates_one_frame_minus_basic_cost() {
        let module = EvmModule::from_bytes(&[0x00]).unwrap();
        let mut host = NullHost;
        let message =
            Message::top_level(Address::zero(), Address::zero(), U256::zero(), Bytes::new(), 50_000);
        let vm = Vm::new(&module, &mut host, message, Revision::Cancun).unwrap();
        assert_eq!(vm.current_call_frame.gas_left, 50_000 - TX_BASE_COST);
        assert!(vm.call_frames.is_empty());
    }

    #[test]
    fn exit_frame_credits_suspended_parent() {
        let module = EvmModule::from_bytes(&[0x00]).unwrap();
        let mut host = NullHost;
        let message =
            Message::top_level(Address::zero(), Address::zero(), U256::zero(), Bytes::new(), 50_000);
        let mut vm = Vm::new(&module, &mut host, message, Revision::Cancun).unwrap();

        let parent_gas = vm.current_call_frame.gas_left;
        let child = CallFrame::new(sub_message(10_000), Revision::Cancun).unwrap();
        let parent = std::mem::replace(&mut vm.current_call_frame, child);
        vm.call_frames.push(parent);

        vm.current_call_frame.increase_consumed_gas(4_000).unwrap();
        vm.current_call_frame.gas_refund = 100_000;
        assert!(vm.exit_frame(FrameOutcome::Success).is_none());

        // Child used 4000 gas, so its refund is capped at 800.
        assert_eq!(vm.current_call_frame.gas_left, parent_gas + 6_000);
        assert_eq!(vm.current_call_frame.gas_refund, 4_000 / 5);
    }

    #[test]
    fn fatal_exit_zeroes_gas_refund_and_output() {
        let module = EvmModule::from_bytes(&[0x00]).unwrap();
        let mut host = NullHost;
        let message =
            Message::top_level(Address::zero(), Address::zero(), U256::zero(), Bytes::new(), 50_000);
        let mut vm = Vm::new(&module, &mut host, message, Revision::Cancun).unwrap();
        vm.current_call_frame.output = Bytes::from_static(b"leftover");
        vm.current_call_frame.gas_refund = 42;

        let report = vm
            .exit_frame(FrameOutcome::Fatal(ExceptionalHalt::OutOfGas))
            .unwrap();
        assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::OutOfGas));
        assert_eq!(report.gas_left, 0);
        assert_eq!(report.gas_refunded, 0);
        assert!(report.output.is_empty());
        assert_eq!(report.gas_used, 50_000);
    }

    #[test]
    fn revert_exit_keeps_gas_but_not_refund() {
        let module = EvmModule::from_bytes(&[0x00]).unwrap();
        let mut host = NullHost;
        let message =
            Message::top_level(Address::zero(), Address::zero(), U256::zero(), Bytes::new(), 50_000);
        let mut vm = Vm::new(&module, &mut host, message, Revision::Cancun).unwrap();
        vm.current_call_frame.gas_refund = 4_800;

        let report = vm.exit_frame(FrameOutcome::Revert).unwrap();
        assert_eq!(report.result, TxResult::Revert);
        assert_eq!(report.gas_left, 50_000 - TX_BASE_COST);
        assert_eq!(report.gas_refunded, 0);
        assert_eq!(report.gas_used, TX_BASE_COST);
    }
}
