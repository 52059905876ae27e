//! Per-execution state shared with compiled code.

use crate::{
    bytecode::EvmModule,
    cache::ExecutionCache,
    call_frame::Message,
    constants::MAX_REQUIRED_MEMORY_SIZE,
    errors::{ExceptionalHalt, VMError},
    host::Host,
    memory,
    revision::Revision,
};

/// How a compiled execution finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Revert,
}

/// The state a compiled module executes against: gas, linear memory, the
/// message stack, the return-data buffer and the per-execution cache.
///
/// Runtime functions receive a raw pointer to this and mutate it directly,
/// the same way the emitted code does. Errors cannot unwind through
/// compiled frames, so a failing runtime function records its error in
/// `halt` and the entry surface inspects it after control returns.
pub struct EvmInstance {
    module: *const EvmModule,
    host: *mut dyn Host,
    revision: Revision,
    gas_left: u64,
    gas_refund: u64,
    memory: Vec<u8>,
    return_data: Vec<u8>,
    message_stack: Vec<Message>,
    cache: ExecutionCache,
    exit_status: Option<ExitStatus>,
    halt: Option<VMError>,
}

impl EvmInstance {
    /// # Safety
    ///
    /// `module` and `host` must stay alive and unaliased for the whole
    /// lifetime of the instance; the instance must only be used on the
    /// thread that created it.
    pub unsafe fn new(
        module: *const EvmModule,
        host: *mut dyn Host,
        message: Message,
        revision: Revision,
    ) -> Self {
        let gas_left = message.gas;
        Self {
            module,
            host,
            revision,
            gas_left,
            gas_refund: 0,
            memory: Vec::new(),
            return_data: Vec::new(),
            message_stack: vec![message],
            cache: ExecutionCache::default(),
            exit_status: None,
            halt: None,
        }
    }

    pub fn module(&self) -> &EvmModule {
        // SAFETY: the constructor contract guarantees the module outlives us.
        unsafe { &*self.module }
    }

    pub fn host(&self) -> &dyn Host {
        // SAFETY: see the constructor contract.
        unsafe { &*self.host }
    }

    pub fn host_mut(&mut self) -> &mut dyn Host {
        // SAFETY: see the constructor contract.
        unsafe { &mut *self.host }
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn cache_mut(&mut self) -> &mut ExecutionCache {
        &mut self.cache
    }

    // ==================== Message stack ====================

    pub fn push_message(&mut self, message: Message) {
        self.message_stack.push(message);
    }

    pub fn pop_message(&mut self) {
        self.message_stack.pop();
    }

    pub fn current_message(&self) -> Option<&Message> {
        self.message_stack.last()
    }

    pub fn is_static_mode(&self) -> bool {
        self.current_message().is_some_and(|msg| msg.is_static)
    }

    // ==================== Gas ====================

    pub fn gas_left(&self) -> u64 {
        self.gas_left
    }

    pub fn gas_refund(&self) -> u64 {
        self.gas_refund
    }

    pub fn charge_gas(&mut self, cost: u64) -> Result<(), VMError> {
        self.gas_left = self
            .gas_left
            .checked_sub(cost)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        Ok(())
    }

    /// Applies a signed refund delta, saturating at zero.
    pub fn add_gas_refund(&mut self, delta: i64) {
        if delta >= 0 {
            self.gas_refund = self.gas_refund.saturating_add(delta.unsigned_abs());
        } else {
            self.gas_refund = self.gas_refund.saturating_sub(delta.unsigned_abs());
        }
    }

    // ==================== Memory ====================

    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Vec<u8> {
        &mut self.memory
    }

    /// Charges for growing the linear memory to `required_size` bytes.
    pub fn consume_memory_expansion_gas(&mut self, required_size: u64) -> Result<(), VMError> {
        let required: usize = required_size
            .try_into()
            .map_err(|_| ExceptionalHalt::TooLargeRequiredMemory)?;
        if required > MAX_REQUIRED_MEMORY_SIZE {
            return Err(ExceptionalHalt::TooLargeRequiredMemory.into());
        }
        let cost = memory::expansion_cost(required, self.memory.len())?;
        self.charge_gas(cost)
    }

    /// Grows the linear memory to `required_size` bytes, zero filled and
    /// rounded up to a whole word.
    pub fn expand_memory(&mut self, required_size: u64) -> Result<(), VMError> {
        let required: usize = required_size
            .try_into()
            .map_err(|_| ExceptionalHalt::TooLargeRequiredMemory)?;
        if required > MAX_REQUIRED_MEMORY_SIZE {
            return Err(ExceptionalHalt::TooLargeRequiredMemory.into());
        }
        if required > self.memory.len() {
            let new_size = required
                .checked_next_multiple_of(32)
                .ok_or(ExceptionalHalt::TooLargeRequiredMemory)?;
            self.memory.resize(new_size, 0);
        }
        Ok(())
    }

    // ==================== Return data & termination ====================

    pub fn return_data(&self) -> &[u8] {
        &self.return_data
    }

    pub fn set_return_data(&mut self, data: Vec<u8>) {
        self.return_data = data;
    }

    /// Terminates the compiled execution with the given status.
    pub fn exit(&mut self, status: ExitStatus) {
        self.exit_status = Some(status);
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Records an error raised inside a runtime function. The first error
    /// wins; later ones on the unwind path are ignored.
    pub fn halt(&mut self, error: VMError) {
        if self.halt.is_none() {
            self.halt = Some(error);
        }
        self.gas_left = 0;
        self.gas_refund = 0;
    }

    pub fn take_halt(&mut self) -> Option<VMError> {
        self.halt.take()
    }

    // ==================== Memoised host queries ====================
    //
    // These split the raw host pointer from the cache borrow so lookups can
    // read the host while inserting into the cache.

    pub fn tx_context(&mut self) -> crate::host::TxContext {
        // SAFETY: see the constructor contract.
        let host = unsafe { &*self.host };
        self.cache.tx_context(host).clone()
    }

    pub fn cached_block_hash(&mut self, block_number: u64) -> &[u8; 32] {
        // SAFETY: see the constructor contract.
        let host = unsafe { &*self.host };
        self.cache.block_hash(host, block_number)
    }

    pub fn cached_blob_hash(&mut self, index: u64) -> &[u8; 32] {
        // SAFETY: see the constructor contract.
        let host = unsafe { &*self.host };
        self.cache.blob_hash(host, index)
    }

    /// 32-byte calldata window at `offset`, cached per (message, offset).
    pub fn cached_calldata_word(&mut self, offset: u64) -> &[u8; 32] {
        let (depth, input) = match self.message_stack.last() {
            Some(msg) => (msg.depth, msg.input.clone()),
            None => (0, bytes::Bytes::new()),
        };
        self.cache.calldata_word(depth, offset, &input)
    }

    /// Interns a 32-byte value whose pointer must survive the opcode.
    pub fn intern_bytes32(&mut self, bytes: [u8; 32]) -> &[u8; 32] {
        self.cache.intern(bytes)
    }
}
