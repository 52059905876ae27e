//! The host interface: the only side-effecting dependency of the engine.
//!
//! Both the interpreter and the runtime function table reach accounts,
//! storage, logs and the transaction context exclusively through [`Host`].
//! A sub-call (`Host::call`) runs to completion before the caller resumes;
//! the host may service it by re-entering a fresh engine instance.

use crate::call_frame::Message;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

/// Result of an account or storage-slot access, per EIP-2929. The first
/// access in a transaction is cold and costs more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Cold,
    Warm,
}

impl AccessStatus {
    pub fn is_cold(self) -> bool {
        self == AccessStatus::Cold
    }
}

/// Effect of a storage write, classifying the transition between the
/// original (pre-transaction), current and new value of the slot. Indexes
/// the SSTORE cost and refund matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageStatus {
    /// No observable change: X -> X, or a dirty slot rewritten arbitrarily.
    Assigned,
    /// 0 -> X (X != 0) on a clean slot.
    Added,
    /// X -> 0 (X != 0) on a clean slot.
    Deleted,
    /// X -> Y (both non-zero, X != Y) on a clean slot.
    Modified,
    /// Slot deleted earlier in the transaction, now re-added.
    DeletedAdded,
    /// Slot modified earlier in the transaction, now deleted.
    ModifiedDeleted,
    /// Slot deleted earlier in the transaction, restored to its original.
    DeletedRestored,
    /// Slot added earlier in the transaction, now deleted again.
    AddedDeleted,
    /// Slot modified earlier in the transaction, restored to its original.
    ModifiedRestored,
}

/// Transaction and block context, fetched from the host once per execution
/// and cached.
#[derive(Debug, Clone, Default)]
pub struct TxContext {
    pub tx_gas_price: U256,
    pub tx_origin: Address,
    pub block_coinbase: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub block_gas_limit: u64,
    pub block_prev_randao: H256,
    pub chain_id: U256,
    pub block_base_fee: U256,
    pub blob_base_fee: U256,
    pub blob_hashes: Vec<H256>,
}

/// Status of a completed sub-call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Revert,
    Failure,
}

/// Result of `Host::call`.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub status: CallStatus,
    pub gas_left: u64,
    pub gas_refund: u64,
    pub output: Bytes,
    /// Address of the created contract for CREATE/CREATE2 messages.
    pub create_address: Option<Address>,
}

impl CallResult {
    pub fn failure() -> Self {
        Self {
            status: CallStatus::Failure,
            gas_left: 0,
            gas_refund: 0,
            output: Bytes::new(),
            create_address: None,
        }
    }
}

pub trait Host {
    fn account_exists(&self, address: Address) -> bool;

    /// Marks the account as touched and reports whether this was the first
    /// access in the transaction.
    fn access_account(&mut self, address: Address) -> AccessStatus;

    /// Marks the storage slot as touched and reports whether this was the
    /// first access in the transaction.
    fn access_storage(&mut self, address: Address, key: U256) -> AccessStatus;

    fn get_storage(&self, address: Address, key: U256) -> U256;

    fn set_storage(&mut self, address: Address, key: U256, value: U256) -> StorageStatus;

    fn get_transient_storage(&self, address: Address, key: U256) -> U256;

    fn set_transient_storage(&mut self, address: Address, key: U256, value: U256);

    fn get_balance(&self, address: Address) -> U256;

    fn get_code_size(&self, address: Address) -> u64;

    fn get_code_hash(&self, address: Address) -> H256;

    /// Copies up to `buf.len()` bytes of the account's code starting at
    /// `offset` and returns the number of bytes copied.
    fn copy_code(&self, address: Address, offset: usize, buf: &mut [u8]) -> usize;

    fn selfdestruct(&mut self, address: Address, beneficiary: Address);

    /// Executes a sub-call or contract creation to completion.
    fn call(&mut self, message: &Message) -> CallResult;

    fn get_tx_context(&self) -> TxContext;

    fn get_block_hash(&self, block_number: u64) -> H256;

    fn emit_log(&mut self, address: Address, data: &[u8], topics: &[H256]);
}
