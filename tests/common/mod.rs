//! A recursive in-memory host for integration tests.
//!
//! Implements the full host contract over hash maps: EIP-2929 access
//! tracking, EIP-2200 storage transition statuses computed from the
//! (original, current, new) triple, and a `call` that services sub-calls by
//! running a nested interpreter over the callee's code, rolling state back
//! when the callee reverts or fails.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};
use zevm::{
    call_frame::{CallKind, Message},
    host::{AccessStatus, CallResult, CallStatus, StorageStatus, TxContext},
    EvmModule, Host, Revision, TxResult, Vm,
};

#[derive(Debug, Clone, Default)]
pub struct Account {
    pub balance: U256,
    pub code: Vec<u8>,
    pub storage: HashMap<U256, U256>,
}

pub struct MockHost {
    pub accounts: HashMap<Address, Account>,
    /// Storage values as of the start of the transaction, recorded on first
    /// access; the SSTORE status computation needs them.
    original_storage: HashMap<(Address, U256), U256>,
    transient: HashMap<(Address, U256), U256>,
    accessed_accounts: HashSet<Address>,
    accessed_slots: HashSet<(Address, U256)>,
    pub logs: Vec<(Address, Vec<u8>, Vec<H256>)>,
    pub selfdestructs: Vec<(Address, Address)>,
    pub tx_context: TxContext,
    pub revision: Revision,
    /// Deepest sub-call depth observed.
    pub max_depth: u32,
    create_counter: u64,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            original_storage: HashMap::new(),
            transient: HashMap::new(),
            accessed_accounts: HashSet::new(),
            accessed_slots: HashSet::new(),
            logs: Vec::new(),
            selfdestructs: Vec::new(),
            tx_context: TxContext {
                block_number: 12345,
                block_timestamp: 1_234_567_890,
                block_gas_limit: 30_000_000,
                chain_id: U256::one(),
                ..TxContext::default()
            },
            revision: Revision::Cancun,
            max_depth: 0,
            create_counter: 0,
        }
    }
}

impl MockHost {
    pub fn with_account(mut self, address: Address, account: Account) -> Self {
        self.accounts.insert(address, account);
        self
    }

    pub fn storage_value(&self, address: Address, key: U256) -> U256 {
        self.accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key))
            .copied()
            .unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) {
        if value.is_zero() || from == to {
            return;
        }
        if let Some(sender) = self.accounts.get_mut(&from) {
            sender.balance = sender.balance.saturating_sub(value);
        }
        let recipient = self.accounts.entry(to).or_default();
        recipient.balance = recipient.balance.saturating_add(value);
    }

    fn next_create_address(&mut self) -> Address {
        self.create_counter += 1;
        Address::from_low_u64_be(0xC0DE_0000 + self.create_counter)
    }

    /// The EIP-2200 transition classification over (original, current, new).
    fn storage_status(original: U256, current: U256, value: U256) -> StorageStatus {
        if current == value {
            return StorageStatus::Assigned;
        }
        if current == original {
            if original.is_zero() {
                StorageStatus::Added
            } else if value.is_zero() {
                StorageStatus::Deleted
            } else {
                StorageStatus::Modified
            }
        } else if original.is_zero() {
            if value.is_zero() {
                StorageStatus::AddedDeleted
            } else {
                StorageStatus::Assigned
            }
        } else if current.is_zero() {
            if value == original {
                StorageStatus::DeletedRestored
            } else {
                StorageStatus::DeletedAdded
            }
        } else if value.is_zero() {
            StorageStatus::ModifiedDeleted
        } else if value == original {
            StorageStatus::ModifiedRestored
        } else {
            StorageStatus::Assigned
        }
    }

    fn run_nested(&mut self, code: &[u8], message: Message) -> Option<zevm::ExecutionReport> {
        let module = EvmModule::from_bytes(code).ok()?;
        let revision = self.revision;
        let mut vm = Vm::new(&module, self, message, revision).ok()?;
        vm.execute().ok()
    }
}

impl Host for MockHost {
    fn account_exists(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    fn access_account(&mut self, address: Address) -> AccessStatus {
        if self.accessed_accounts.insert(address) {
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    fn access_storage(&mut self, address: Address, key: U256) -> AccessStatus {
        if self.accessed_slots.insert((address, key)) {
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    fn get_storage(&self, address: Address, key: U256) -> U256 {
        self.storage_value(address, key)
    }

    fn set_storage(&mut self, address: Address, key: U256, value: U256) -> StorageStatus {
        let current = self.storage_value(address, key);
        let original = *self
            .original_storage
            .entry((address, key))
            .or_insert(current);

        self.accounts
            .entry(address)
            .or_default()
            .storage
            .insert(key, value);

        Self::storage_status(original, current, value)
    }

    fn get_transient_storage(&self, address: Address, key: U256) -> U256 {
        self.transient
            .get(&(address, key))
            .copied()
            .unwrap_or_default()
    }

    fn set_transient_storage(&mut self, address: Address, key: U256, value: U256) {
        self.transient.insert((address, key), value);
    }

    fn get_balance(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    fn get_code_size(&self, address: Address) -> u64 {
        self.accounts
            .get(&address)
            .map(|account| account.code.len() as u64)
            .unwrap_or_default()
    }

    fn get_code_hash(&self, address: Address) -> H256 {
        use sha3::{Digest, Keccak256};
        match self.accounts.get(&address) {
            Some(account) => H256(Keccak256::digest(&account.code).into()),
            None => H256::zero(),
        }
    }

    fn copy_code(&self, address: Address, offset: usize, buf: &mut [u8]) -> usize {
        let code = match self.accounts.get(&address) {
            Some(account) => &account.code,
            None => return 0,
        };
        let src = code.get(offset..).unwrap_or_default();
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        n
    }

    fn selfdestruct(&mut self, address: Address, beneficiary: Address) {
        let balance = self.get_balance(address);
        self.transfer(address, beneficiary, balance);
        self.selfdestructs.push((address, beneficiary));
    }

    fn call(&mut self, message: &Message) -> CallResult {
        self.max_depth = self.max_depth.max(message.depth);

        // Roll back state when the callee does not complete cleanly.
        let snapshot = (self.accounts.clone(), self.transient.clone());

        match message.kind {
            CallKind::Create | CallKind::Create2 => {
                let created = self.next_create_address();
                self.transfer(message.sender, created, message.value);

                let mut child = message.clone();
                child.recipient = created;
                child.code_address = created;
                let initcode = message.input.to_vec();
                let report = self.run_nested(&initcode, child);

                match report {
                    Some(report) if report.result == TxResult::Success => {
                        self.accounts.entry(created).or_default().code =
                            report.output.to_vec();
                        CallResult {
                            status: CallStatus::Success,
                            gas_left: report.gas_left,
                            gas_refund: report.gas_refunded,
                            output: Bytes::new(),
                            create_address: Some(created),
                        }
                    }
                    Some(report) if report.result == TxResult::Revert => {
                        self.accounts = snapshot.0;
                        self.transient = snapshot.1;
                        CallResult {
                            status: CallStatus::Revert,
                            gas_left: report.gas_left,
                            gas_refund: 0,
                            output: report.output,
                            create_address: None,
                        }
                    }
                    _ => {
                        self.accounts = snapshot.0;
                        self.transient = snapshot.1;
                        CallResult::failure()
                    }
                }
            }
            _ => {
                if message.kind == CallKind::Call {
                    self.transfer(message.sender, message.recipient, message.value);
                }

                let code = self
                    .accounts
                    .get(&message.code_address)
                    .map(|account| account.code.clone())
                    .unwrap_or_default();
                if code.is_empty() {
                    // Calling an account without code succeeds vacuously.
                    return CallResult {
                        status: CallStatus::Success,
                        gas_left: message.gas,
                        gas_refund: 0,
                        output: Bytes::new(),
                        create_address: None,
                    };
                }

                match self.run_nested(&code, message.clone()) {
                    Some(report) => {
                        let status = match report.result {
                            TxResult::Success => CallStatus::Success,
                            TxResult::Revert => CallStatus::Revert,
                            TxResult::Halt(_) => CallStatus::Failure,
                        };
                        if status != CallStatus::Success {
                            self.accounts = snapshot.0;
                            self.transient = snapshot.1;
                        }
                        CallResult {
                            status,
                            gas_left: report.gas_left,
                            gas_refund: report.gas_refunded,
                            output: report.output,
                            create_address: None,
                        }
                    }
                    None => {
                        self.accounts = snapshot.0;
                        self.transient = snapshot.1;
                        CallResult::failure()
                    }
                }
            }
        }
    }

    fn get_tx_context(&self) -> TxContext {
        self.tx_context.clone()
    }

    fn get_block_hash(&self, block_number: u64) -> H256 {
        H256::from_low_u64_be(block_number.wrapping_mul(0x0101))
    }

    fn emit_log(&mut self, address: Address, data: &[u8], topics: &[H256]) {
        self.logs.push((address, data.to_vec(), topics.to_vec()));
    }
}

/// Runs `code` as a top-level execution against a fresh mock host.
pub fn run_code(code: &[u8], gas: u64) -> zevm::ExecutionReport {
    let mut host = MockHost::default();
    run_code_with_host(code, gas, &mut host)
}

pub fn run_code_with_host(code: &[u8], gas: u64, host: &mut MockHost) -> zevm::ExecutionReport {
    let module = EvmModule::from_bytes(code).expect("test bytecode must not be empty");
    let message = Message::top_level(
        Address::from_low_u64_be(0xAA),
        Address::from_low_u64_be(0xBB),
        U256::zero(),
        Bytes::new(),
        gas,
    );
    let revision = host.revision;
    let mut vm = Vm::new(&module, host, message, revision).expect("gas covers the basic cost");
    vm.execute().expect("no internal errors in tests")
}
