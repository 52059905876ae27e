//! # zevm
//!
//! An EVM execution engine built from two cooperating subsystems:
//!
//! - **Interpreter**: a stack machine over 256-bit words that executes EVM
//!   bytecode against a pluggable [`host::Host`], with precise gas
//!   accounting, lazily expanded memory, storage access per EIP-2200/2929,
//!   and full call-frame management.
//! - **Compiler frontend**: a translator from EVM bytecode to a
//!   register-based machine IR (MIR) in which every 256-bit value is four
//!   64-bit limbs. Cheap opcodes lower to inline limb arithmetic; heavy
//!   opcodes lower to calls into a statically laid out runtime function
//!   table that reuses the interpreter's semantics.
//!
//! Both subsystems share the opcode set, the gas schedule, the U256
//! arithmetic helpers and the host interface.
//!
//! ## Usage
//!
//! ```ignore
//! use zevm::{EvmModule, Revision, Vm, call_frame::Message};
//!
//! let module = EvmModule::from_bytes(&code)?;
//! let message = Message::top_level(sender, recipient, value, calldata, gas);
//! let mut vm = Vm::new(&module, &mut host, message, Revision::Cancun);
//! let report = vm.execute()?;
//! ```

pub mod arith;
pub mod bytecode;
pub mod cache;
pub mod call_frame;
pub mod compiler;
pub mod constants;
pub mod errors;
pub mod gas_cost;
pub mod gas_schedule;
pub mod host;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod revision;
pub mod runtime;
pub mod stack;
pub mod utils;
pub mod vm;

pub use bytecode::EvmModule;
pub use errors::{ExceptionalHalt, ExecutionReport, TxResult, VMError};
pub use host::Host;
pub use revision::Revision;
pub use vm::Vm;
