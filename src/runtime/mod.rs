//! Execution state and imported functions backing compiled code.
//!
//! Compiled modules do not interpret opcodes; the heavy ones are lowered to
//! calls into [`imported::RuntimeFunctions`], which operate on an
//! [`instance::EvmInstance`] and reuse the interpreter's semantics.

// 256-bit values cross the call boundary as four-limb aggregates; the
// emitted code agrees with rustc on that layout, not with a C compiler.
#[allow(improper_ctypes_definitions)]
pub mod imported;
pub mod instance;
