//! The bytecode-to-MIR compiler frontend.
//!
//! Bytecode is decoded in a single linear pass ([`visitor`]) against an
//! operand stack that shadows the EVM stack at compile time. Arithmetic,
//! bitwise, shift and comparison opcodes lower to inline four-limb
//! sequences ([`builder`]); everything that touches memory, storage or the
//! host lowers to a call into the runtime function table. Lowering the
//! resulting [`mir`] to machine code is the backend's business.

pub mod builder;
pub mod mir;
pub mod operand;
pub mod visitor;

pub use visitor::compile_module;
