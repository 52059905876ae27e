//! Compile-time operands: what the operand stack holds while bytecode is
//! being translated.

use crate::compiler::mir::{ValueId, VarId};
use ethereum_types::U256;

/// The EVM-level type of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmType {
    Void,
    Uint8,
    Uint32,
    /// Stack offsets, sizes, program counters.
    Uint64,
    /// The native EVM word, always carried as four i64 limbs.
    Uint256,
    /// A 20-byte account address.
    Address,
    /// A pointer to a 32-byte big-endian blob returned by a runtime
    /// function; consumed by limb reassembly.
    Bytes32,
}

/// One entry of the compile-time operand stack.
///
/// 256-bit values come in three flavours: constants (materialised into MIR
/// only when used), four instruction limbs, and four variable slots for
/// values that must survive a control-flow edge. Anything semantically
/// smaller is a single typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No value; the sentinel the visitor uses for void results.
    Empty,
    /// A constant word, not yet in the MIR.
    Const(U256),
    /// Four i64 limbs, little-endian: `[low, mid_low, mid_high, high]`.
    Limbs([ValueId; 4]),
    /// Four variable slots holding the limbs of a spilled value.
    VarLimbs([VarId; 4]),
    /// A single value of a narrower type.
    Typed { value: ValueId, ty: EvmType },
}

impl Operand {
    /// A single typed value. Multi-limb shapes are reserved for `Uint256`,
    /// which this constructor rejects.
    pub fn typed(value: ValueId, ty: EvmType) -> Self {
        debug_assert!(
            ty != EvmType::Uint256,
            "a 256-bit operand must be Limbs, VarLimbs or Const"
        );
        Operand::Typed { value, ty }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Operand::Empty)
    }
}
