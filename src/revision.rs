use serde::{Deserialize, Serialize};

/// A named point in EVM evolution.
///
/// Ordering matters: gas schedules and opcode availability are selected with
/// range comparisons such as `revision >= Revision::Berlin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Revision {
    Frontier,
    Homestead,
    Tangerine,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    #[default]
    Cancun,
}

impl Revision {
    /// Divisor applied when capping the gas refund paid out on clean return.
    /// EIP-3529 lowered the cap from `gas_used / 2` to `gas_used / 5`.
    pub const fn refund_quotient(self) -> u64 {
        if self as u8 >= Revision::London as u8 {
            5
        } else {
            2
        }
    }
}
