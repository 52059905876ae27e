use ethereum_types::U256;

pub const WORD_SIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

pub const STACK_LIMIT: usize = 1024;

pub const CALL_DEPTH_LIMIT: u32 = 1024;

pub const MEMORY_EXPANSION_QUOTIENT: usize = 512;

/// Ceiling on the memory a single frame may reference. Requests above it
/// fail with `TooLargeRequiredMemory` before any gas is charged.
pub const MAX_REQUIRED_MEMORY_SIZE: usize = 1024 * 1024;

/// Basic execution cost deducted when the top-level frame is allocated.
pub const TX_BASE_COST: u64 = 21000;

/// EIP-3860 ceiling on the size of creation initcode.
pub const INIT_CODE_MAX_SIZE: usize = 49152;

/// Trailing STOP bytes appended to every module: 32 for the widest possible
/// missing PUSH32 immediate, plus one terminating instruction.
pub const CODE_PADDING: usize = 33;

pub const SUCCESS: U256 = U256([1, 0, 0, 0]);
pub const FAIL: U256 = U256::zero();

pub const TWO_FIFTY_SIX: U256 = U256([256, 0, 0, 0]);

/// BLOCKHASH reaches at most this many blocks into the past.
pub const LAST_AVAILABLE_BLOCK_LIMIT: U256 = U256([256, 0, 0, 0]);
