use crate::errors::{ExceptionalHalt, VMError};
use ethereum_types::{Address, H256, U256};

/// Interprets the low 20 bytes of a word as an address.
pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_big_endian();
    #[expect(clippy::indexing_slicing, reason = "12..32 of a 32-byte array")]
    Address::from_slice(&bytes[12..])
}

/// Zero-extends a 20-byte address into a word.
pub fn address_to_word(address: Address) -> U256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    U256::from_big_endian(&bytes)
}

pub fn u256_to_h256(value: U256) -> H256 {
    H256(value.to_big_endian())
}

pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    value
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber.into())
}

/// Converts a (size, offset) operand pair for a memory touch. A zero size
/// never touches memory, so the offset is ignored in that case; otherwise
/// both must fit the native width.
pub fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), VMError> {
    let size = usize::try_from(size).map_err(|_| ExceptionalHalt::TooLargeRequiredMemory)?;
    if size == 0 {
        return Ok((0, 0));
    }
    let offset = usize::try_from(offset).map_err(|_| ExceptionalHalt::TooLargeRequiredMemory)?;
    Ok((size, offset))
}
