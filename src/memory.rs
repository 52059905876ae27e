use crate::{
    constants::{MAX_REQUIRED_MEMORY_SIZE, MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_USIZE},
    errors::{ExceptionalHalt, InternalError, VMError},
};
use ExceptionalHalt::{OutOfGas, TooLargeRequiredMemory};
use ethereum_types::U256;

/// Frame-local byte memory. Starts empty, grows in whole words, never
/// shrinks while the frame is alive.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    buffer: Vec<u8>,
}

impl Memory {
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Grows the buffer to hold `new_memory_size` bytes, rounded up to a
    /// whole number of words. Gas for the expansion must already have been
    /// charged via [`expansion_cost`].
    pub fn resize(&mut self, new_memory_size: usize) -> Result<(), VMError> {
        if new_memory_size > MAX_REQUIRED_MEMORY_SIZE {
            return Err(TooLargeRequiredMemory.into());
        }
        if new_memory_size <= self.buffer.len() {
            return Ok(());
        }
        let new_size = new_memory_size
            .checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(InternalError::Overflow)?;
        self.buffer.resize(new_size, 0);
        Ok(())
    }

    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Vec<u8>, VMError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let end = offset.checked_add(size).ok_or(TooLargeRequiredMemory)?;
        self.resize(end)?;
        self.buffer
            .get(offset..end)
            .map(<[u8]>::to_vec)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess.into())
    }

    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let end = offset
            .checked_add(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(TooLargeRequiredMemory)?;
        self.resize(end)?;
        let bytes = self
            .buffer
            .get(offset..end)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?;
        Ok(U256::from_big_endian(bytes))
    }

    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        let end = offset
            .checked_add(data.len())
            .ok_or(TooLargeRequiredMemory)?;
        self.resize(end)?;
        self.buffer
            .get_mut(offset..end)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?
            .copy_from_slice(data);
        Ok(())
    }

    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        self.store_data(offset, &word.to_big_endian())
    }

    pub fn store_byte(&mut self, offset: usize, value: u8) -> Result<(), VMError> {
        self.store_data(offset, &[value])
    }

    pub fn store_zeros(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let end = offset.checked_add(size).ok_or(TooLargeRequiredMemory)?;
        self.resize(end)?;
        self.buffer
            .get_mut(offset..end)
            .ok_or(ExceptionalHalt::InvalidMemoryAccess)?
            .fill(0);
        Ok(())
    }

    /// Overlap-safe copy within memory (MCOPY semantics).
    pub fn copy_within(
        &mut self,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let src_end = src_offset.checked_add(size).ok_or(TooLargeRequiredMemory)?;
        let dst_end = dst_offset.checked_add(size).ok_or(TooLargeRequiredMemory)?;
        self.resize(src_end.max(dst_end))?;
        if src_end > self.buffer.len() || dst_end > self.buffer.len() {
            return Err(ExceptionalHalt::InvalidMemoryAccess.into());
        }
        self.buffer.copy_within(src_offset..src_end, dst_offset);
        Ok(())
    }
}

/// When a memory expansion is triggered, only the additional bytes must be
/// paid for.
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    if new_memory_size <= current_memory_size {
        return Ok(0);
    }
    cost(new_memory_size)?
        .checked_sub(cost(current_memory_size)?)
        .ok_or(InternalError::Underflow.into())
}

/// Total cost of a memory of the given size: `words^2 / 512 + 3 * words`.
fn cost(memory_size: usize) -> Result<u64, VMError> {
    let words = memory_size
        .checked_add(WORD_SIZE_IN_BYTES_USIZE - 1)
        .ok_or(OutOfGas)?
        / WORD_SIZE_IN_BYTES_USIZE;

    let gas_cost = (words.checked_pow(2).ok_or(OutOfGas)? / MEMORY_EXPANSION_QUOTIENT)
        .checked_add(3usize.checked_mul(words).ok_or(OutOfGas)?)
        .ok_or(OutOfGas)?;

    gas_cost
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber.into())
}

/// Size the memory must reach for a touch of `size` bytes at `offset`,
/// rounded up to a whole word. A zero-sized touch never expands.
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }
    let required = offset
        .checked_add(size)
        .and_then(|sum| sum.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(TooLargeRequiredMemory)?;
    if required > MAX_REQUIRED_MEMORY_SIZE {
        return Err(TooLargeRequiredMemory.into());
    }
    Ok(required)
}
