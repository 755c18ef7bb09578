//! Frame-local linear memory

use crate::error::{EvmError, EvmResult};
use ember_primitives::U256;

/// Default cap on a frame's memory, 32 MiB.
pub const MAX_MEM_SIZE: u64 = 1 << 25;

/// A growable, zero-initialized byte buffer addressed by byte offset.
///
/// Growth is monotone within a frame's lifetime and bounded by a cap.
#[derive(Clone, Debug)]
pub struct Memory {
    data: Vec<u8>,
    limit: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Creates empty memory with the default cap.
    pub fn new() -> Self {
        Self::with_limit(MAX_MEM_SIZE)
    }

    /// Creates empty memory with a custom cap.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// Current size in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in 32-byte words, rounded up; `MSIZE` reports this times 32.
    pub fn size_words(&self) -> u64 {
        (self.len() + 31) / 32
    }

    /// Grows the buffer so that `offset + size` bytes exist.
    pub fn ensure(&mut self, offset: u64, size: u64) -> EvmResult<()> {
        let end = offset.checked_add(size).ok_or_else(|| {
            EvmError::OutOfBounds(format!(
                "integer overflow in memory access ({offset} + {size})"
            ))
        })?;
        if end > self.limit {
            return Err(EvmError::OutOfBounds(format!(
                "memory limit exceeded ({end} > {})",
                self.limit
            )));
        }
        if end > self.len() {
            self.data.resize(end as usize, 0);
        }
        Ok(())
    }

    /// Reads `size` bytes starting at `offset`, growing first.
    pub fn read(&mut self, offset: u64, size: u64) -> EvmResult<Vec<u8>> {
        self.ensure(offset, size)?;
        Ok(self.data[offset as usize..(offset + size) as usize].to_vec())
    }

    /// Reads a 32-byte big-endian word, growing first.
    pub fn read_word(&mut self, offset: u64) -> EvmResult<U256> {
        self.ensure(offset, 32)?;
        Ok(U256::from_big_endian(
            &self.data[offset as usize..offset as usize + 32],
        ))
    }

    /// Writes a 32-byte big-endian word, growing first.
    pub fn write_word(&mut self, offset: u64, word: U256) -> EvmResult<()> {
        self.ensure(offset, 32)?;
        self.data[offset as usize..offset as usize + 32].copy_from_slice(&word.to_be_bytes());
        Ok(())
    }

    /// Writes one byte, growing first.
    pub fn write_byte(&mut self, offset: u64, byte: u8) -> EvmResult<()> {
        self.ensure(offset, 1)?;
        self.data[offset as usize] = byte;
        Ok(())
    }

    /// Copies `size` bytes from `src[src_offset..]` to `offset`, growing
    /// first. Bytes past the end of the source are filled with `pad`.
    pub fn copy_in(
        &mut self,
        offset: u64,
        src: &[u8],
        src_offset: u64,
        size: u64,
        pad: u8,
    ) -> EvmResult<()> {
        if size == 0 {
            return Ok(());
        }
        self.ensure(offset, size)?;
        for i in 0..size {
            let from = src_offset.saturating_add(i);
            self.data[(offset + i) as usize] = if from < src.len() as u64 {
                src[from as usize]
            } else {
                pad
            };
        }
        Ok(())
    }
}
