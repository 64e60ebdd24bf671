use crate::constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_USIZE};
use crate::errors::{ExceptionalHalt, VMError};
use crate::word::Word256;

/// Byte-addressable frame memory. Grows in 32-byte words and never shrinks;
/// reads past the end force growth, exactly as the gas accounting assumes.
///
/// Callers charge [`expansion_cost`] before touching a range; the accessors
/// themselves only move bytes.
#[derive(Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Memory::default()
    }

    /// Current size in bytes, always a multiple of 32.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grows to cover `new_size` bytes, rounded up to whole words.
    pub fn resize(&mut self, new_size: usize) {
        if new_size <= self.data.len() {
            return;
        }
        let aligned = new_size.next_multiple_of(WORD_SIZE_IN_BYTES_USIZE);
        self.data.resize(aligned, 0);
    }

    /// A copy of `[offset, offset + size)`, growing to cover it.
    /// A zero-size read returns empty without growth.
    pub fn load_range(&mut self, offset: usize, size: usize) -> Vec<u8> {
        if size == 0 {
            return Vec::new();
        }
        self.resize(offset + size);
        self.data[offset..offset + size].to_vec()
    }

    pub fn load_word(&mut self, offset: usize) -> Word256 {
        self.resize(offset + WORD_SIZE_IN_BYTES_USIZE);
        Word256::from_big_endian(&self.data[offset..offset + WORD_SIZE_IN_BYTES_USIZE])
    }

    /// Copies `data` to `[offset, offset + data.len())`.
    pub fn store_data(&mut self, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.resize(offset + data.len());
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Fills `[offset, offset + size)` from `data`, zero-padding when the
    /// source is shorter. The copy rule of CODECOPY and friends.
    pub fn store_range(&mut self, offset: usize, size: usize, data: &[u8]) {
        if size == 0 {
            return;
        }
        self.resize(offset + size);
        let copied = size.min(data.len());
        self.data[offset..offset + copied].copy_from_slice(&data[..copied]);
        self.data[offset + copied..offset + size].fill(0);
    }

    pub fn store_byte(&mut self, offset: usize, byte: u8) {
        self.resize(offset + 1);
        self.data[offset] = byte;
    }

    pub fn store_word(&mut self, offset: usize, word: Word256) {
        self.store_data(offset, &word.to_big_endian());
    }
}

/// Word-aligned size a memory access of `size` bytes at `offset` requires.
/// Zero-size accesses require nothing, whatever the offset.
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }
    offset
        .checked_add(size)
        .and_then(|end| end.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// When an expansion is triggered, only the additional words are paid for.
pub fn expansion_cost(new_size: usize, current_size: usize) -> Result<u64, VMError> {
    if new_size <= current_size {
        return Ok(0);
    }
    Ok(cost(new_size)?.saturating_sub(cost(current_size)?))
}

/// Total cost of a memory of the given size: 3·words + words²/512.
fn cost(size: usize) -> Result<u64, VMError> {
    let words = size.div_ceil(WORD_SIZE_IN_BYTES_USIZE) as u64;
    let quadratic = words
        .checked_mul(words)
        .map(|squared| squared / MEMORY_EXPANSION_QUOTIENT)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    words
        .checked_mul(3)
        .and_then(|linear| linear.checked_add(quadratic))
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_is_word_aligned() {
        let mut memory = Memory::new();
        memory.store_byte(0, 0xff);
        assert_eq!(memory.len(), 32);
        memory.store_data(32, &[1, 2, 3]);
        assert_eq!(memory.len(), 64);
    }

    #[test]
    fn reads_past_the_end_force_growth_and_see_zeros() {
        let mut memory = Memory::new();
        let data = memory.load_range(100, 10);
        assert_eq!(data, vec![0u8; 10]);
        assert_eq!(memory.len(), 128);
    }

    #[test]
    fn zero_size_reads_do_not_grow() {
        let mut memory = Memory::new();
        assert!(memory.load_range(usize::MAX - 31, 0).is_empty());
        assert_eq!(memory.len(), 0);
    }

    #[test]
    fn word_roundtrip() {
        let mut memory = Memory::new();
        let value = Word256::from(0xdeadbeefu64);
        memory.store_word(64, value);
        assert_eq!(memory.load_word(64), value);
        assert_eq!(memory.len(), 96);
    }

    #[test]
    fn store_range_zero_pads_short_sources() {
        let mut memory = Memory::new();
        memory.data.resize(32, 0xaa);
        memory.store_range(0, 8, &[1, 2, 3]);
        assert_eq!(&memory.data()[..8], &[1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn expansion_cost_is_quadratic_on_the_delta() {
        // cost(32) = 3, cost(64) = 6 + 4/512 = 6.
        assert_eq!(expansion_cost(32, 0).unwrap(), 3);
        assert_eq!(expansion_cost(64, 32).unwrap(), 3);
        assert_eq!(expansion_cost(32, 32).unwrap(), 0);
        assert_eq!(expansion_cost(0, 0).unwrap(), 0);
        // 1024 words: 3*1024 + 1024^2/512 = 3072 + 2048.
        assert_eq!(expansion_cost(32768, 0).unwrap(), 5120);
    }

    #[test]
    fn memory_size_rounds_up_and_checks_overflow() {
        assert_eq!(calculate_memory_size(0, 1).unwrap(), 32);
        assert_eq!(calculate_memory_size(31, 2).unwrap(), 64);
        assert_eq!(calculate_memory_size(usize::MAX, 0).unwrap(), 0);
        assert!(calculate_memory_size(usize::MAX, 2).is_err());
    }
}
