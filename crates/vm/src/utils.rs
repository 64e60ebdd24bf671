use ethereum_types::Address;

use crate::errors::{ExceptionalHalt, VMError};
use crate::word::Word256;

/// Narrows a word to a usize. Values beyond the platform width cannot be
/// paid for, so the failure mode is out-of-gas.
pub fn word_to_usize(value: Word256) -> Result<usize, VMError> {
    value
        .to_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// Narrows a (size, offset) operand pair. A zero size short-circuits to
/// (0, 0) so that absurd offsets on empty ranges stay free, as consensus
/// requires.
pub fn size_offset_to_usize(
    size: Word256,
    offset: Word256,
) -> Result<(usize, usize), VMError> {
    let size = word_to_usize(size)?;
    if size == 0 {
        return Ok((0, 0));
    }
    Ok((size, word_to_usize(offset)?))
}

pub fn word_to_address(value: Word256) -> Address {
    Address::from_slice(&value.to_big_endian()[12..])
}

pub fn address_to_word(address: Address) -> Word256 {
    Word256::from_big_endian(address.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_ignores_the_offset() {
        let (size, offset) =
            size_offset_to_usize(Word256::ZERO, Word256::MAX).unwrap();
        assert_eq!((size, offset), (0, 0));
    }

    #[test]
    fn oversized_offsets_fail_as_out_of_gas() {
        let result = size_offset_to_usize(Word256::ONE, Word256::MAX);
        assert_eq!(
            result.unwrap_err(),
            VMError::Halt(ExceptionalHalt::OutOfGas)
        );
    }

    #[test]
    fn address_roundtrip_keeps_the_low_160_bits() {
        let address = Address::from_low_u64_be(0xdeadbeef);
        assert_eq!(word_to_address(address_to_word(address)), address);
        // High bits beyond 160 are dropped.
        let word = Word256::MAX;
        assert_eq!(
            address_to_word(word_to_address(word)),
            word & Word256::MAX.shr(96)
        );
    }
}
