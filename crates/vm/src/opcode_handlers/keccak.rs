//! # KECCAK256

use bytes::Bytes;
use uevm_common::utils::keccak;

use crate::call_frame::CallFrame;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::opcode_handlers::OpcodeHandler;
use crate::utils::size_offset_to_usize;
use crate::vm::Vm;
use crate::word::Word256;

/// Implementation for the `KECCAK256` opcode. Hashes a memory range and
/// records the preimage.
pub struct OpKeccakHandler;
impl OpcodeHandler for OpKeccakHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        frame.increase_consumed_gas(gas_cost::sha3(
            new_memory_size,
            frame.memory.len(),
            size,
        )?)?;

        let data = frame.memory.load_range(offset, size);
        let hash = keccak(&data);
        vm.db.add_preimage(hash, Bytes::from(data));
        frame.stack.push(Word256::from(hash))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::tests::run_code;
    use uevm_common::constants::EMPTY_CODE_HASH;

    #[test]
    fn hash_of_the_empty_range() {
        // PUSH1 0, PUSH1 0, KECCAK256
        let (stack, gas_used) = run_code(&[0x60, 0x00, 0x60, 0x00, 0x20]).unwrap();
        assert_eq!(stack, vec![Word256::from(EMPTY_CODE_HASH)]);
        assert_eq!(gas_used, 3 + 3 + 30);
    }

    #[test]
    fn hash_covers_the_memory_range() {
        // PUSH1 0xab, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, KECCAK256
        let (stack, _) =
            run_code(&[0x60, 0xab, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0x20]).unwrap();
        assert_eq!(stack, vec![Word256::from(keccak([0xab]))]);
    }
}
