//! # Stack, memory, storage and control flow operations
//!
//! Includes the following opcodes:
//!   - `POP`, `PC`, `GAS`, `MSIZE`
//!   - `MLOAD`, `MSTORE`, `MSTORE8`
//!   - `SLOAD`, `SSTORE`
//!   - `JUMP`, `JUMPI`, `JUMPDEST`

use ethereum_types::H256;

use crate::call_frame::CallFrame;
use crate::errors::{ExceptionalHalt, OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::opcode_handlers::OpcodeHandler;
use crate::utils::word_to_usize;
use crate::vm::Vm;
use crate::word::Word256;

/// Implementation for the `POP` opcode.
pub struct OpPopHandler;
impl OpcodeHandler for OpPopHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::POP)?;

        frame.stack.pop1()?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `PC` opcode.
pub struct OpPcHandler;
impl OpcodeHandler for OpPcHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::PC)?;

        frame.stack.push(Word256::from(frame.pc as u64))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GAS` opcode. Pushes the gas remaining after the
/// opcode's own charge.
pub struct OpGasHandler;
impl OpcodeHandler for OpGasHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::GAS)?;

        frame.stack.push(Word256::from(frame.gas_remaining()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MSIZE` opcode.
pub struct OpMSizeHandler;
impl OpcodeHandler for OpMSizeHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::MSIZE)?;

        frame.stack.push(Word256::from(frame.memory.len() as u64))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MLOAD` opcode.
pub struct OpMLoadHandler;
impl OpcodeHandler for OpMLoadHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = word_to_usize(frame.stack.pop1()?)?;

        let new_memory_size = calculate_memory_size(offset, 32)?;
        frame.increase_consumed_gas(gas_cost::with_expansion(
            gas_cost::MLOAD_STATIC,
            new_memory_size,
            frame.memory.len(),
        )?)?;

        let word = frame.memory.load_word(offset);
        frame.stack.push(word)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MSTORE` opcode.
pub struct OpMStoreHandler;
impl OpcodeHandler for OpMStoreHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [offset, value] = frame.stack.pop()?;
        let offset = word_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, 32)?;
        frame.increase_consumed_gas(gas_cost::with_expansion(
            gas_cost::MSTORE_STATIC,
            new_memory_size,
            frame.memory.len(),
        )?)?;

        frame.memory.store_word(offset, value);

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MSTORE8` opcode.
pub struct OpMStore8Handler;
impl OpcodeHandler for OpMStore8Handler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [offset, value] = frame.stack.pop()?;
        let offset = word_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, 1)?;
        frame.increase_consumed_gas(gas_cost::with_expansion(
            gas_cost::MSTORE8_STATIC,
            new_memory_size,
            frame.memory.len(),
        )?)?;

        frame.memory.store_byte(offset, value.low_u64() as u8);

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SLOAD` opcode.
pub struct OpSLoadHandler;
impl OpcodeHandler for OpSLoadHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SLOAD)?;

        let key = H256::from(frame.stack.pop1()?);
        let value = vm.db.get_state(frame.to, key)?;
        frame.stack.push(Word256::from(value))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SSTORE` opcode. 20000 gas to fill a zero slot,
/// 5000 otherwise, 15000 refund for clearing.
pub struct OpSStoreHandler;
impl OpcodeHandler for OpSStoreHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }

        let [key, value] = frame.stack.pop()?;
        let key = H256::from(key);
        let new_value = value.into();

        let current = vm.db.get_state(frame.to, key)?;
        let (cost, refund) = gas_cost::sstore(current, new_value);
        frame.increase_consumed_gas(cost)?;
        if refund > 0 {
            vm.db.add_refund(refund);
        }
        vm.db.set_state(frame.to, key, new_value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `JUMP` opcode.
pub struct OpJumpHandler;
impl OpcodeHandler for OpJumpHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::JUMP)?;

        let target = frame.stack.pop1()?;
        frame.jump_to(target)?;

        // The loop resumes at the JUMPDEST itself.
        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }
}

/// Implementation for the `JUMPI` opcode.
pub struct OpJumpiHandler;
impl OpcodeHandler for OpJumpiHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::JUMPI)?;

        let [target, condition] = frame.stack.pop()?;
        if condition.is_zero() {
            return Ok(OpcodeResult::Continue { pc_increment: 1 });
        }
        frame.jump_to(target)?;

        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }
}

/// Implementation for the `JUMPDEST` opcode.
pub struct OpJumpdestHandler;
impl OpcodeHandler for OpJumpdestHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::JUMPDEST)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
