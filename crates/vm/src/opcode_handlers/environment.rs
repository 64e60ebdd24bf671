//! # Environmental information
//!
//! Includes the following opcodes:
//!   - `ADDRESS`, `BALANCE`, `ORIGIN`, `CALLER`, `CALLVALUE`, `GASPRICE`
//!   - `CALLDATALOAD`, `CALLDATASIZE`, `CALLDATACOPY`
//!   - `CODESIZE`, `CODECOPY`
//!   - `EXTCODESIZE`, `EXTCODECOPY`, `EXTCODEHASH`
//!   - `RETURNDATASIZE`, `RETURNDATACOPY`

use crate::call_frame::CallFrame;
use crate::errors::{ExceptionalHalt, OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::opcode_handlers::OpcodeHandler;
use crate::utils::{address_to_word, size_offset_to_usize, word_to_address};
use crate::vm::Vm;
use crate::word::Word256;

/// Implementation for the `ADDRESS` opcode.
pub struct OpAddressHandler;
impl OpcodeHandler for OpAddressHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::ADDRESS)?;

        frame.stack.push(address_to_word(frame.to))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `BALANCE` opcode.
pub struct OpBalanceHandler;
impl OpcodeHandler for OpBalanceHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::BALANCE)?;

        let address = word_to_address(frame.stack.pop1()?);
        let balance = vm.db.get_balance(address)?;
        frame.stack.push(Word256::from(balance))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `ORIGIN` opcode.
pub struct OpOriginHandler;
impl OpcodeHandler for OpOriginHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::ORIGIN)?;

        frame.stack.push(address_to_word(vm.env.origin))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLER` opcode.
pub struct OpCallerHandler;
impl OpcodeHandler for OpCallerHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::CALLER)?;

        frame.stack.push(address_to_word(frame.caller))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLVALUE` opcode.
pub struct OpCallValueHandler;
impl OpcodeHandler for OpCallValueHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::CALLVALUE)?;

        frame.stack.push(frame.value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLDATALOAD` opcode. Reads past the calldata
/// end as zeros.
pub struct OpCallDataLoadHandler;
impl OpcodeHandler for OpCallDataLoadHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::CALLDATALOAD)?;

        let offset = frame.stack.pop1()?;
        let mut word = [0u8; 32];
        if let Some(offset) = offset.to_u64().and_then(|o| usize::try_from(o).ok()) {
            if offset < frame.calldata.len() {
                let end = (offset + 32).min(frame.calldata.len());
                word[..end - offset].copy_from_slice(&frame.calldata[offset..end]);
            }
        }
        frame.stack.push(Word256::from_big_endian(&word))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CALLDATASIZE` opcode.
pub struct OpCallDataSizeHandler;
impl OpcodeHandler for OpCallDataSizeHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::CALLDATASIZE)?;

        frame.stack.push(Word256::from(frame.calldata.len() as u64))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

fn copy_into_memory(
    frame: &mut CallFrame,
    static_cost: u64,
    dest_offset: Word256,
    src_offset: Word256,
    size: Word256,
    source: &[u8],
) -> Result<(), VMError> {
    let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

    let new_memory_size = calculate_memory_size(dest_offset, size)?;
    frame.increase_consumed_gas(gas_cost::copy(
        static_cost,
        new_memory_size,
        frame.memory.len(),
        size,
    )?)?;

    if size == 0 {
        return Ok(());
    }
    // Reads past the source end are zeros.
    let src_offset = src_offset
        .to_u64()
        .and_then(|o| usize::try_from(o).ok())
        .unwrap_or(usize::MAX);
    let slice = source.get(src_offset.min(source.len())..).unwrap_or_default();
    frame.memory.store_range(dest_offset, size, slice);
    Ok(())
}

/// Implementation for the `CALLDATACOPY` opcode.
pub struct OpCallDataCopyHandler;
impl OpcodeHandler for OpCallDataCopyHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [dest_offset, src_offset, size] = frame.stack.pop()?;
        let calldata = frame.calldata.clone();
        copy_into_memory(
            frame,
            gas_cost::CALLDATACOPY_STATIC,
            dest_offset,
            src_offset,
            size,
            &calldata,
        )?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CODESIZE` opcode.
pub struct OpCodeSizeHandler;
impl OpcodeHandler for OpCodeSizeHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::CODESIZE)?;

        frame.stack.push(Word256::from(frame.code.len() as u64))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `CODECOPY` opcode.
pub struct OpCodeCopyHandler;
impl OpcodeHandler for OpCodeCopyHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [dest_offset, src_offset, size] = frame.stack.pop()?;
        let code = frame.code.clone();
        copy_into_memory(
            frame,
            gas_cost::CODECOPY_STATIC,
            dest_offset,
            src_offset,
            size,
            &code,
        )?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GASPRICE` opcode.
pub struct OpGasPriceHandler;
impl OpcodeHandler for OpGasPriceHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::GASPRICE)?;

        frame.stack.push(Word256::from(vm.env.gas_price))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXTCODESIZE` opcode.
pub struct OpExtCodeSizeHandler;
impl OpcodeHandler for OpExtCodeSizeHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::EXTCODESIZE)?;

        let address = word_to_address(frame.stack.pop1()?);
        let size = vm.db.get_code_size(address)?;
        frame.stack.push(Word256::from(size as u64))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXTCODECOPY` opcode.
pub struct OpExtCodeCopyHandler;
impl OpcodeHandler for OpExtCodeCopyHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [address, dest_offset, src_offset, size] = frame.stack.pop()?;
        let code = vm.db.get_code(word_to_address(address))?;
        copy_into_memory(
            frame,
            gas_cost::EXTCODECOPY_STATIC,
            dest_offset,
            src_offset,
            size,
            &code,
        )?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `RETURNDATASIZE` opcode.
pub struct OpReturnDataSizeHandler;
impl OpcodeHandler for OpReturnDataSizeHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::RETURNDATASIZE)?;

        frame
            .stack
            .push(Word256::from(frame.return_data.len() as u64))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `RETURNDATACOPY` opcode. Unlike the other copy
/// opcodes, reading past the buffer is a hard failure.
pub struct OpReturnDataCopyHandler;
impl OpcodeHandler for OpReturnDataCopyHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [dest_offset, src_offset, size] = frame.stack.pop()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        frame.increase_consumed_gas(gas_cost::copy(
            gas_cost::RETURNDATACOPY_STATIC,
            new_memory_size,
            frame.memory.len(),
            size,
        )?)?;

        let src_offset = src_offset
            .to_u64()
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or(ExceptionalHalt::ReturnDataOutOfBounds)?;
        let end = src_offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::ReturnDataOutOfBounds)?;
        if end > frame.return_data.len() {
            return Err(ExceptionalHalt::ReturnDataOutOfBounds.into());
        }
        let data = frame.return_data.slice(src_offset..end);
        frame.memory.store_data(dest_offset, &data);

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXTCODEHASH` opcode. Dead accounts (absent or
/// empty) hash to zero.
pub struct OpExtCodeHashHandler;
impl OpcodeHandler for OpExtCodeHashHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::EXTCODEHASH)?;

        let address = word_to_address(frame.stack.pop1()?);
        if vm.db.is_dead(address)? {
            frame.stack.push_zero()?;
        } else {
            let hash = vm.db.get_code_hash(address)?;
            frame.stack.push(Word256::from(hash))?;
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
