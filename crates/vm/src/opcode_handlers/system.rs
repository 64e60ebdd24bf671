//! # System operations
//!
//! Includes the following opcodes:
//!   - `CALL`, `CALLCODE`, `DELEGATECALL`, `STATICCALL`
//!   - `CREATE`, `CREATE2`
//!   - `RETURN`, `REVERT`
//!   - `SELFDESTRUCT`

use bytes::Bytes;

use crate::call_frame::CallFrame;
use crate::errors::{ExceptionalHalt, OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::{calculate_memory_size, expansion_cost};
use crate::opcode_handlers::OpcodeHandler;
use crate::utils::{size_offset_to_usize, word_to_address};
use crate::vm::Vm;
use crate::word::Word256;

/// Implementation for the `CALL` opcode.
pub struct OpCallHandler;
impl OpcodeHandler for OpCallHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [gas, callee, value, args_offset, args_len, return_offset, return_len] =
            frame.stack.pop()?;
        if frame.is_static && !value.is_zero() {
            return Err(ExceptionalHalt::WriteProtection.into());
        }
        let callee = word_to_address(callee);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let transfers_value = !value.is_zero();
        // The new-account surcharge applies when value lands on a dead
        // account (EIP-158).
        let to_new_account = transfers_value && vm.db.is_dead(callee)?;
        let extra = gas_cost::call_extra_cost(transfers_value, to_new_account)
            .checked_add(expansion_cost(new_memory_size, frame.memory.len())?)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        frame.increase_consumed_gas(extra)?;

        let forwarded = forwarded_gas(gas, frame.gas_remaining());
        frame.increase_consumed_gas(forwarded)?;
        frame.memory.resize(new_memory_size);

        let stipend = if transfers_value { gas_cost::CALL_STIPEND } else { 0 };
        let calldata = Bytes::from(frame.memory.load_range(args_offset, args_len));
        vm.generic_call(
            frame,
            forwarded,
            stipend,
            value,
            frame.to,
            callee,
            callee,
            true,
            frame.is_static,
            calldata,
            return_offset,
            return_len,
        )
    }
}

/// Implementation for the `CALLCODE` opcode: the callee's code runs in the
/// caller's storage context.
pub struct OpCallCodeHandler;
impl OpcodeHandler for OpCallCodeHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [gas, callee, value, args_offset, args_len, return_offset, return_len] =
            frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let transfers_value = !value.is_zero();
        let extra = gas_cost::call_extra_cost(transfers_value, false)
            .checked_add(expansion_cost(new_memory_size, frame.memory.len())?)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        frame.increase_consumed_gas(extra)?;

        let forwarded = forwarded_gas(gas, frame.gas_remaining());
        frame.increase_consumed_gas(forwarded)?;
        frame.memory.resize(new_memory_size);

        let stipend = if transfers_value { gas_cost::CALL_STIPEND } else { 0 };
        let calldata = Bytes::from(frame.memory.load_range(args_offset, args_len));
        // Value moves from the frame to itself: only the balance check is
        // observable.
        vm.generic_call(
            frame,
            forwarded,
            stipend,
            value,
            frame.to,
            frame.to,
            callee,
            true,
            frame.is_static,
            calldata,
            return_offset,
            return_len,
        )
    }
}

/// Implementation for the `DELEGATECALL` opcode: borrowed code, and the
/// caller's caller and value stay visible.
pub struct OpDelegateCallHandler;
impl OpcodeHandler for OpDelegateCallHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [gas, callee, args_offset, args_len, return_offset, return_len] =
            frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let extra = gas_cost::CALL_BASE
            .checked_add(expansion_cost(new_memory_size, frame.memory.len())?)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        frame.increase_consumed_gas(extra)?;

        let forwarded = forwarded_gas(gas, frame.gas_remaining());
        frame.increase_consumed_gas(forwarded)?;
        frame.memory.resize(new_memory_size);

        let calldata = Bytes::from(frame.memory.load_range(args_offset, args_len));
        vm.generic_call(
            frame,
            forwarded,
            0,
            frame.value,
            frame.caller,
            frame.to,
            callee,
            false,
            frame.is_static,
            calldata,
            return_offset,
            return_len,
        )
    }
}

/// Implementation for the `STATICCALL` opcode: write protection for the
/// whole subtree.
pub struct OpStaticCallHandler;
impl OpcodeHandler for OpStaticCallHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [gas, callee, args_offset, args_len, return_offset, return_len] =
            frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_len, args_offset) = size_offset_to_usize(args_len, args_offset)?;
        let (return_len, return_offset) = size_offset_to_usize(return_len, return_offset)?;

        let new_memory_size = calculate_memory_size(args_offset, args_len)?
            .max(calculate_memory_size(return_offset, return_len)?);
        let extra = gas_cost::CALL_BASE
            .checked_add(expansion_cost(new_memory_size, frame.memory.len())?)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        frame.increase_consumed_gas(extra)?;

        let forwarded = forwarded_gas(gas, frame.gas_remaining());
        frame.increase_consumed_gas(forwarded)?;
        frame.memory.resize(new_memory_size);

        let calldata = Bytes::from(frame.memory.load_range(args_offset, args_len));
        vm.generic_call(
            frame,
            forwarded,
            0,
            Word256::ZERO,
            frame.to,
            callee,
            callee,
            false,
            true,
            calldata,
            return_offset,
            return_len,
        )
    }
}

/// Implementation for the `CREATE` opcode.
pub struct OpCreateHandler;
impl OpcodeHandler for OpCreateHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }
        let [value, offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        let cost = gas_cost::CREATE_BASE
            .checked_add(expansion_cost(new_memory_size, frame.memory.len())?)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        frame.increase_consumed_gas(cost)?;

        // All but 1/64th of the remainder goes to the init frame.
        let forwarded = gas_cost::max_call_gas(frame.gas_remaining());
        frame.increase_consumed_gas(forwarded)?;

        let init_code = Bytes::from(frame.memory.load_range(offset, size));
        vm.generic_create(frame, forwarded, value, init_code, None)
    }
}

/// Implementation for the `CREATE2` opcode: salted address, and the init
/// code is hashed at the SHA3 word rate.
pub struct OpCreate2Handler;
impl OpcodeHandler for OpCreate2Handler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }
        let [value, offset, size, salt] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        let cost = gas_cost::CREATE_BASE
            .checked_add(gas_cost::create2_hash_cost(size)?)
            .and_then(|cost| {
                cost.checked_add(expansion_cost(new_memory_size, frame.memory.len()).ok()?)
            })
            .ok_or(ExceptionalHalt::OutOfGas)?;
        frame.increase_consumed_gas(cost)?;

        let forwarded = gas_cost::max_call_gas(frame.gas_remaining());
        frame.increase_consumed_gas(forwarded)?;

        let init_code = Bytes::from(frame.memory.load_range(offset, size));
        vm.generic_create(frame, forwarded, value, init_code, Some(salt))
    }
}

/// Implementation for the `RETURN` opcode.
pub struct OpReturnHandler;
impl OpcodeHandler for OpReturnHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        frame.increase_consumed_gas(expansion_cost(new_memory_size, frame.memory.len())?)?;

        frame.output = Bytes::from(frame.memory.load_range(offset, size));
        Ok(OpcodeResult::Halt)
    }
}

/// Implementation for the `REVERT` opcode: returns data like RETURN, but
/// the frame's writes are undone and the error flows to the caller.
pub struct OpRevertHandler;
impl OpcodeHandler for OpRevertHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [offset, size] = frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        frame.increase_consumed_gas(expansion_cost(new_memory_size, frame.memory.len())?)?;

        frame.output = Bytes::from(frame.memory.load_range(offset, size));
        Err(VMError::Revert)
    }
}

/// Implementation for the `SELFDESTRUCT` opcode. Halts the frame; the
/// account is removed when its transaction settles.
pub struct OpSelfDestructHandler;
impl OpcodeHandler for OpSelfDestructHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }

        let beneficiary = word_to_address(frame.stack.pop1()?);
        let balance = vm.db.get_balance(frame.to)?;
        let to_new_account = !balance.is_zero() && vm.db.is_dead(beneficiary)?;
        frame.increase_consumed_gas(gas_cost::selfdestruct(to_new_account))?;

        if !vm.db.has_suicided(frame.to) {
            vm.db.add_refund(gas_cost::SELFDESTRUCT_REFUND);
        }
        vm.db.add_balance(beneficiary, balance)?;
        vm.db.suicide(frame.to)?;

        Ok(OpcodeResult::Halt)
    }
}

/// EIP-150 gas forwarding: the requested amount, capped at 63/64 of what
/// remains.
fn forwarded_gas(requested: Word256, remaining: u64) -> u64 {
    let cap = gas_cost::max_call_gas(remaining);
    match requested.to_u64() {
        Some(gas) => gas.min(cap),
        None => cap,
    }
}
