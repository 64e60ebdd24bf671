//! # Block information
//!
//! Includes the following opcodes:
//!   - `BLOCKHASH`
//!   - `COINBASE`
//!   - `TIMESTAMP`
//!   - `NUMBER`
//!   - `DIFFICULTY`
//!   - `GASLIMIT`

use crate::call_frame::CallFrame;
use crate::constants::BLOCKHASH_WINDOW;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcode_handlers::OpcodeHandler;
use crate::utils::address_to_word;
use crate::vm::Vm;
use crate::word::Word256;

/// Implementation for the `BLOCKHASH` opcode. Only the 256 most recent
/// blocks resolve; anything else reads as zero.
pub struct OpBlockHashHandler;
impl OpcodeHandler for OpBlockHashHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::BLOCKHASH)?;

        let number = frame.stack.pop1()?;
        let current = vm.env.block_number;
        let hash = match number.to_u64() {
            Some(number)
                if number < current && current - number <= BLOCKHASH_WINDOW =>
            {
                (vm.env.block_hash_fn)(number)
            }
            _ => Default::default(),
        };
        frame.stack.push(Word256::from(hash))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `COINBASE` opcode.
pub struct OpCoinbaseHandler;
impl OpcodeHandler for OpCoinbaseHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::COINBASE)?;

        frame.stack.push(address_to_word(vm.env.coinbase))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `TIMESTAMP` opcode.
pub struct OpTimestampHandler;
impl OpcodeHandler for OpTimestampHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::TIMESTAMP)?;

        frame.stack.push(Word256::from(vm.env.timestamp))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `NUMBER` opcode.
pub struct OpNumberHandler;
impl OpcodeHandler for OpNumberHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::NUMBER)?;

        frame.stack.push(Word256::from(vm.env.block_number))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `DIFFICULTY` opcode.
pub struct OpDifficultyHandler;
impl OpcodeHandler for OpDifficultyHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::DIFFICULTY)?;

        frame.stack.push(Word256::from(vm.env.difficulty))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GASLIMIT` opcode.
pub struct OpGasLimitHandler;
impl OpcodeHandler for OpGasLimitHandler {
    fn eval(vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::GASLIMIT)?;

        frame.stack.push(Word256::from(vm.env.block_gas_limit))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
