use std::rc::Rc;

use bytes::Bytes;
use ethereum_types::{Address, H256};

use crate::errors::{ExceptionalHalt, VMError};
use crate::jumpdest::Jumpdests;
use crate::memory::Memory;
use crate::stack::Stack;
use crate::word::Word256;

/// One active invocation of code: its own stack, memory, gas and input.
/// `code_address` differs from `to` under DELEGATECALL/CALLCODE, where
/// borrowed code runs in the caller's storage context.
#[derive(Debug)]
pub struct CallFrame {
    pub caller: Address,
    pub to: Address,
    pub code_address: Address,
    pub code: Bytes,
    pub code_hash: H256,
    pub calldata: Bytes,
    pub value: Word256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub pc: usize,
    pub stack: Stack,
    pub memory: Memory,
    /// Return data of the most recent completed sub-call.
    pub return_data: Bytes,
    /// Data set by RETURN or REVERT.
    pub output: Bytes,
    pub jumpdests: Rc<Jumpdests>,
    pub is_static: bool,
    pub is_create: bool,
    pub depth: usize,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caller: Address,
        to: Address,
        code_address: Address,
        code: Bytes,
        code_hash: H256,
        calldata: Bytes,
        value: Word256,
        gas_limit: u64,
        stack: Stack,
        jumpdests: Rc<Jumpdests>,
        is_static: bool,
        is_create: bool,
        depth: usize,
    ) -> Self {
        CallFrame {
            caller,
            to,
            code_address,
            code,
            code_hash,
            calldata,
            value,
            gas_limit,
            gas_used: 0,
            pc: 0,
            stack,
            memory: Memory::new(),
            return_data: Bytes::new(),
            output: Bytes::new(),
            jumpdests,
            is_static,
            is_create,
            depth,
        }
    }

    /// The opcode at the program counter; past the end of code every byte
    /// reads as STOP.
    pub fn next_opcode(&self) -> u8 {
        self.code.get(self.pc).copied().unwrap_or(0x00)
    }

    pub fn gas_remaining(&self) -> u64 {
        self.gas_limit - self.gas_used
    }

    /// Deducts gas before an operation runs.
    pub fn increase_consumed_gas(&mut self, cost: u64) -> Result<(), VMError> {
        if cost > self.gas_remaining() {
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        self.gas_used += cost;
        Ok(())
    }

    /// Hands gas back, e.g. the unspent remainder of a sub-call. A callee
    /// may return more than the caller paid when a stipend goes unused, so
    /// the subtraction saturates.
    pub fn refund_gas(&mut self, refund: u64) {
        self.gas_used = self.gas_used.saturating_sub(refund);
    }

    /// Validates a jump target against the frame's jump destination
    /// analysis and moves the program counter there.
    pub fn jump_to(&mut self, target: Word256) -> Result<(), VMError> {
        let target = target
            .to_u64()
            .and_then(|t| usize::try_from(t).ok())
            .filter(|t| self.jumpdests.has(*t))
            .ok_or(ExceptionalHalt::InvalidJumpDestination)?;
        self.pc = target;
        Ok(())
    }
}
