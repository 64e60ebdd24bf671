//! # Exchange operations (`SWAP1` through `SWAP16`)

use crate::call_frame::CallFrame;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcode_handlers::OpcodeHandler;
use crate::opcodes::Opcode;
use crate::vm::Vm;

/// One handler serves all sixteen SWAPs; the depth comes from the opcode
/// byte itself.
pub struct OpSwapHandler;
impl OpcodeHandler for OpSwapHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SWAPN)?;

        let depth = (frame.next_opcode() - Opcode::SWAP1 as u8) as usize + 1;
        frame.stack.swap(depth)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
