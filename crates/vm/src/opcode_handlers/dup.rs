//! # Duplication operations (`DUP1` through `DUP16`)

use crate::call_frame::CallFrame;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcode_handlers::OpcodeHandler;
use crate::opcodes::Opcode;
use crate::vm::Vm;

/// One handler serves all sixteen DUPs; the depth comes from the opcode
/// byte itself.
pub struct OpDupHandler;
impl OpcodeHandler for OpDupHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::DUPN)?;

        let depth = (frame.next_opcode() - Opcode::DUP1 as u8) as usize + 1;
        frame.stack.dup(depth)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::tests::run_code;
    use crate::word::Word256;

    #[test]
    fn dup2_copies_the_second_value() {
        // PUSH1 1, PUSH1 2, DUP2
        let (stack, _) = run_code(&[0x60, 0x01, 0x60, 0x02, 0x81]).unwrap();
        assert_eq!(
            stack,
            vec![Word256::from(1u64), Word256::from(2u64), Word256::from(1u64)]
        );
    }
}
