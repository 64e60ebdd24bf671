//! # Push operations (`PUSH1` through `PUSH32`)

use crate::call_frame::CallFrame;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcode_handlers::OpcodeHandler;
use crate::opcodes::Opcode;
use crate::vm::Vm;
use crate::word::Word256;

/// One handler serves all thirty-two PUSHes. Immediates running past the
/// end of code read as zeros.
pub struct OpPushHandler;
impl OpcodeHandler for OpPushHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::PUSHN)?;

        let size = (frame.next_opcode() - Opcode::PUSH1 as u8) as usize + 1;
        let start = frame.pc + 1;
        let end = (start + size).min(frame.code.len());
        let immediate = frame.code.get(start..end).unwrap_or_default();

        // Truncated immediates are implicitly zero-extended on the right.
        let mut padded = [0u8; 32];
        padded[32 - size..32 - size + immediate.len()].copy_from_slice(immediate);
        frame
            .stack
            .push(Word256::from_big_endian(&padded[32 - size..]))?;

        Ok(OpcodeResult::Continue {
            pc_increment: 1 + size,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::tests::run_code;
    use crate::word::Word256;

    #[test]
    fn push_places_the_immediate_on_the_stack() {
        // PUSH2 0x0103
        let (stack, gas_used) = run_code(&[0x61, 0x01, 0x03]).unwrap();
        assert_eq!(stack, vec![Word256::from(0x0103u64)]);
        assert_eq!(gas_used, 3);
    }

    #[test]
    fn truncated_immediate_zero_extends() {
        // PUSH32 with only one byte of code after it.
        let (stack, _) = run_code(&[0x7f, 0xff]).unwrap();
        let mut expected = [0u8; 32];
        expected[0] = 0xff;
        assert_eq!(stack, vec![Word256::from_big_endian(&expected)]);
    }
}
