//! # Arithmetic operations
//!
//! Includes the following opcodes:
//!   - `ADD`
//!   - `SUB`
//!   - `MUL`
//!   - `DIV`
//!   - `SDIV`
//!   - `MOD`
//!   - `SMOD`
//!   - `ADDMOD`
//!   - `MULMOD`
//!   - `EXP`
//!   - `SIGNEXTEND`

use crate::call_frame::CallFrame;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcode_handlers::OpcodeHandler;
use crate::vm::Vm;
use crate::word::Word256;

/// Implementation for the `ADD` opcode.
pub struct OpAddHandler;
impl OpcodeHandler for OpAddHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::ADD)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs.wrapping_add(rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SUB` opcode.
pub struct OpSubHandler;
impl OpcodeHandler for OpSubHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SUB)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs.wrapping_sub(rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MUL` opcode.
pub struct OpMulHandler;
impl OpcodeHandler for OpMulHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::MUL)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs.wrapping_mul(rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `DIV` opcode.
pub struct OpDivHandler;
impl OpcodeHandler for OpDivHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::DIV)?;

        let [lhs, rhs] = frame.stack.pop()?;
        match lhs.checked_div(rhs) {
            Some(quotient) => frame.stack.push(quotient)?,
            None => frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SDIV` opcode.
pub struct OpSDivHandler;
impl OpcodeHandler for OpSDivHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SDIV)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs.sdiv(rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MOD` opcode.
pub struct OpModHandler;
impl OpcodeHandler for OpModHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::MOD)?;

        let [lhs, rhs] = frame.stack.pop()?;
        match lhs.checked_rem(rhs) {
            Some(remainder) => frame.stack.push(remainder)?,
            None => frame.stack.push_zero()?,
        }

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SMOD` opcode.
pub struct OpSModHandler;
impl OpcodeHandler for OpSModHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SMOD)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs.smod(rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `ADDMOD` opcode.
pub struct OpAddModHandler;
impl OpcodeHandler for OpAddModHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::ADDMOD)?;

        let [lhs, rhs, modulus] = frame.stack.pop()?;
        frame.stack.push(lhs.add_mod(rhs, modulus))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `MULMOD` opcode.
pub struct OpMulModHandler;
impl OpcodeHandler for OpMulModHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::MULMOD)?;

        let [lhs, rhs, modulus] = frame.stack.pop()?;
        frame.stack.push(lhs.mul_mod(rhs, modulus))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EXP` opcode. Gas depends on the exponent's byte
/// length, so the operands come off the stack first.
pub struct OpExpHandler;
impl OpcodeHandler for OpExpHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let [base, exponent] = frame.stack.pop()?;
        frame.increase_consumed_gas(gas_cost::exp(exponent)?)?;

        frame.stack.push(base.pow(exponent))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SIGNEXTEND` opcode.
pub struct OpSignExtendHandler;
impl OpcodeHandler for OpSignExtendHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SIGNEXTEND)?;

        let [byte_index, value] = frame.stack.pop()?;
        let extended = match byte_index.to_u64() {
            Some(index) if index < 31 => value.sign_extend(index as usize),
            _ => value,
        };
        frame.stack.push(extended)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::tests::run_code;
    use crate::word::Word256;

    #[test]
    fn add_wraps_modulo_2_256() {
        // PUSH32 max, PUSH1 1, ADD
        let mut code = vec![0x7f];
        code.extend([0xff; 32]);
        code.extend([0x60, 0x01, 0x01]);
        let (stack, _) = run_code(&code).unwrap();
        assert_eq!(stack, vec![Word256::ZERO]);
    }

    #[test]
    fn division_by_zero_pushes_zero() {
        // PUSH1 0, PUSH1 1, DIV -> 1 / 0
        let (stack, _) = run_code(&[0x60, 0x00, 0x60, 0x01, 0x04]).unwrap();
        assert_eq!(stack, vec![Word256::ZERO]);
        // PUSH1 0, PUSH1 1, MOD
        let (stack, _) = run_code(&[0x60, 0x00, 0x60, 0x01, 0x06]).unwrap();
        assert_eq!(stack, vec![Word256::ZERO]);
    }

    #[test]
    fn exp_charges_byte_length_gas() {
        // PUSH2 0x0101, PUSH1 2, EXP: exponent has two bytes.
        let (stack, gas_used) = run_code(&[0x61, 0x01, 0x01, 0x60, 0x02, 0x0a]).unwrap();
        assert_eq!(stack, vec![Word256::from(2u64).pow(Word256::from(0x0101u64))]);
        // PUSH2 (3) + PUSH1 (3) + EXP (10 + 2*50).
        assert_eq!(gas_used, 116);
    }

    #[test]
    fn signextend_of_a_negative_byte() {
        // PUSH1 0xff, PUSH1 0, SIGNEXTEND
        let (stack, _) = run_code(&[0x60, 0xff, 0x60, 0x00, 0x0b]).unwrap();
        assert_eq!(stack, vec![Word256::MAX]);
    }
}
