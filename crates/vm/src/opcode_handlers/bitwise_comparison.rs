//! # Comparison & bitwise logic operations
//!
//! Includes the following opcodes:
//!   - `LT`, `GT`, `SLT`, `SGT`, `EQ`, `ISZERO`
//!   - `AND`, `OR`, `XOR`, `NOT`
//!   - `BYTE`, `SHL`, `SHR`, `SAR`

use crate::call_frame::CallFrame;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcode_handlers::OpcodeHandler;
use crate::vm::Vm;
use crate::word::Word256;

/// Implementation for the `LT` opcode.
pub struct OpLtHandler;
impl OpcodeHandler for OpLtHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::LT)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(Word256::from(lhs < rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `GT` opcode.
pub struct OpGtHandler;
impl OpcodeHandler for OpGtHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::GT)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(Word256::from(lhs > rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SLT` opcode.
pub struct OpSltHandler;
impl OpcodeHandler for OpSltHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SLT)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(Word256::from(lhs.slt(rhs)))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SGT` opcode.
pub struct OpSgtHandler;
impl OpcodeHandler for OpSgtHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SGT)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(Word256::from(lhs.sgt(rhs)))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `EQ` opcode.
pub struct OpEqHandler;
impl OpcodeHandler for OpEqHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::EQ)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(Word256::from(lhs == rhs))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `ISZERO` opcode.
pub struct OpIsZeroHandler;
impl OpcodeHandler for OpIsZeroHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::ISZERO)?;

        let value = frame.stack.pop1()?;
        frame.stack.push(Word256::from(value.is_zero()))?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `AND` opcode.
pub struct OpAndHandler;
impl OpcodeHandler for OpAndHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::AND)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs & rhs)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `OR` opcode.
pub struct OpOrHandler;
impl OpcodeHandler for OpOrHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::OR)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs | rhs)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `XOR` opcode.
pub struct OpXorHandler;
impl OpcodeHandler for OpXorHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::XOR)?;

        let [lhs, rhs] = frame.stack.pop()?;
        frame.stack.push(lhs ^ rhs)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `NOT` opcode.
pub struct OpNotHandler;
impl OpcodeHandler for OpNotHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::NOT)?;

        let value = frame.stack.pop1()?;
        frame.stack.push(!value)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `BYTE` opcode.
pub struct OpByteHandler;
impl OpcodeHandler for OpByteHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::BYTE)?;

        let [index, value] = frame.stack.pop()?;
        let byte = match index.to_u64() {
            Some(index) if index < 32 => value.byte_at(index as usize),
            _ => Word256::ZERO,
        };
        frame.stack.push(byte)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SHL` opcode.
pub struct OpShlHandler;
impl OpcodeHandler for OpShlHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SHL)?;

        let [shift, value] = frame.stack.pop()?;
        let result = match shift.to_u64() {
            Some(shift) if shift < 256 => value.shl(shift as usize),
            _ => Word256::ZERO,
        };
        frame.stack.push(result)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SHR` opcode.
pub struct OpShrHandler;
impl OpcodeHandler for OpShrHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SHR)?;

        let [shift, value] = frame.stack.pop()?;
        let result = match shift.to_u64() {
            Some(shift) if shift < 256 => value.shr(shift as usize),
            _ => Word256::ZERO,
        };
        frame.stack.push(result)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

/// Implementation for the `SAR` opcode. Oversized shifts saturate to the
/// sign.
pub struct OpSarHandler;
impl OpcodeHandler for OpSarHandler {
    fn eval(_vm: &mut Vm<'_>, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(gas_cost::SAR)?;

        let [shift, value] = frame.stack.pop()?;
        let result = match shift.to_u64() {
            Some(shift) if shift < 256 => value.sar(shift as usize),
            _ if value.is_negative() => Word256::MAX,
            _ => Word256::ZERO,
        };
        frame.stack.push(result)?;

        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::tests::run_code;
    use crate::word::Word256;

    #[test]
    fn comparisons_deliver_one_or_zero() {
        // PUSH1 5, PUSH1 3, LT -> 3 < 5
        let (stack, _) = run_code(&[0x60, 0x05, 0x60, 0x03, 0x10]).unwrap();
        assert_eq!(stack, vec![Word256::ONE]);
        // PUSH1 5, PUSH1 3, GT -> 3 > 5
        let (stack, _) = run_code(&[0x60, 0x05, 0x60, 0x03, 0x11]).unwrap();
        assert_eq!(stack, vec![Word256::ZERO]);
    }

    #[test]
    fn slt_sees_all_ones_as_minus_one() {
        // PUSH1 0, PUSH32 0xff..ff, SLT -> -1 < 0
        let mut code = vec![0x60, 0x00, 0x7f];
        code.extend([0xff; 32]);
        code.push(0x12);
        let (stack, _) = run_code(&code).unwrap();
        assert_eq!(stack, vec![Word256::ONE]);
    }

    #[test]
    fn byte_indexes_big_endian() {
        // PUSH2 0xaabb, PUSH1 31, BYTE -> 0xbb
        let (stack, _) = run_code(&[0x61, 0xaa, 0xbb, 0x60, 0x1f, 0x1a]).unwrap();
        assert_eq!(stack, vec![Word256::from(0xbbu64)]);
        // Index 32 is out of range.
        let (stack, _) = run_code(&[0x61, 0xaa, 0xbb, 0x60, 0x20, 0x1a]).unwrap();
        assert_eq!(stack, vec![Word256::ZERO]);
    }

    #[test]
    fn oversized_shifts_clear_or_saturate() {
        // PUSH1 1, PUSH2 0x0100, SHL -> shift of 256 clears.
        let (stack, _) = run_code(&[0x60, 0x01, 0x61, 0x01, 0x00, 0x1b]).unwrap();
        assert_eq!(stack, vec![Word256::ZERO]);
        // PUSH32 all-ones, PUSH2 0x0100, SAR -> saturates to all-ones.
        let mut code = vec![0x7f];
        code.extend([0xff; 32]);
        code.extend([0x61, 0x01, 0x00, 0x1d]);
        let (stack, _) = run_code(&code).unwrap();
        assert_eq!(stack, vec![Word256::MAX]);
    }
}
