//! Gas costs of the post-Constantinople instruction set: constant base
//! costs plus the dynamic cost functions for memory-touching, storage,
//! exponentiation, copy, call and log opcodes.

use ethereum_types::U256;

use crate::constants::{
    TX_BASE_COST, TX_CREATE_COST, TX_DATA_NON_ZERO_COST, TX_DATA_ZERO_COST,
    WORD_SIZE_IN_BYTES_USIZE,
};
use crate::errors::{ExceptionalHalt, TxValidationError, VMError};
use crate::memory::expansion_cost;
use crate::word::Word256;

// Opcode base costs.
pub const STOP: u64 = 0;
pub const ADD: u64 = 3;
pub const MUL: u64 = 5;
pub const SUB: u64 = 3;
pub const DIV: u64 = 5;
pub const SDIV: u64 = 5;
pub const MOD: u64 = 5;
pub const SMOD: u64 = 5;
pub const ADDMOD: u64 = 8;
pub const MULMOD: u64 = 8;
pub const EXP_STATIC: u64 = 10;
pub const EXP_DYNAMIC_BASE: u64 = 50;
pub const SIGNEXTEND: u64 = 5;
pub const LT: u64 = 3;
pub const GT: u64 = 3;
pub const SLT: u64 = 3;
pub const SGT: u64 = 3;
pub const EQ: u64 = 3;
pub const ISZERO: u64 = 3;
pub const AND: u64 = 3;
pub const OR: u64 = 3;
pub const XOR: u64 = 3;
pub const NOT: u64 = 3;
pub const BYTE: u64 = 3;
pub const SHL: u64 = 3;
pub const SHR: u64 = 3;
pub const SAR: u64 = 3;
pub const SHA3_STATIC: u64 = 30;
pub const SHA3_DYNAMIC_BASE: u64 = 6;
pub const ADDRESS: u64 = 2;
pub const BALANCE: u64 = 400;
pub const ORIGIN: u64 = 2;
pub const CALLER: u64 = 2;
pub const CALLVALUE: u64 = 2;
pub const CALLDATALOAD: u64 = 3;
pub const CALLDATASIZE: u64 = 2;
pub const CALLDATACOPY_STATIC: u64 = 3;
pub const CODESIZE: u64 = 2;
pub const CODECOPY_STATIC: u64 = 3;
pub const GASPRICE: u64 = 2;
pub const EXTCODESIZE: u64 = 700;
pub const EXTCODECOPY_STATIC: u64 = 700;
pub const RETURNDATASIZE: u64 = 2;
pub const RETURNDATACOPY_STATIC: u64 = 3;
pub const EXTCODEHASH: u64 = 400;
pub const BLOCKHASH: u64 = 20;
pub const COINBASE: u64 = 2;
pub const TIMESTAMP: u64 = 2;
pub const NUMBER: u64 = 2;
pub const DIFFICULTY: u64 = 2;
pub const GASLIMIT: u64 = 2;
pub const POP: u64 = 2;
pub const MLOAD_STATIC: u64 = 3;
pub const MSTORE_STATIC: u64 = 3;
pub const MSTORE8_STATIC: u64 = 3;
pub const SLOAD: u64 = 200;
pub const JUMP: u64 = 8;
pub const JUMPI: u64 = 10;
pub const PC: u64 = 2;
pub const MSIZE: u64 = 2;
pub const GAS: u64 = 2;
pub const JUMPDEST: u64 = 1;
pub const PUSHN: u64 = 3;
pub const DUPN: u64 = 3;
pub const SWAPN: u64 = 3;
pub const LOGN_STATIC: u64 = 375;
pub const LOGN_DYNAMIC_TOPIC_BASE: u64 = 375;
pub const LOGN_DYNAMIC_BYTE_BASE: u64 = 8;
pub const COPY_WORD_COST: u64 = 3;

pub const CREATE_BASE: u64 = 32000;
pub const CODE_DEPOSIT_COST: u64 = 200;

pub const CALL_BASE: u64 = 700;
pub const CALL_VALUE_TRANSFER: u64 = 9000;
pub const CALL_NEW_ACCOUNT: u64 = 25000;
pub const CALL_STIPEND: u64 = 2300;

pub const SSTORE_SET: u64 = 20000;
pub const SSTORE_RESET: u64 = 5000;
pub const SSTORE_CLEAR_REFUND: u64 = 15000;

pub const SELFDESTRUCT_STATIC: u64 = 5000;
pub const SELFDESTRUCT_NEW_ACCOUNT: u64 = 25000;
pub const SELFDESTRUCT_REFUND: u64 = 24000;

/// EXP: 10 + 50 per byte of the exponent.
pub fn exp(exponent: Word256) -> Result<u64, VMError> {
    EXP_DYNAMIC_BASE
        .checked_mul(exponent.byte_len() as u64)
        .and_then(|dynamic| EXP_STATIC.checked_add(dynamic))
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

fn word_count(size: usize) -> u64 {
    size.div_ceil(WORD_SIZE_IN_BYTES_USIZE) as u64
}

/// SHA3: 30 + 6 per hashed word, plus memory expansion.
pub fn sha3(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    let hashing = SHA3_DYNAMIC_BASE
        .checked_mul(word_count(size))
        .and_then(|dynamic| SHA3_STATIC.checked_add(dynamic))
        .ok_or(ExceptionalHalt::OutOfGas)?;
    hashing
        .checked_add(expansion_cost(new_memory_size, current_memory_size)?)
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// The *COPY family: a static base + 3 per copied word + memory expansion.
pub fn copy(
    static_cost: u64,
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    COPY_WORD_COST
        .checked_mul(word_count(size))
        .and_then(|words| static_cost.checked_add(words))
        .and_then(|cost| {
            cost.checked_add(expansion_cost(new_memory_size, current_memory_size).ok()?)
        })
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// Memory-only opcodes: static cost plus expansion.
pub fn with_expansion(
    static_cost: u64,
    new_memory_size: usize,
    current_memory_size: usize,
) -> Result<u64, VMError> {
    static_cost
        .checked_add(expansion_cost(new_memory_size, current_memory_size)?)
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// LOGn: 375 + 375 per topic + 8 per byte of data, plus memory expansion.
pub fn log(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    topic_count: u64,
) -> Result<u64, VMError> {
    let topics = LOGN_DYNAMIC_TOPIC_BASE
        .checked_mul(topic_count)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let data = LOGN_DYNAMIC_BYTE_BASE
        .checked_mul(size as u64)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    LOGN_STATIC
        .checked_add(topics)
        .and_then(|cost| cost.checked_add(data))
        .and_then(|cost| {
            cost.checked_add(expansion_cost(new_memory_size, current_memory_size).ok()?)
        })
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// SSTORE under the simple (pre-net-metering) rules: 20000 to fill a zero
/// slot, 5000 otherwise, with a 15000 refund for clearing. Returns
/// (cost, refund).
pub fn sstore(current: U256, new: U256) -> (u64, u64) {
    let cost = if current.is_zero() && !new.is_zero() {
        SSTORE_SET
    } else {
        SSTORE_RESET
    };
    let refund = if !current.is_zero() && new.is_zero() {
        SSTORE_CLEAR_REFUND
    } else {
        0
    };
    (cost, refund)
}

/// CREATE2 additionally hashes the init code at the SHA3 word rate.
pub fn create2_hash_cost(init_code_size: usize) -> Result<u64, VMError> {
    SHA3_DYNAMIC_BASE
        .checked_mul(word_count(init_code_size))
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// The constant part of a CALL-family opcode: base cost, value-transfer
/// surcharge and the new-account surcharge.
pub fn call_extra_cost(transfers_value: bool, to_new_account: bool) -> u64 {
    let mut cost = CALL_BASE;
    if transfers_value {
        cost += CALL_VALUE_TRANSFER;
    }
    if to_new_account {
        cost += CALL_NEW_ACCOUNT;
    }
    cost
}

/// EIP-150: a sub-call may receive at most 63/64 of the gas remaining after
/// the call's own costs.
pub fn max_call_gas(remaining: u64) -> u64 {
    remaining - remaining / 64
}

pub fn selfdestruct(to_new_account: bool) -> u64 {
    if to_new_account {
        SELFDESTRUCT_STATIC + SELFDESTRUCT_NEW_ACCOUNT
    } else {
        SELFDESTRUCT_STATIC
    }
}

pub fn code_deposit(code_size: usize) -> Result<u64, VMError> {
    CODE_DEPOSIT_COST
        .checked_mul(code_size as u64)
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// The minimum gas a transaction must carry before any code runs:
/// 21000 + 68 per non-zero calldata byte + 4 per zero byte, plus 32000 for
/// contract creation.
pub fn intrinsic_gas(data: &[u8], is_create: bool) -> Result<u64, TxValidationError> {
    let mut gas = TX_BASE_COST;
    if is_create {
        gas += TX_CREATE_COST;
    }
    let non_zero = data.iter().filter(|byte| **byte != 0).count() as u64;
    let zero = data.len() as u64 - non_zero;
    gas = non_zero
        .checked_mul(TX_DATA_NON_ZERO_COST)
        .and_then(|cost| gas.checked_add(cost))
        .ok_or(TxValidationError::IntrinsicGasTooLow {
            intrinsic: u64::MAX,
            limit: 0,
        })?;
    gas = zero
        .checked_mul(TX_DATA_ZERO_COST)
        .and_then(|cost| gas.checked_add(cost))
        .ok_or(TxValidationError::IntrinsicGasTooLow {
            intrinsic: u64::MAX,
            limit: 0,
        })?;
    Ok(gas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_charges_per_exponent_byte() {
        assert_eq!(exp(Word256::ZERO).unwrap(), 10);
        assert_eq!(exp(Word256::from(0xff)).unwrap(), 60);
        assert_eq!(exp(Word256::from(0x100)).unwrap(), 110);
        assert_eq!(exp(Word256::MAX).unwrap(), 10 + 50 * 32);
    }

    #[test]
    fn sha3_charges_per_word() {
        assert_eq!(sha3(0, 0, 0).unwrap(), 30);
        assert_eq!(sha3(32, 32, 32).unwrap(), 36);
        assert_eq!(sha3(64, 64, 33).unwrap(), 42);
    }

    #[test]
    fn sstore_rule_matrix() {
        let zero = U256::zero();
        let one = U256::one();
        assert_eq!(sstore(zero, one), (SSTORE_SET, 0));
        assert_eq!(sstore(one, one), (SSTORE_RESET, 0));
        assert_eq!(sstore(one, zero), (SSTORE_RESET, SSTORE_CLEAR_REFUND));
        assert_eq!(sstore(zero, zero), (SSTORE_RESET, 0));
    }

    #[test]
    fn sixty_three_sixty_fourths() {
        assert_eq!(max_call_gas(6400), 6300);
        assert_eq!(max_call_gas(64), 63);
        assert_eq!(max_call_gas(63), 63);
        assert_eq!(max_call_gas(0), 0);
    }

    #[test]
    fn intrinsic_gas_counts_calldata_bytes() {
        assert_eq!(intrinsic_gas(&[], false).unwrap(), 21000);
        assert_eq!(intrinsic_gas(&[], true).unwrap(), 53000);
        assert_eq!(intrinsic_gas(&[0, 0, 1], false).unwrap(), 21000 + 4 + 4 + 68);
    }

    #[test]
    fn call_extra_cost_combines_surcharges() {
        assert_eq!(call_extra_cost(false, false), 700);
        assert_eq!(call_extra_cost(true, false), 9700);
        assert_eq!(call_extra_cost(true, true), 34700);
    }
}
