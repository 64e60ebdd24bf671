use std::fmt;
use std::sync::LazyLock;

use crate::call_frame::CallFrame;
use crate::constants::STACK_LIMIT;
use crate::errors::{OpcodeResult, VMError};
use crate::opcode_handlers::{
    arithmetic::*, bitwise_comparison::*, block::*, dup::*, environment::*, exchange::*,
    keccak::*, logging::*, push::*, stack_memory_storage_flow::*, system::*, OpInvalidHandler,
    OpStopHandler, OpcodeHandler,
};
use crate::vm::Vm;

/// The post-Constantinople instruction set.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Hash)]
pub enum Opcode {
    // Stop and arithmetic operations
    STOP = 0x00,
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0A,
    SIGNEXTEND = 0x0B,

    // Comparison & bitwise logic operations
    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1A,
    SHL = 0x1B,
    SHR = 0x1C,
    SAR = 0x1D,

    // KECCAK256
    KECCAK256 = 0x20,

    // Environmental information
    ADDRESS = 0x30,
    BALANCE = 0x31,
    ORIGIN = 0x32,
    CALLER = 0x33,
    CALLVALUE = 0x34,
    CALLDATALOAD = 0x35,
    CALLDATASIZE = 0x36,
    CALLDATACOPY = 0x37,
    CODESIZE = 0x38,
    CODECOPY = 0x39,
    GASPRICE = 0x3A,
    EXTCODESIZE = 0x3B,
    EXTCODECOPY = 0x3C,
    RETURNDATASIZE = 0x3D,
    RETURNDATACOPY = 0x3E,
    EXTCODEHASH = 0x3F,

    // Block information
    BLOCKHASH = 0x40,
    COINBASE = 0x41,
    TIMESTAMP = 0x42,
    NUMBER = 0x43,
    DIFFICULTY = 0x44,
    GASLIMIT = 0x45,

    // Stack, memory, storage and flow operations
    POP = 0x50,
    MLOAD = 0x51,
    MSTORE = 0x52,
    MSTORE8 = 0x53,
    SLOAD = 0x54,
    SSTORE = 0x55,
    JUMP = 0x56,
    JUMPI = 0x57,
    PC = 0x58,
    MSIZE = 0x59,
    GAS = 0x5A,
    JUMPDEST = 0x5B,

    // Push operations
    PUSH1 = 0x60,
    PUSH2 = 0x61,
    PUSH3 = 0x62,
    PUSH4 = 0x63,
    PUSH5 = 0x64,
    PUSH6 = 0x65,
    PUSH7 = 0x66,
    PUSH8 = 0x67,
    PUSH9 = 0x68,
    PUSH10 = 0x69,
    PUSH11 = 0x6A,
    PUSH12 = 0x6B,
    PUSH13 = 0x6C,
    PUSH14 = 0x6D,
    PUSH15 = 0x6E,
    PUSH16 = 0x6F,
    PUSH17 = 0x70,
    PUSH18 = 0x71,
    PUSH19 = 0x72,
    PUSH20 = 0x73,
    PUSH21 = 0x74,
    PUSH22 = 0x75,
    PUSH23 = 0x76,
    PUSH24 = 0x77,
    PUSH25 = 0x78,
    PUSH26 = 0x79,
    PUSH27 = 0x7A,
    PUSH28 = 0x7B,
    PUSH29 = 0x7C,
    PUSH30 = 0x7D,
    PUSH31 = 0x7E,
    PUSH32 = 0x7F,

    // Duplication operations
    DUP1 = 0x80,
    DUP2 = 0x81,
    DUP3 = 0x82,
    DUP4 = 0x83,
    DUP5 = 0x84,
    DUP6 = 0x85,
    DUP7 = 0x86,
    DUP8 = 0x87,
    DUP9 = 0x88,
    DUP10 = 0x89,
    DUP11 = 0x8A,
    DUP12 = 0x8B,
    DUP13 = 0x8C,
    DUP14 = 0x8D,
    DUP15 = 0x8E,
    DUP16 = 0x8F,

    // Swap operations
    SWAP1 = 0x90,
    SWAP2 = 0x91,
    SWAP3 = 0x92,
    SWAP4 = 0x93,
    SWAP5 = 0x94,
    SWAP6 = 0x95,
    SWAP7 = 0x96,
    SWAP8 = 0x97,
    SWAP9 = 0x98,
    SWAP10 = 0x99,
    SWAP11 = 0x9A,
    SWAP12 = 0x9B,
    SWAP13 = 0x9C,
    SWAP14 = 0x9D,
    SWAP15 = 0x9E,
    SWAP16 = 0x9F,

    // Logging operations
    LOG0 = 0xA0,
    LOG1 = 0xA1,
    LOG2 = 0xA2,
    LOG3 = 0xA3,
    LOG4 = 0xA4,

    // System operations
    CREATE = 0xF0,
    CALL = 0xF1,
    CALLCODE = 0xF2,
    RETURN = 0xF3,
    DELEGATECALL = 0xF4,
    CREATE2 = 0xF5,
    STATICCALL = 0xFA,
    REVERT = 0xFD,
    INVALID = 0xFE,
    SELFDESTRUCT = 0xFF,
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        OPCODE_NAMES[byte as usize]
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type OpHandler = fn(&mut Vm<'_>, &mut CallFrame) -> Result<OpcodeResult, VMError>;

/// Dispatch metadata for one opcode byte: the handler, the minimum stack
/// depth it needs, and the maximum depth it may start from without
/// overflowing (1024 + pops - pushes).
#[derive(Clone, Copy)]
pub struct OpcodeInfo {
    pub handler: OpHandler,
    pub min_stack: usize,
    pub max_stack: usize,
}

fn info(handler: OpHandler, pops: usize, pushes: usize) -> OpcodeInfo {
    OpcodeInfo {
        handler,
        min_stack: pops,
        max_stack: STACK_LIMIT + pops - pushes,
    }
}

/// The statically built dispatch table. Bytes without an instruction map to
/// the INVALID handler.
pub static OPCODE_TABLE: LazyLock<[OpcodeInfo; 256]> = LazyLock::new(build_opcode_table);

static OPCODE_NAMES: LazyLock<[Opcode; 256]> = LazyLock::new(build_opcode_names);

fn build_opcode_table() -> [OpcodeInfo; 256] {
    let mut table = [info(OpInvalidHandler::eval, 0, 0); 256];

    table[Opcode::STOP as usize] = info(OpStopHandler::eval, 0, 0);
    table[Opcode::ADD as usize] = info(OpAddHandler::eval, 2, 1);
    table[Opcode::MUL as usize] = info(OpMulHandler::eval, 2, 1);
    table[Opcode::SUB as usize] = info(OpSubHandler::eval, 2, 1);
    table[Opcode::DIV as usize] = info(OpDivHandler::eval, 2, 1);
    table[Opcode::SDIV as usize] = info(OpSDivHandler::eval, 2, 1);
    table[Opcode::MOD as usize] = info(OpModHandler::eval, 2, 1);
    table[Opcode::SMOD as usize] = info(OpSModHandler::eval, 2, 1);
    table[Opcode::ADDMOD as usize] = info(OpAddModHandler::eval, 3, 1);
    table[Opcode::MULMOD as usize] = info(OpMulModHandler::eval, 3, 1);
    table[Opcode::EXP as usize] = info(OpExpHandler::eval, 2, 1);
    table[Opcode::SIGNEXTEND as usize] = info(OpSignExtendHandler::eval, 2, 1);

    table[Opcode::LT as usize] = info(OpLtHandler::eval, 2, 1);
    table[Opcode::GT as usize] = info(OpGtHandler::eval, 2, 1);
    table[Opcode::SLT as usize] = info(OpSltHandler::eval, 2, 1);
    table[Opcode::SGT as usize] = info(OpSgtHandler::eval, 2, 1);
    table[Opcode::EQ as usize] = info(OpEqHandler::eval, 2, 1);
    table[Opcode::ISZERO as usize] = info(OpIsZeroHandler::eval, 1, 1);
    table[Opcode::AND as usize] = info(OpAndHandler::eval, 2, 1);
    table[Opcode::OR as usize] = info(OpOrHandler::eval, 2, 1);
    table[Opcode::XOR as usize] = info(OpXorHandler::eval, 2, 1);
    table[Opcode::NOT as usize] = info(OpNotHandler::eval, 1, 1);
    table[Opcode::BYTE as usize] = info(OpByteHandler::eval, 2, 1);
    table[Opcode::SHL as usize] = info(OpShlHandler::eval, 2, 1);
    table[Opcode::SHR as usize] = info(OpShrHandler::eval, 2, 1);
    table[Opcode::SAR as usize] = info(OpSarHandler::eval, 2, 1);

    table[Opcode::KECCAK256 as usize] = info(OpKeccakHandler::eval, 2, 1);

    table[Opcode::ADDRESS as usize] = info(OpAddressHandler::eval, 0, 1);
    table[Opcode::BALANCE as usize] = info(OpBalanceHandler::eval, 1, 1);
    table[Opcode::ORIGIN as usize] = info(OpOriginHandler::eval, 0, 1);
    table[Opcode::CALLER as usize] = info(OpCallerHandler::eval, 0, 1);
    table[Opcode::CALLVALUE as usize] = info(OpCallValueHandler::eval, 0, 1);
    table[Opcode::CALLDATALOAD as usize] = info(OpCallDataLoadHandler::eval, 1, 1);
    table[Opcode::CALLDATASIZE as usize] = info(OpCallDataSizeHandler::eval, 0, 1);
    table[Opcode::CALLDATACOPY as usize] = info(OpCallDataCopyHandler::eval, 3, 0);
    table[Opcode::CODESIZE as usize] = info(OpCodeSizeHandler::eval, 0, 1);
    table[Opcode::CODECOPY as usize] = info(OpCodeCopyHandler::eval, 3, 0);
    table[Opcode::GASPRICE as usize] = info(OpGasPriceHandler::eval, 0, 1);
    table[Opcode::EXTCODESIZE as usize] = info(OpExtCodeSizeHandler::eval, 1, 1);
    table[Opcode::EXTCODECOPY as usize] = info(OpExtCodeCopyHandler::eval, 4, 0);
    table[Opcode::RETURNDATASIZE as usize] = info(OpReturnDataSizeHandler::eval, 0, 1);
    table[Opcode::RETURNDATACOPY as usize] = info(OpReturnDataCopyHandler::eval, 3, 0);
    table[Opcode::EXTCODEHASH as usize] = info(OpExtCodeHashHandler::eval, 1, 1);

    table[Opcode::BLOCKHASH as usize] = info(OpBlockHashHandler::eval, 1, 1);
    table[Opcode::COINBASE as usize] = info(OpCoinbaseHandler::eval, 0, 1);
    table[Opcode::TIMESTAMP as usize] = info(OpTimestampHandler::eval, 0, 1);
    table[Opcode::NUMBER as usize] = info(OpNumberHandler::eval, 0, 1);
    table[Opcode::DIFFICULTY as usize] = info(OpDifficultyHandler::eval, 0, 1);
    table[Opcode::GASLIMIT as usize] = info(OpGasLimitHandler::eval, 0, 1);

    table[Opcode::POP as usize] = info(OpPopHandler::eval, 1, 0);
    table[Opcode::MLOAD as usize] = info(OpMLoadHandler::eval, 1, 1);
    table[Opcode::MSTORE as usize] = info(OpMStoreHandler::eval, 2, 0);
    table[Opcode::MSTORE8 as usize] = info(OpMStore8Handler::eval, 2, 0);
    table[Opcode::SLOAD as usize] = info(OpSLoadHandler::eval, 1, 1);
    table[Opcode::SSTORE as usize] = info(OpSStoreHandler::eval, 2, 0);
    table[Opcode::JUMP as usize] = info(OpJumpHandler::eval, 1, 0);
    table[Opcode::JUMPI as usize] = info(OpJumpiHandler::eval, 2, 0);
    table[Opcode::PC as usize] = info(OpPcHandler::eval, 0, 1);
    table[Opcode::MSIZE as usize] = info(OpMSizeHandler::eval, 0, 1);
    table[Opcode::GAS as usize] = info(OpGasHandler::eval, 0, 1);
    table[Opcode::JUMPDEST as usize] = info(OpJumpdestHandler::eval, 0, 0);

    for n in 0..32usize {
        table[Opcode::PUSH1 as usize + n] = info(OpPushHandler::eval, 0, 1);
    }
    for n in 1..=16usize {
        table[Opcode::DUP1 as usize + n - 1] = info(OpDupHandler::eval, n, n + 1);
        table[Opcode::SWAP1 as usize + n - 1] = info(OpSwapHandler::eval, n + 1, n + 1);
    }
    for n in 0..=4usize {
        table[Opcode::LOG0 as usize + n] = info(OpLogHandler::eval, n + 2, 0);
    }

    table[Opcode::CREATE as usize] = info(OpCreateHandler::eval, 3, 1);
    table[Opcode::CALL as usize] = info(OpCallHandler::eval, 7, 1);
    table[Opcode::CALLCODE as usize] = info(OpCallCodeHandler::eval, 7, 1);
    table[Opcode::RETURN as usize] = info(OpReturnHandler::eval, 2, 0);
    table[Opcode::DELEGATECALL as usize] = info(OpDelegateCallHandler::eval, 6, 1);
    table[Opcode::CREATE2 as usize] = info(OpCreate2Handler::eval, 4, 1);
    table[Opcode::STATICCALL as usize] = info(OpStaticCallHandler::eval, 6, 1);
    table[Opcode::REVERT as usize] = info(OpRevertHandler::eval, 2, 0);
    table[Opcode::INVALID as usize] = info(OpInvalidHandler::eval, 0, 0);
    table[Opcode::SELFDESTRUCT as usize] = info(OpSelfDestructHandler::eval, 1, 0);

    table
}

fn build_opcode_names() -> [Opcode; 256] {
    use Opcode::*;
    let mut names = [INVALID; 256];
    let all = [
        STOP, ADD, MUL, SUB, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP, SIGNEXTEND, LT, GT, SLT,
        SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR, KECCAK256, ADDRESS, BALANCE,
        ORIGIN, CALLER, CALLVALUE, CALLDATALOAD, CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY,
        GASPRICE, EXTCODESIZE, EXTCODECOPY, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH,
        BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, DIFFICULTY, GASLIMIT, POP, MLOAD, MSTORE,
        MSTORE8, SLOAD, SSTORE, JUMP, JUMPI, PC, MSIZE, GAS, JUMPDEST, PUSH1, PUSH2, PUSH3,
        PUSH4, PUSH5, PUSH6, PUSH7, PUSH8, PUSH9, PUSH10, PUSH11, PUSH12, PUSH13, PUSH14,
        PUSH15, PUSH16, PUSH17, PUSH18, PUSH19, PUSH20, PUSH21, PUSH22, PUSH23, PUSH24, PUSH25,
        PUSH26, PUSH27, PUSH28, PUSH29, PUSH30, PUSH31, PUSH32, DUP1, DUP2, DUP3, DUP4, DUP5,
        DUP6, DUP7, DUP8, DUP9, DUP10, DUP11, DUP12, DUP13, DUP14, DUP15, DUP16, SWAP1, SWAP2,
        SWAP3, SWAP4, SWAP5, SWAP6, SWAP7, SWAP8, SWAP9, SWAP10, SWAP11, SWAP12, SWAP13, SWAP14,
        SWAP15, SWAP16, LOG0, LOG1, LOG2, LOG3, LOG4, CREATE, CALL, CALLCODE, RETURN,
        DELEGATECALL, CREATE2, STATICCALL, REVERT, INVALID, SELFDESTRUCT,
    ];
    for opcode in all {
        names[opcode as usize] = opcode;
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_lookup_roundtrips() {
        assert_eq!(Opcode::from(0x01), Opcode::ADD);
        assert_eq!(Opcode::from(0x5b), Opcode::JUMPDEST);
        assert_eq!(Opcode::from(0xff), Opcode::SELFDESTRUCT);
        assert_eq!(Opcode::from(0x0c), Opcode::INVALID);
        assert_eq!(Opcode::from(0x21), Opcode::INVALID);
    }

    #[test]
    fn stack_metadata_matches_arity() {
        let add = &OPCODE_TABLE[Opcode::ADD as usize];
        assert_eq!(add.min_stack, 2);
        assert_eq!(add.max_stack, STACK_LIMIT + 1);

        let push = &OPCODE_TABLE[Opcode::PUSH1 as usize];
        assert_eq!(push.min_stack, 0);
        assert_eq!(push.max_stack, STACK_LIMIT - 1);

        let dup16 = &OPCODE_TABLE[Opcode::DUP16 as usize];
        assert_eq!(dup16.min_stack, 16);
        assert_eq!(dup16.max_stack, STACK_LIMIT + 15);

        let call = &OPCODE_TABLE[Opcode::CALL as usize];
        assert_eq!(call.min_stack, 7);
    }
}
