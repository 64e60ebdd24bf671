use crate::word::Word256;

pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

pub const STACK_LIMIT: usize = 1024;
pub const MAX_CALL_DEPTH: usize = 1024;

pub const SUCCESS: Word256 = Word256::ONE;
pub const FAIL: Word256 = Word256::ZERO;

pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;

// Transaction costs in gas.
pub const TX_BASE_COST: u64 = 21000;
pub const TX_DATA_ZERO_COST: u64 = 4;
pub const TX_DATA_NON_ZERO_COST: u64 = 68;
pub const TX_CREATE_COST: u64 = 32000;

/// Deployed code size cap, enforced on every CREATE/CREATE2 path.
pub const MAX_CODE_SIZE: usize = 0x6000;

/// BLOCKHASH reaches at most this many blocks back.
pub const BLOCKHASH_WINDOW: u64 = 256;
