use ethereum_types::{Address, H256, U256};

/// Resolves a block number to its hash. The harness wires this to its own
/// deterministic getter; defaults to zero hashes.
pub type BlockHashFn = fn(u64) -> H256;

fn zero_block_hash(_number: u64) -> H256 {
    H256::zero()
}

/// Block context plus the originating transaction's fields that opcodes can
/// observe.
#[derive(Clone, Debug)]
pub struct Environment {
    pub origin: Address,
    pub gas_price: U256,
    pub chain_id: u64,
    pub coinbase: Address,
    pub difficulty: U256,
    pub block_gas_limit: u64,
    pub block_number: u64,
    pub timestamp: u64,
    pub block_hash_fn: BlockHashFn,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            origin: Address::zero(),
            gas_price: U256::zero(),
            chain_id: 1,
            coinbase: Address::zero(),
            difficulty: U256::zero(),
            block_gas_limit: 0,
            block_number: 0,
            timestamp: 0,
            block_hash_fn: zero_block_hash,
        }
    }
}
