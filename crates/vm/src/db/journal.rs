use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

/// A reversible state edit. The journal is append-only during execution;
/// reverting to a snapshot undoes entries in LIFO order.
#[derive(Debug, Clone)]
pub enum JournalEntry {
    /// The account did not exist before this write.
    AccountCreated { address: Address },
    /// First touch of the account in this transaction (EIP-158 bookkeeping).
    AccountTouched { address: Address },
    BalanceChange { address: Address, prev: U256 },
    NonceChange { address: Address, prev: u64 },
    /// `prev` is `None` when the slot was absent, preserving the
    /// zero-versus-absent distinction on revert.
    StorageChange {
        address: Address,
        key: H256,
        prev: Option<U256>,
    },
    CodeChange {
        address: Address,
        prev_code: Bytes,
        prev_code_hash: H256,
    },
    LogAppend { tx_hash: H256 },
    SuicideFlip {
        address: Address,
        prev_balance: U256,
    },
    RefundChange { prev: u64 },
    PreimageAdded { hash: H256 },
}
