pub mod journal;
pub mod state_db;
pub mod store;

use std::collections::BTreeMap;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::Serialize;
use uevm_common::serde_utils;
use uevm_common::types::Account;

use crate::errors::DatabaseError;

pub use state_db::StateDb;
pub use store::InMemoryStore;

/// The boundary to the world-state backend (a Merkle-Patricia trie in a
/// full node; an in-memory table in this harness). The engine only ever
/// reads whole accounts and commits batched updates.
pub trait Database {
    fn get_account(&self, address: Address) -> Result<Option<Account>, DatabaseError>;

    /// Applies the updates and returns the new state root.
    fn commit(&mut self, updates: Vec<AccountUpdate>) -> Result<H256, DatabaseError>;

    /// Renders every account for the post-state output.
    fn dump(&self) -> Result<StateDump, DatabaseError>;
}

/// One account's pending write, produced by [`StateDb::commit`].
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub address: Address,
    /// Suicided or emptied per EIP-158; the account leaves the state.
    pub removed: bool,
    pub account: Account,
}

/// Post-state rendering of the whole world state.
#[derive(Debug, Clone, Serialize)]
pub struct StateDump {
    pub root: H256,
    pub accounts: BTreeMap<Address, DumpAccount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DumpAccount {
    #[serde(serialize_with = "serde_utils::u256::serialize_dec_str")]
    pub balance: U256,
    pub nonce: u64,
    pub root: H256,
    #[serde(rename = "codeHash")]
    pub code_hash: H256,
    #[serde(with = "serde_utils::bytes")]
    pub code: Bytes,
    pub storage: BTreeMap<H256, H256>,
}
