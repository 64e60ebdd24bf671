use std::collections::BTreeMap;

use ethereum_types::{Address, H256, U256};
use uevm_common::constants::EMPTY_STORAGE_ROOT;
use uevm_common::merkle::compute_merkle_root;
use uevm_common::types::Account;
use uevm_common::utils::{keccak, u256_to_h256};

use crate::db::{AccountUpdate, Database, DumpAccount, StateDump};
use crate::errors::DatabaseError;

/// The harness's world-state backend: a sorted in-memory account table.
/// Roots are keccak merkle roots over the sorted entries, standing in for
/// the state trie a full node would keep.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: BTreeMap<Address, Account>,
}

impl InMemoryStore {
    pub fn new(accounts: BTreeMap<Address, Account>) -> Self {
        InMemoryStore { accounts }
    }

    pub fn state_root(&self) -> H256 {
        let leaves: Vec<H256> = self
            .accounts
            .iter()
            .map(|(address, account)| {
                let mut leaf = Vec::with_capacity(128);
                leaf.extend_from_slice(address.as_bytes());
                leaf.extend_from_slice(&account.encode_with_root(storage_root(account)));
                keccak(&leaf)
            })
            .collect();
        compute_merkle_root(&leaves)
    }
}

/// Root over the account's sorted non-zero slots; zero-valued slots are
/// deletions and never contribute.
pub fn storage_root(account: &Account) -> H256 {
    let leaves: Vec<H256> = account
        .storage
        .iter()
        .filter(|(_, value)| !value.is_zero())
        .map(|(key, value)| {
            let mut leaf = [0u8; 64];
            leaf[..32].copy_from_slice(key.as_bytes());
            leaf[32..].copy_from_slice(&u256_to_h256(*value).0);
            keccak(leaf)
        })
        .collect();
    if leaves.is_empty() {
        EMPTY_STORAGE_ROOT
    } else {
        compute_merkle_root(&leaves)
    }
}

impl Database for InMemoryStore {
    fn get_account(&self, address: Address) -> Result<Option<Account>, DatabaseError> {
        Ok(self.accounts.get(&address).cloned())
    }

    fn commit(&mut self, updates: Vec<AccountUpdate>) -> Result<H256, DatabaseError> {
        for update in updates {
            if update.removed {
                self.accounts.remove(&update.address);
            } else {
                let mut account = update.account;
                // Zero-valued slots are deletions.
                account.storage.retain(|_, value| !value.is_zero());
                self.accounts.insert(update.address, account);
            }
        }
        Ok(self.state_root())
    }

    fn dump(&self) -> Result<StateDump, DatabaseError> {
        let accounts = self
            .accounts
            .iter()
            .map(|(address, account)| {
                let storage = account
                    .storage
                    .iter()
                    .filter(|(_, value)| !value.is_zero())
                    .map(|(key, value)| (*key, u256_to_h256(*value)))
                    .collect();
                let dump = DumpAccount {
                    balance: account.info.balance,
                    nonce: account.info.nonce,
                    root: storage_root(account),
                    code_hash: account.info.code_hash,
                    code: account.code.clone(),
                    storage,
                };
                (*address, dump)
            })
            .collect();
        Ok(StateDump {
            root: self.state_root(),
            accounts,
        })
    }
}
