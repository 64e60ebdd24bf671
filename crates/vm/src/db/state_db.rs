use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use uevm_common::types::{Account, Log};

use crate::db::journal::JournalEntry;
use crate::db::{AccountUpdate, Database, StateDump};
use crate::errors::{DatabaseError, ExceptionalHalt, InternalError, VMError};

/// Account-keyed world state with journaled writes. Every mutation records
/// a reversible entry; [`StateDb::snapshot`] marks a point and
/// [`StateDb::revert_to`] undoes everything after it in LIFO order. The
/// store behind the [`Database`] trait is only written on [`StateDb::commit`].
pub struct StateDb {
    store: Box<dyn Database>,
    /// Working copies of every account read or written so far.
    accounts: HashMap<Address, Account>,
    /// Addresses present in the state (loaded from the store or created by
    /// a write).
    existing: HashSet<Address>,
    /// Addresses touched by this transaction (EIP-158 bookkeeping).
    touched: HashSet<Address>,
    suicided: HashSet<Address>,
    /// Addresses removed by earlier transactions in the batch.
    destructed: HashSet<Address>,
    journal: Vec<JournalEntry>,
    logs: HashMap<H256, Vec<Log>>,
    preimages: HashMap<H256, Bytes>,
    refund: u64,
    tx_hash: H256,
    tx_index: usize,
}

/// Opaque marker for a point in execution, restorable with
/// [`StateDb::revert_to`].
pub type Snapshot = usize;

impl StateDb {
    pub fn new(store: Box<dyn Database>) -> Self {
        StateDb {
            store,
            accounts: HashMap::new(),
            existing: HashSet::new(),
            touched: HashSet::new(),
            suicided: HashSet::new(),
            destructed: HashSet::new(),
            journal: Vec::new(),
            logs: HashMap::new(),
            preimages: HashMap::new(),
            refund: 0,
            tx_hash: H256::zero(),
            tx_index: 0,
        }
    }

    /// Binds subsequent logs and journal entries to a transaction. Resets
    /// the per-transaction refund counter.
    pub fn prepare(&mut self, tx_hash: H256, tx_index: usize) {
        self.tx_hash = tx_hash;
        self.tx_index = tx_index;
        self.refund = 0;
    }

    fn load(&mut self, address: Address) -> Result<(), VMError> {
        if self.accounts.contains_key(&address) {
            return Ok(());
        }
        match self.store.get_account(address)? {
            Some(account) if !self.destructed.contains(&address) => {
                self.accounts.insert(address, account);
                self.existing.insert(address);
            }
            _ => {
                self.accounts.insert(address, Account::default());
            }
        }
        Ok(())
    }

    fn account(&mut self, address: Address) -> Result<&Account, VMError> {
        self.load(address)?;
        self.accounts
            .get(&address)
            .ok_or_else(|| InternalError::Custom("account not cached after load").into())
    }

    /// Mutable access for a write path: creates the account if absent and
    /// marks it touched.
    fn account_mut(&mut self, address: Address) -> Result<&mut Account, VMError> {
        self.load(address)?;
        if self.existing.insert(address) {
            self.journal.push(JournalEntry::AccountCreated { address });
        }
        if self.touched.insert(address) {
            self.journal.push(JournalEntry::AccountTouched { address });
        }
        self.accounts
            .get_mut(&address)
            .ok_or_else(|| InternalError::Custom("account not cached after load").into())
    }

    // ===================== Balances =====================

    pub fn get_balance(&mut self, address: Address) -> Result<U256, VMError> {
        Ok(self.account(address)?.info.balance)
    }

    pub fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), VMError> {
        let account = self.account_mut(address)?;
        let prev = account.info.balance;
        account.info.balance = prev
            .checked_add(amount)
            .ok_or(InternalError::Overflow)?;
        self.journal.push(JournalEntry::BalanceChange { address, prev });
        Ok(())
    }

    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), VMError> {
        let account = self.account_mut(address)?;
        let prev = account.info.balance;
        account.info.balance = prev
            .checked_sub(amount)
            .ok_or(InternalError::Underflow)?;
        self.journal.push(JournalEntry::BalanceChange { address, prev });
        Ok(())
    }

    /// Moves value between accounts, failing without side effects when the
    /// sender cannot cover it.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VMError> {
        if self.get_balance(from)? < value {
            return Err(ExceptionalHalt::InsufficientBalance.into());
        }
        self.sub_balance(from, value)?;
        self.add_balance(to, value)
    }

    // ===================== Nonces =====================

    pub fn get_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        Ok(self.account(address)?.info.nonce)
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), VMError> {
        let account = self.account_mut(address)?;
        let prev = account.info.nonce;
        account.info.nonce = nonce;
        self.journal.push(JournalEntry::NonceChange { address, prev });
        Ok(())
    }

    pub fn increment_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        let next = self
            .get_nonce(address)?
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;
        self.set_nonce(address, next)?;
        Ok(next)
    }

    // ===================== Code =====================

    pub fn get_code(&mut self, address: Address) -> Result<Bytes, VMError> {
        Ok(self.account(address)?.code.clone())
    }

    pub fn get_code_size(&mut self, address: Address) -> Result<usize, VMError> {
        Ok(self.account(address)?.code.len())
    }

    pub fn get_code_hash(&mut self, address: Address) -> Result<H256, VMError> {
        Ok(self.account(address)?.info.code_hash)
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), VMError> {
        let account = self.account_mut(address)?;
        let prev_code = account.code.clone();
        let prev_code_hash = account.info.code_hash;
        account.set_code(code);
        self.journal.push(JournalEntry::CodeChange {
            address,
            prev_code,
            prev_code_hash,
        });
        Ok(())
    }

    // ===================== Storage =====================

    pub fn get_state(&mut self, address: Address, key: H256) -> Result<U256, VMError> {
        Ok(self
            .account(address)?
            .storage
            .get(&key)
            .copied()
            .unwrap_or_default())
    }

    pub fn set_state(&mut self, address: Address, key: H256, value: U256) -> Result<(), VMError> {
        let account = self.account_mut(address)?;
        let prev = account.storage.insert(key, value);
        self.journal.push(JournalEntry::StorageChange {
            address,
            key,
            prev,
        });
        Ok(())
    }

    // ===================== Suicides =====================

    /// Flags the account for end-of-transaction destruction and clears its
    /// balance. Returns false when it was already flagged.
    pub fn suicide(&mut self, address: Address) -> Result<bool, VMError> {
        if self.suicided.contains(&address) {
            return Ok(false);
        }
        let account = self.account_mut(address)?;
        let prev_balance = account.info.balance;
        account.info.balance = U256::zero();
        self.suicided.insert(address);
        self.journal
            .push(JournalEntry::SuicideFlip { address, prev_balance });
        Ok(true)
    }

    pub fn has_suicided(&self, address: Address) -> bool {
        self.suicided.contains(&address)
    }

    // ===================== Existence =====================

    pub fn exist(&mut self, address: Address) -> Result<bool, VMError> {
        self.load(address)?;
        Ok(self.existing.contains(&address))
    }

    /// Empty per EIP-161: exists with zero nonce, zero balance and no code.
    pub fn is_empty(&mut self, address: Address) -> Result<bool, VMError> {
        Ok(self.exist(address)? && self.account(address)?.is_empty())
    }

    /// Dead per EIP-161: non-existent or empty. The new-account surcharges
    /// apply when the target is dead.
    pub fn is_dead(&mut self, address: Address) -> Result<bool, VMError> {
        Ok(!self.exist(address)? || self.account(address)?.is_empty())
    }

    // ===================== Logs, preimages, refunds =====================

    pub fn add_log(&mut self, log: Log) {
        self.logs.entry(self.tx_hash).or_default().push(log);
        self.journal.push(JournalEntry::LogAppend {
            tx_hash: self.tx_hash,
        });
    }

    pub fn logs(&self, tx_hash: H256) -> Vec<Log> {
        self.logs.get(&tx_hash).cloned().unwrap_or_default()
    }

    pub fn add_preimage(&mut self, hash: H256, preimage: Bytes) {
        if !self.preimages.contains_key(&hash) {
            self.preimages.insert(hash, preimage);
            self.journal.push(JournalEntry::PreimageAdded { hash });
        }
    }

    pub fn preimages(&self) -> &HashMap<H256, Bytes> {
        &self.preimages
    }

    pub fn add_refund(&mut self, amount: u64) {
        self.journal.push(JournalEntry::RefundChange { prev: self.refund });
        self.refund += amount;
    }

    pub fn get_refund(&self) -> u64 {
        self.refund
    }

    // ===================== Snapshots =====================

    pub fn snapshot(&self) -> Snapshot {
        self.journal.len()
    }

    /// Restores the exact state at the snapshot by undoing journal entries
    /// in reverse.
    pub fn revert_to(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::AccountCreated { address } => {
                    self.accounts.remove(&address);
                    self.existing.remove(&address);
                }
                JournalEntry::AccountTouched { address } => {
                    self.touched.remove(&address);
                }
                JournalEntry::BalanceChange { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.info.balance = prev;
                    }
                }
                JournalEntry::NonceChange { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.info.nonce = prev;
                    }
                }
                JournalEntry::StorageChange { address, key, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        match prev {
                            Some(value) => account.storage.insert(key, value),
                            None => account.storage.remove(&key),
                        };
                    }
                }
                JournalEntry::CodeChange {
                    address,
                    prev_code,
                    prev_code_hash,
                } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.code = prev_code;
                        account.info.code_hash = prev_code_hash;
                    }
                }
                JournalEntry::LogAppend { tx_hash } => {
                    if let Some(logs) = self.logs.get_mut(&tx_hash) {
                        logs.pop();
                    }
                }
                JournalEntry::SuicideFlip {
                    address,
                    prev_balance,
                } => {
                    self.suicided.remove(&address);
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.info.balance = prev_balance;
                    }
                }
                JournalEntry::RefundChange { prev } => {
                    self.refund = prev;
                }
                JournalEntry::PreimageAdded { hash } => {
                    self.preimages.remove(&hash);
                }
            }
        }
    }

    // ===================== Transaction and batch boundaries =====================

    /// Settles a transaction's destruction set: suicided accounts leave the
    /// state, and with `delete_empty` so do touched-but-empty accounts
    /// (EIP-158). Later transactions observe the deletions; the journal is
    /// spent and cleared.
    pub fn finalize_tx(&mut self, delete_empty: bool) {
        for address in std::mem::take(&mut self.suicided) {
            self.accounts.insert(address, Account::default());
            self.existing.remove(&address);
            self.destructed.insert(address);
        }
        if delete_empty {
            for address in std::mem::take(&mut self.touched) {
                if self.existing.contains(&address)
                    && self
                        .accounts
                        .get(&address)
                        .is_some_and(|account| account.is_empty())
                {
                    self.accounts.insert(address, Account::default());
                    self.existing.remove(&address);
                    self.destructed.insert(address);
                }
            }
        } else {
            self.touched.clear();
        }
        self.journal.clear();
        self.refund = 0;
    }

    /// Flushes every pending write to the store and returns the new state
    /// root.
    pub fn commit(&mut self, delete_empty: bool) -> Result<H256, DatabaseError> {
        self.finalize_tx(delete_empty);
        let mut updates: Vec<AccountUpdate> = Vec::with_capacity(self.accounts.len());
        let mut addresses: Vec<Address> = self
            .accounts
            .keys()
            .chain(self.destructed.iter())
            .copied()
            .collect();
        addresses.sort();
        addresses.dedup();
        for address in addresses {
            let removed = !self.existing.contains(&address);
            let account = self.accounts.get(&address).cloned().unwrap_or_default();
            updates.push(AccountUpdate {
                address,
                removed,
                account,
            });
        }
        self.store.commit(updates)
    }

    pub fn dump(&self) -> Result<StateDump, DatabaseError> {
        self.store.dump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::InMemoryStore;
    use std::collections::BTreeMap;

    fn db_with(accounts: Vec<(Address, Account)>) -> StateDb {
        let store = InMemoryStore::new(accounts.into_iter().collect());
        StateDb::new(Box::new(store))
    }

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn funded(balance: u64) -> Account {
        Account::new(U256::from(balance), 0, Bytes::new(), BTreeMap::new())
    }

    #[test]
    fn revert_restores_balances_nonces_and_storage_exactly() {
        let mut db = db_with(vec![(addr(1), funded(100))]);
        let key = H256::repeat_byte(7);
        db.set_state(addr(1), key, U256::from(3)).unwrap();
        db.finalize_tx(false);

        let snapshot = db.snapshot();
        db.add_balance(addr(1), U256::from(50)).unwrap();
        db.increment_nonce(addr(1)).unwrap();
        db.set_state(addr(1), key, U256::from(9)).unwrap();
        db.set_state(addr(1), H256::zero(), U256::from(1)).unwrap();
        db.revert_to(snapshot);

        assert_eq!(db.get_balance(addr(1)).unwrap(), U256::from(100));
        assert_eq!(db.get_nonce(addr(1)).unwrap(), 0);
        assert_eq!(db.get_state(addr(1), key).unwrap(), U256::from(3));
        assert_eq!(db.get_state(addr(1), H256::zero()).unwrap(), U256::zero());
    }

    #[test]
    fn revert_distinguishes_absent_from_zero_slots() {
        let mut db = db_with(vec![(addr(1), funded(0))]);
        let key = H256::repeat_byte(1);
        let snapshot = db.snapshot();
        db.set_state(addr(1), key, U256::zero()).unwrap();
        assert!(db.accounts[&addr(1)].storage.contains_key(&key));
        db.revert_to(snapshot);
        assert!(!db.accounts[&addr(1)].storage.contains_key(&key));
    }

    #[test]
    fn revert_removes_created_accounts() {
        let mut db = db_with(vec![]);
        let snapshot = db.snapshot();
        db.add_balance(addr(9), U256::from(5)).unwrap();
        assert!(db.exist(addr(9)).unwrap());
        db.revert_to(snapshot);
        assert!(!db.exist(addr(9)).unwrap());
    }

    #[test]
    fn revert_undoes_logs_suicides_and_refunds() {
        let mut db = db_with(vec![(addr(1), funded(10))]);
        db.prepare(H256::repeat_byte(0xaa), 0);
        let snapshot = db.snapshot();

        db.add_log(Log {
            address: addr(1),
            topics: vec![],
            data: Bytes::new(),
            block_number: 0,
        });
        db.suicide(addr(1)).unwrap();
        db.add_refund(15000);

        assert_eq!(db.logs(H256::repeat_byte(0xaa)).len(), 1);
        assert!(db.has_suicided(addr(1)));
        assert_eq!(db.get_refund(), 15000);

        db.revert_to(snapshot);

        assert!(db.logs(H256::repeat_byte(0xaa)).is_empty());
        assert!(!db.has_suicided(addr(1)));
        assert_eq!(db.get_refund(), 0);
        assert_eq!(db.get_balance(addr(1)).unwrap(), U256::from(10));
    }

    #[test]
    fn nested_snapshots_revert_in_order() {
        let mut db = db_with(vec![(addr(1), funded(0))]);
        let outer = db.snapshot();
        db.add_balance(addr(1), U256::from(1)).unwrap();
        let inner = db.snapshot();
        db.add_balance(addr(1), U256::from(2)).unwrap();

        db.revert_to(inner);
        assert_eq!(db.get_balance(addr(1)).unwrap(), U256::from(1));
        db.revert_to(outer);
        assert_eq!(db.get_balance(addr(1)).unwrap(), U256::zero());
    }

    #[test]
    fn finalize_removes_suicided_accounts_for_later_txs() {
        let mut db = db_with(vec![(addr(1), funded(10))]);
        db.suicide(addr(1)).unwrap();
        db.finalize_tx(true);
        assert!(!db.exist(addr(1)).unwrap());
        assert_eq!(db.get_balance(addr(1)).unwrap(), U256::zero());
    }

    #[test]
    fn finalize_deletes_touched_empty_accounts() {
        let mut db = db_with(vec![]);
        // A zero-value transfer touches (and creates) an empty account.
        db.add_balance(addr(2), U256::zero()).unwrap();
        db.finalize_tx(true);
        assert!(!db.exist(addr(2)).unwrap());
    }

    #[test]
    fn transfer_fails_cleanly_on_insufficient_balance() {
        let mut db = db_with(vec![(addr(1), funded(5))]);
        let result = db.transfer(addr(1), addr(2), U256::from(6));
        assert_eq!(
            result.unwrap_err(),
            VMError::Halt(ExceptionalHalt::InsufficientBalance)
        );
        assert_eq!(db.get_balance(addr(1)).unwrap(), U256::from(5));
        assert_eq!(db.get_balance(addr(2)).unwrap(), U256::zero());
    }
}
