use std::collections::BTreeMap;

use bytes::Bytes;
use ethereum_types::{H256, U256};
use uevm_rlp::structs::Encoder;

use crate::constants::EMPTY_CODE_HASH;
use crate::utils::keccak;

/// The intrinsic fields of an account, without its code or storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub code_hash: H256,
    pub balance: U256,
    pub nonce: u64,
}

/// An account as the engine sees it: intrinsic fields plus the code bytes
/// and the slots touched so far. Code is carried next to its hash so the
/// interpreter never goes back to the store for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub info: AccountInfo,
    pub code: Bytes,
    pub storage: BTreeMap<H256, U256>,
}

impl Default for Account {
    fn default() -> Self {
        Account {
            info: AccountInfo {
                code_hash: EMPTY_CODE_HASH,
                balance: U256::zero(),
                nonce: 0,
            },
            code: Bytes::new(),
            storage: BTreeMap::new(),
        }
    }
}

impl Account {
    pub fn new(balance: U256, nonce: u64, code: Bytes, storage: BTreeMap<H256, U256>) -> Self {
        Account {
            info: AccountInfo {
                code_hash: code_hash(&code),
                balance,
                nonce,
            },
            code,
            storage,
        }
    }

    pub fn has_code(&self) -> bool {
        self.info.code_hash != EMPTY_CODE_HASH
    }

    pub fn has_nonce(&self) -> bool {
        self.info.nonce != 0
    }

    /// An account is empty per EIP-161: no code, zero nonce, zero balance.
    pub fn is_empty(&self) -> bool {
        !self.has_code() && !self.has_nonce() && self.info.balance.is_zero()
    }

    pub fn set_code(&mut self, code: Bytes) {
        self.info.code_hash = code_hash(&code);
        self.code = code;
    }

    /// The RLP account leaf (nonce, balance, storage_root, code_hash) hashed
    /// into the state root.
    pub fn encode_with_root(&self, storage_root: H256) -> Vec<u8> {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&self.info.nonce)
            .encode_field(&self.info.balance)
            .encode_field(&storage_root)
            .encode_field(&self.info.code_hash)
            .finish();
        buf
    }
}

pub fn code_hash(code: &Bytes) -> H256 {
    keccak(code)
}
