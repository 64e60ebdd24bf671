//! The JSON fixture format: a block environment, a pre-state allocation and
//! a transaction list, either structured or as an RLP-encoded blob.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::Deserialize;
use thiserror::Error;
use uevm_common::serde_utils;
use uevm_common::types::{Account, Transaction, TxKind};
use uevm_rlp::decode::RLPDecode;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("invalid `to` address: {0}")]
    InvalidToAddress(String),
    #[error("invalid transaction rlp: {0}")]
    InvalidTransactionRlp(String),
}

#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub env: FixtureEnv,
    #[serde(default)]
    pub pre: HashMap<Address, FixtureAccount>,
    #[serde(default)]
    pub transactions: TxList,
}

/// Numbers accept both 0x-hex and decimal; field names accept both the
/// plain and the `current*` spellings.
#[derive(Debug, Deserialize)]
pub struct FixtureEnv {
    #[serde(alias = "currentCoinbase")]
    pub coinbase: Address,
    #[serde(
        alias = "currentDifficulty",
        deserialize_with = "serde_utils::u256::deser_hex_or_dec_str"
    )]
    pub difficulty: U256,
    #[serde(
        rename = "gasLimit",
        alias = "currentGasLimit",
        deserialize_with = "serde_utils::u64::deser_hex_or_dec_str"
    )]
    pub gas_limit: u64,
    #[serde(
        alias = "currentNumber",
        deserialize_with = "serde_utils::u64::deser_hex_or_dec_str"
    )]
    pub number: u64,
    #[serde(
        alias = "currentTimestamp",
        deserialize_with = "serde_utils::u64::deser_hex_or_dec_str"
    )]
    pub timestamp: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct FixtureAccount {
    #[serde(default, deserialize_with = "serde_utils::u64::deser_hex_or_dec_str")]
    pub nonce: u64,
    #[serde(default, deserialize_with = "serde_utils::u256::deser_hex_or_dec_str")]
    pub balance: U256,
    #[serde(default, deserialize_with = "serde_utils::bytes::deserialize")]
    pub code: Bytes,
    #[serde(default, deserialize_with = "serde_utils::storage::deserialize")]
    pub storage: BTreeMap<H256, U256>,
}

impl From<FixtureAccount> for Account {
    fn from(account: FixtureAccount) -> Self {
        Account::new(account.balance, account.nonce, account.code, account.storage)
    }
}

/// The transaction list: either structured objects or one hex string
/// holding the RLP encoding of the whole list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TxList {
    Structured(Vec<FixtureTx>),
    Rlp(String),
}

impl Default for TxList {
    fn default() -> Self {
        TxList::Structured(Vec::new())
    }
}

impl TxList {
    pub fn into_transactions(self) -> Result<Vec<Transaction>, FixtureError> {
        match self {
            TxList::Structured(txs) => txs.into_iter().map(Transaction::try_from).collect(),
            TxList::Rlp(blob) => {
                let raw = hex::decode(blob.strip_prefix("0x").unwrap_or(&blob))
                    .map_err(|e| FixtureError::InvalidTransactionRlp(e.to_string()))?;
                Vec::<Transaction>::decode(&raw)
                    .map_err(|e| FixtureError::InvalidTransactionRlp(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FixtureTx {
    #[serde(default, deserialize_with = "serde_utils::u64::deser_hex_or_dec_str")]
    pub nonce: u64,
    #[serde(
        rename = "gasPrice",
        default,
        deserialize_with = "serde_utils::u256::deser_hex_or_dec_str"
    )]
    pub gas_price: U256,
    #[serde(
        alias = "gasLimit",
        default,
        deserialize_with = "serde_utils::u64::deser_hex_or_dec_str"
    )]
    pub gas: u64,
    /// Empty or absent means contract creation.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "serde_utils::u256::deser_hex_or_dec_str")]
    pub value: U256,
    #[serde(
        default,
        alias = "input",
        deserialize_with = "serde_utils::bytes::deserialize"
    )]
    pub data: Bytes,
    #[serde(default, deserialize_with = "serde_utils::u256::deser_hex_or_dec_str")]
    pub v: U256,
    #[serde(default, deserialize_with = "serde_utils::u256::deser_hex_or_dec_str")]
    pub r: U256,
    #[serde(default, deserialize_with = "serde_utils::u256::deser_hex_or_dec_str")]
    pub s: U256,
}

impl TryFrom<FixtureTx> for Transaction {
    type Error = FixtureError;

    fn try_from(tx: FixtureTx) -> Result<Self, Self::Error> {
        let to = match tx.to.as_deref() {
            None | Some("") => TxKind::Create,
            Some(address) => TxKind::Call(
                Address::from_str(address)
                    .map_err(|_| FixtureError::InvalidToAddress(address.to_string()))?,
            ),
        };
        Ok(Transaction {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas: tx.gas,
            to,
            value: tx.value,
            data: tx.data,
            v: tx.v,
            r: tx.r,
            s: tx.s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uevm_rlp::encode::RLPEncode;

    #[test]
    fn env_accepts_hex_and_decimal_and_both_spellings() {
        let source = r#"{
            "env": {
                "currentCoinbase": "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba",
                "currentDifficulty": "0x20000",
                "currentGasLimit": "10000000",
                "currentNumber": 1,
                "currentTimestamp": "0x3e8"
            }
        }"#;
        let fixture: Fixture = serde_json::from_str(source).unwrap();
        assert_eq!(fixture.env.difficulty, U256::from(0x20000));
        assert_eq!(fixture.env.gas_limit, 10_000_000);
        assert_eq!(fixture.env.number, 1);
        assert_eq!(fixture.env.timestamp, 1000);
        assert!(fixture.pre.is_empty());
    }

    #[test]
    fn structured_transactions_parse_including_creation() {
        let source = r#"{
            "env": {
                "coinbase": "0x0000000000000000000000000000000000000000",
                "difficulty": "0x0",
                "gasLimit": "0x989680",
                "number": "0x1",
                "timestamp": "0x1"
            },
            "transactions": [
                {
                    "nonce": "0x0",
                    "gasPrice": "0x1",
                    "gasLimit": "0x5208",
                    "to": "0x00000000000000000000000000000000000000aa",
                    "value": "0x10",
                    "data": "0x",
                    "v": "0xe9", "r": "0x1", "s": "0x1"
                },
                { "nonce": "0x1", "gasPrice": "0x1", "gas": "0x15f90", "to": "", "data": "0x6000" }
            ]
        }"#;
        let fixture: Fixture = serde_json::from_str(source).unwrap();
        let txs = fixture.transactions.into_transactions().unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(
            txs[0].to,
            TxKind::Call(Address::from_low_u64_be(0xaa))
        );
        assert!(txs[1].is_create());
        assert_eq!(txs[1].data.as_ref(), &[0x60, 0x00]);
    }

    #[test]
    fn rlp_transaction_list_roundtrips() {
        let tx = Transaction {
            nonce: 1,
            gas_price: U256::from(2),
            gas: 21000,
            to: TxKind::Call(Address::from_low_u64_be(0xbb)),
            value: U256::from(3),
            data: Bytes::new(),
            v: U256::from(233),
            r: U256::from(7),
            s: U256::from(9),
        };
        let blob = format!("0x{}", hex::encode(vec![tx.clone()].encode_to_vec()));
        let parsed = TxList::Rlp(blob).into_transactions().unwrap();
        assert_eq!(parsed, vec![tx]);
    }

    #[test]
    fn account_storage_accepts_short_hex_keys() {
        let source = r#"{
            "nonce": "0x1",
            "balance": "1000",
            "code": "0x60016000",
            "storage": { "0x00": "0x2a", "0x01": "3" }
        }"#;
        let account: FixtureAccount = serde_json::from_str(source).unwrap();
        let account: Account = account.into();
        assert_eq!(account.info.nonce, 1);
        assert_eq!(account.storage[&H256::zero()], U256::from(0x2a));
        assert_eq!(
            account.storage[&H256::from_low_u64_be(1)],
            U256::from(3)
        );
    }
}
