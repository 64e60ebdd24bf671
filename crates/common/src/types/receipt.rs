use bytes::Bytes;
use ethereum_types::{Address, Bloom, BloomInput, H256};
use serde::Serialize;

use crate::serde_utils;

/// Data record produced by a LOG opcode during the execution of a
/// transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "serde_utils::bytes")]
    pub data: Bytes,
    #[serde(
        rename = "blockNumber",
        serialize_with = "serde_utils::u64::serialize_hex_str"
    )]
    pub block_number: u64,
}

/// Result of a single applied transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    #[serde(serialize_with = "serialize_status")]
    pub status: bool,
    #[serde(
        rename = "cumulativeGasUsed",
        serialize_with = "serde_utils::u64::serialize_hex_str"
    )]
    pub cumulative_gas_used: u64,
    #[serde(rename = "logsBloom")]
    pub bloom: Bloom,
    pub logs: Vec<Log>,
    #[serde(rename = "transactionHash")]
    pub tx_hash: H256,
    #[serde(rename = "contractAddress")]
    pub contract_address: Option<Address>,
    #[serde(
        rename = "gasUsed",
        serialize_with = "serde_utils::u64::serialize_hex_str"
    )]
    pub gas_used: u64,
}

impl Receipt {
    pub fn new(
        status: bool,
        cumulative_gas_used: u64,
        gas_used: u64,
        tx_hash: H256,
        logs: Vec<Log>,
    ) -> Self {
        Receipt {
            status,
            cumulative_gas_used,
            bloom: bloom_from_logs(&logs),
            logs,
            tx_hash,
            contract_address: None,
            gas_used,
        }
    }
}

fn serialize_status<S>(status: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(if *status { "0x1" } else { "0x0" })
}

/// 2048-bit filter over the log addresses and topics. `accrue` hashes the
/// raw bytes with Keccak-256 and sets three bits per input.
pub fn bloom_from_logs(logs: &[Log]) -> Bloom {
    let mut bloom = Bloom::default();
    for log in logs {
        bloom.accrue(BloomInput::Raw(log.address.as_bytes()));
        for topic in &log.topics {
            bloom.accrue(BloomInput::Raw(topic.as_bytes()));
        }
    }
    bloom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::keccak;

    fn sample_log() -> Log {
        Log {
            address: Address::from_low_u64_be(0xc0de),
            topics: vec![keccak(b"Transfer(address,address,uint256)")],
            data: Bytes::from_static(b"payload"),
            block_number: 1,
        }
    }

    #[test]
    fn bloom_covers_address_and_topics() {
        let log = sample_log();
        let bloom = bloom_from_logs(&[log.clone()]);
        assert!(bloom.contains_input(BloomInput::Raw(log.address.as_bytes())));
        assert!(bloom.contains_input(BloomInput::Raw(log.topics[0].as_bytes())));
        assert!(!bloom.contains_input(BloomInput::Raw(b"absent")));
    }

    #[test]
    fn empty_logs_give_a_zero_bloom() {
        assert_eq!(bloom_from_logs(&[]), Bloom::default());
    }

    #[test]
    fn receipt_serializes_to_camel_case_hex() {
        let receipt = Receipt::new(true, 21000, 21000, H256::zero(), vec![]);
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["status"], "0x1");
        assert_eq!(json["cumulativeGasUsed"], "0x5208");
        assert_eq!(json["gasUsed"], "0x5208");
        assert!(json["contractAddress"].is_null());
    }
}
