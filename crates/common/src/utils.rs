use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use sha3::{Digest, Keccak256};
use uevm_rlp::structs::Encoder;

/// Keccak-256 of arbitrary data.
pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(&Keccak256::digest(data.as_ref()))
}

pub fn u256_to_h256(value: U256) -> H256 {
    H256(value.to_big_endian())
}

pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Address of a contract created with CREATE or by a creation transaction:
/// the low 160 bits of Keccak-256(RLP([sender, nonce])).
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut encoded = Vec::new();
    Encoder::new(&mut encoded)
        .encode_field(&sender)
        .encode_field(&nonce)
        .finish();
    Address::from_slice(&keccak(&encoded).as_bytes()[12..])
}

/// Address of a contract created with CREATE2:
/// Keccak-256(0xff ++ sender ++ salt ++ Keccak-256(init_code))[12..].
pub fn create2_address(sender: Address, salt: H256, init_code: &Bytes) -> Address {
    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xff);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(salt.as_bytes());
    preimage.extend_from_slice(keccak(init_code).as_bytes());
    Address::from_slice(&keccak(&preimage).as_bytes()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EMPTY_CODE_HASH;
    use std::str::FromStr;

    #[test]
    fn keccak_of_empty_string_is_the_empty_code_hash() {
        assert_eq!(keccak([]), EMPTY_CODE_HASH);
    }

    #[test]
    fn create_address_known_vector() {
        // Vector from the yellow paper's running example, sender 0x6ac7ea33...
        let sender = Address::from_str("0x970e8128ab834e8eac17ab8e3812f010678cf791").unwrap();
        let address = create_address(sender, 0);
        assert_eq!(
            address,
            Address::from_str("0x333c3310824b7c685133f2bedb2ca4b8b4df633d").unwrap()
        );
    }

    #[test]
    fn h256_u256_roundtrip() {
        let value = U256::from(0xdeadbeefu64);
        assert_eq!(h256_to_u256(u256_to_h256(value)), value);
    }
}
