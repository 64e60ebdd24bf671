use bytes::{BufMut, Bytes};
use ethereum_types::{Address, H256, U256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SecretKey, SECP256K1};
use thiserror::Error;
use uevm_rlp::decode::RLPDecode;
use uevm_rlp::encode::RLPEncode;
use uevm_rlp::error::RLPDecodeError;
use uevm_rlp::structs::{Decoder, Encoder};

use crate::constants::SECP256K1_ORDER;
use crate::utils::keccak;

/// The destination of a transaction or message call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            TxKind::Call(address) => address.encode(buf),
            TxKind::Create => Bytes::new().encode(buf),
        }
    }
}

impl RLPDecode for TxKind {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = Bytes::decode_unfinished(rlp)?;
        match payload.len() {
            0 => Ok((TxKind::Create, rest)),
            20 => Ok((TxKind::Call(Address::from_slice(&payload)), rest)),
            _ => Err(RLPDecodeError::InvalidLength),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature values")]
    InvalidValues,
    #[error("signature s value is in the upper half of the curve order")]
    MalleableS,
    #[error("wrong chain id: expected {expected}, got {actual}")]
    WrongChainId { expected: u64, actual: u64 },
    #[error("signature recovery failed")]
    RecoveryFailed,
}

/// A legacy transaction, optionally replay-protected per EIP-155.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

impl RLPEncode for Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.v)
            .encode_field(&self.r)
            .encode_field(&self.s)
            .finish();
    }
}

impl RLPDecode for Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas, decoder) = decoder.decode_field("gas")?;
        let (to, decoder) = decoder.decode_field("to")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (v, decoder) = decoder.decode_field("v")?;
        let (r, decoder) = decoder.decode_field("r")?;
        let (s, decoder) = decoder.decode_field("s")?;
        let tx = Transaction {
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
            v,
            r,
            s,
        };
        Ok((tx, decoder.finish()?))
    }
}

impl Transaction {
    pub fn is_create(&self) -> bool {
        matches!(self.to, TxKind::Create)
    }

    /// Keccak-256 of the signed RLP encoding. The transaction's identity.
    pub fn hash(&self) -> H256 {
        keccak(self.encode_to_vec())
    }

    /// True if the signature carries a chain id (EIP-155), false for the
    /// homestead 27/28 scheme.
    pub fn is_protected(&self) -> bool {
        self.v != U256::from(27) && self.v != U256::from(28)
    }

    /// The hash that was signed. Protected transactions commit to the chain
    /// id through the (chain_id, 0, 0) trailer.
    pub fn signing_hash(&self, chain_id: u64) -> H256 {
        let mut buf = Vec::new();
        let encoder = Encoder::new(&mut buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.data);
        if self.is_protected() {
            encoder
                .encode_field(&chain_id)
                .encode_field(&0u8)
                .encode_field(&0u8)
                .finish();
        } else {
            encoder.finish();
        }
        keccak(&buf)
    }

    /// Recovers the sender from the signature, enforcing the EIP-155 chain
    /// id when the transaction is protected and the EIP-2 low-s rule.
    pub fn recover_sender(&self, chain_id: u64) -> Result<Address, SignatureError> {
        let recovery_id = self.recovery_id(chain_id)?;

        let order = U256::from_big_endian(&SECP256K1_ORDER);
        if self.r.is_zero() || self.s.is_zero() || self.r >= order || self.s >= order {
            return Err(SignatureError::InvalidValues);
        }
        if self.s > order / 2 {
            return Err(SignatureError::MalleableS);
        }

        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r.to_big_endian());
        compact[32..].copy_from_slice(&self.s.to_big_endian());
        let signature = RecoverableSignature::from_compact(
            &compact,
            RecoveryId::from_i32(recovery_id as i32).map_err(|_| SignatureError::InvalidValues)?,
        )
        .map_err(|_| SignatureError::InvalidValues)?;

        let message = Message::from_digest(self.signing_hash(chain_id).0);
        let public_key = SECP256K1
            .recover_ecdsa(&message, &signature)
            .map_err(|_| SignatureError::RecoveryFailed)?;

        let hash = keccak(&public_key.serialize_uncompressed()[1..]);
        Ok(Address::from_slice(&hash.as_bytes()[12..]))
    }

    fn recovery_id(&self, chain_id: u64) -> Result<u64, SignatureError> {
        if self.v.bits() > 64 {
            return Err(SignatureError::InvalidValues);
        }
        let v = self.v.low_u64();
        if v == 27 || v == 28 {
            return Ok(v - 27);
        }
        if v >= 35 {
            let actual = (v - 35) / 2;
            if actual != chain_id {
                return Err(SignatureError::WrongChainId {
                    expected: chain_id,
                    actual,
                });
            }
            return Ok(v - 35 - 2 * chain_id);
        }
        Err(SignatureError::InvalidValues)
    }

    /// Signs the transaction with the EIP-155 scheme for the given chain.
    pub fn sign(&mut self, secret_key: &SecretKey, chain_id: u64) {
        // Mark as protected before computing the signing hash.
        self.v = U256::from(35 + 2 * chain_id);
        let message = Message::from_digest(self.signing_hash(chain_id).0);
        let signature = SECP256K1.sign_ecdsa_recoverable(&message, secret_key);
        let (recovery_id, compact) = signature.serialize_compact();
        self.r = U256::from_big_endian(&compact[..32]);
        self.s = U256::from_big_endian(&compact[32..]);
        self.v = U256::from(35 + 2 * chain_id + recovery_id.to_i32() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::PublicKey;

    const CHAIN_ID: u64 = 99;

    fn signer() -> (SecretKey, Address) {
        let secret_key = SecretKey::from_slice(&[0x45u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
        let hash = keccak(&public_key.serialize_uncompressed()[1..]);
        (secret_key, Address::from_slice(&hash.as_bytes()[12..]))
    }

    fn sample_tx() -> Transaction {
        Transaction {
            nonce: 3,
            gas_price: U256::from(1),
            gas: 100_000,
            to: TxKind::Call(Address::from_low_u64_be(0xbeef)),
            value: U256::from(10),
            data: Bytes::from_static(&[0x00, 0x01, 0x02]),
            ..Default::default()
        }
    }

    #[test]
    fn sign_and_recover_roundtrip() {
        let (secret_key, address) = signer();
        let mut tx = sample_tx();
        tx.sign(&secret_key, CHAIN_ID);
        assert!(tx.is_protected());
        assert_eq!(tx.recover_sender(CHAIN_ID).unwrap(), address);
    }

    #[test]
    fn recovery_rejects_wrong_chain_id() {
        let (secret_key, _) = signer();
        let mut tx = sample_tx();
        tx.sign(&secret_key, CHAIN_ID);
        assert!(matches!(
            tx.recover_sender(CHAIN_ID + 1),
            Err(SignatureError::WrongChainId { .. })
        ));
    }

    #[test]
    fn recovery_rejects_zero_signature() {
        let mut tx = sample_tx();
        tx.v = U256::from(35 + 2 * CHAIN_ID);
        assert!(tx.recover_sender(CHAIN_ID).is_err());
    }

    #[test]
    fn rlp_roundtrip_preserves_the_hash() {
        let (secret_key, _) = signer();
        let mut tx = sample_tx();
        tx.sign(&secret_key, CHAIN_ID);
        let encoded = tx.encode_to_vec();
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn create_encodes_an_empty_destination() {
        let tx = Transaction {
            to: TxKind::Create,
            ..Default::default()
        };
        let encoded = tx.encode_to_vec();
        let decoded = Transaction::decode(&encoded).unwrap();
        assert!(decoded.is_create());
    }
}
