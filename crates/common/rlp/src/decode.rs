use std::mem::size_of;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::constants::RLP_NULL;
use crate::error::RLPDecodeError;

pub trait RLPDecode: Sized {
    /// Decodes a value, returning it along with the bytes after its encoding.
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    /// Decodes a value, requiring the input to contain exactly one item.
    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (value, rest) = Self::decode_unfinished(rlp)?;
        if !rest.is_empty() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(value)
    }
}

/// Splits the first RLP item off the buffer.
/// Returns `(is_list, payload, remaining)`.
pub fn decode_rlp_item(rlp: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let first = *rlp.first().ok_or(RLPDecodeError::InvalidLength)?;
    match first {
        // Single byte, its own encoding.
        0x00..=0x7f => Ok((false, &rlp[..1], &rlp[1..])),
        // Short string.
        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            split_payload(&rlp[1..], len).map(|(payload, rest)| (false, payload, rest))
        }
        // Long string.
        0xb8..=0xbf => {
            let (len, rest) = decode_long_length(&rlp[1..], (first - 0xb7) as usize)?;
            split_payload(rest, len).map(|(payload, rest)| (false, payload, rest))
        }
        // Short list.
        0xc0..=0xf7 => {
            let len = (first - 0xc0) as usize;
            split_payload(&rlp[1..], len).map(|(payload, rest)| (true, payload, rest))
        }
        // Long list.
        0xf8..=0xff => {
            let (len, rest) = decode_long_length(&rlp[1..], (first - 0xf7) as usize)?;
            split_payload(rest, len).map(|(payload, rest)| (true, payload, rest))
        }
    }
}

/// Returns the next item's full encoding (prefix included) and the remainder.
pub fn get_item_with_prefix(rlp: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (_, payload, rest) = decode_rlp_item(rlp)?;
    let consumed = rlp.len() - rest.len();
    debug_assert!(payload.len() <= consumed);
    Ok((&rlp[..consumed], rest))
}

fn split_payload(buf: &[u8], len: usize) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    if buf.len() < len {
        return Err(RLPDecodeError::InvalidLength);
    }
    Ok(buf.split_at(len))
}

fn decode_long_length(buf: &[u8], len_of_len: usize) -> Result<(usize, &[u8]), RLPDecodeError> {
    if buf.len() < len_of_len || len_of_len > size_of::<usize>() {
        return Err(RLPDecodeError::InvalidLength);
    }
    let (len_bytes, rest) = buf.split_at(len_of_len);
    if len_bytes.first() == Some(&0) {
        // Lengths must not carry leading zeros.
        return Err(RLPDecodeError::MalformedData);
    }
    let mut len: usize = 0;
    for byte in len_bytes {
        len = (len << 8) | *byte as usize;
    }
    if len < 56 {
        // A long form length below 56 is non-canonical.
        return Err(RLPDecodeError::MalformedData);
    }
    Ok((len, rest))
}

fn decode_integer_payload(rlp: &[u8], max_len: usize) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_rlp_item(rlp)?;
    if is_list {
        return Err(RLPDecodeError::UnexpectedList);
    }
    if payload.len() > max_len {
        return Err(RLPDecodeError::InvalidLength);
    }
    if payload.first() == Some(&0) {
        // Canonical integers have no leading zeros.
        return Err(RLPDecodeError::MalformedData);
    }
    Ok((payload, rest))
}

impl RLPDecode for bool {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        match rlp.first() {
            Some(&RLP_NULL) => Ok((false, &rlp[1..])),
            Some(&0x01) => Ok((true, &rlp[1..])),
            _ => Err(RLPDecodeError::MalformedData),
        }
    }
}

impl RLPDecode for u8 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_integer_payload(rlp, 1)?;
        Ok((payload.first().copied().unwrap_or(0), rest))
    }
}

impl RLPDecode for u64 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_integer_payload(rlp, 8)?;
        let mut value: u64 = 0;
        for byte in payload {
            value = (value << 8) | *byte as u64;
        }
        Ok((value, rest))
    }
}

impl RLPDecode for U256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_integer_payload(rlp, 32)?;
        Ok((U256::from_big_endian(payload), rest))
    }
}

impl RLPDecode for Address {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if is_list {
            return Err(RLPDecodeError::UnexpectedList);
        }
        if payload.len() != 20 {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok((Address::from_slice(payload), rest))
    }
}

impl RLPDecode for H256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if is_list {
            return Err(RLPDecodeError::UnexpectedList);
        }
        if payload.len() != 32 {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok((H256::from_slice(payload), rest))
    }
}

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if is_list {
            return Err(RLPDecodeError::UnexpectedList);
        }
        Ok((Bytes::copy_from_slice(payload), rest))
    }
}

// Byte strings decode as `Bytes`; `Vec<T>` is reserved for lists.
impl<T: RLPDecode> RLPDecode for Vec<T> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, mut payload, rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        let mut items = Vec::new();
        while !payload.is_empty() {
            let (item, next) = T::decode_unfinished(payload)?;
            items.push(item);
            payload = next;
        }
        Ok((items, rest))
    }
}
