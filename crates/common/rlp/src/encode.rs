use bytes::{BufMut, Bytes};
use ethereum_types::{Address, Bloom, H256, U256};

use crate::constants::RLP_NULL;

/// Function for encoding a value to RLP.
/// For encoding the value into a buffer directly, use [`RLPEncode::encode`].
pub fn encode<T: RLPEncode>(value: T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Writes the prefix for a payload of the given length. Used both for byte
/// strings over 55 bytes and, with `list` set, for lists.
pub fn encode_length(payload_len: usize, list: bool, buf: &mut dyn BufMut) {
    let short_base: u8 = if list { 0xc0 } else { RLP_NULL };
    if payload_len < 56 {
        buf.put_u8(short_base + payload_len as u8);
    } else {
        let be_len = payload_len.to_be_bytes();
        let skip = be_len.iter().take_while(|b| **b == 0).count();
        buf.put_u8(short_base + 55 + (be_len.len() - skip) as u8);
        buf.put_slice(&be_len[skip..]);
    }
}

fn encode_bytes(bytes: &[u8], buf: &mut dyn BufMut) {
    // A single byte in [0x00, 0x7f] is its own encoding.
    if bytes.len() == 1 && bytes[0] <= 0x7f {
        buf.put_u8(bytes[0]);
        return;
    }
    encode_length(bytes.len(), false, buf);
    buf.put_slice(bytes);
}

fn encode_integer<const N: usize>(value_be: [u8; N], buf: &mut dyn BufMut) {
    // Integers are encoded big-endian without leading zeros; zero is the
    // empty string.
    let skip = value_be.iter().take_while(|b| **b == 0).count();
    encode_bytes(&value_be[skip..], buf);
}

impl RLPEncode for bool {
    fn encode(&self, buf: &mut dyn BufMut) {
        if *self {
            buf.put_u8(0x01);
        } else {
            buf.put_u8(RLP_NULL);
        }
    }
}

impl RLPEncode for u8 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for u16 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for u32 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for usize {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_be_bytes(), buf);
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_integer(self.to_big_endian(), buf);
    }
}

// Byte strings travel as `Bytes` or slices; a `Vec<u8>` would hit the
// generic list impl below and encode element-wise.
impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

impl RLPEncode for str {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl RLPEncode for String {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

// Hashes and addresses are fixed-width byte strings, not integers: leading
// zeros are preserved.

impl RLPEncode for Address {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl RLPEncode for Bloom {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        for item in self {
            item.encode(&mut payload);
        }
        encode_length(payload.len(), true, buf);
        buf.put_slice(&payload);
    }
}

impl<T: RLPEncode + ?Sized> RLPEncode for &T {
    fn encode(&self, buf: &mut dyn BufMut) {
        (*self).encode(buf)
    }
}
