use bytes::BufMut;

use crate::decode::{decode_rlp_item, RLPDecode};
use crate::encode::{encode_length, RLPEncode};
use crate::error::RLPDecodeError;

/// # Struct encoding helper
///
/// Builds the RLP list encoding of a struct by appending each field in
/// order, then writing the list prefix on [`Encoder::finish`].
#[must_use = "`Encoder` must be consumed with `finish` to write the encoding"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    payload: Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            payload: Vec::new(),
        }
    }

    pub fn encode_field<T: RLPEncode>(mut self, value: &T) -> Self {
        value.encode(&mut self.payload);
        self
    }

    pub fn finish(self) {
        encode_length(self.payload.len(), true, self.buf);
        self.buf.put_slice(&self.payload);
    }
}

/// # Struct decoding helper
///
/// Used to decode a struct from RLP format. The struct is expected as a
/// list, with its values being the fields in the order they are passed to
/// [`Decoder::decode_field`].
#[derive(Debug)]
#[must_use = "`Decoder` must be consumed with `finish` to perform decoding checks"]
pub struct Decoder<'a> {
    payload: &'a [u8],
    remaining: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, RLPDecodeError> {
        match decode_rlp_item(buf)? {
            (true, payload, remaining) => Ok(Self { payload, remaining }),
            (false, _, _) => Err(RLPDecodeError::UnexpectedString),
        }
    }

    pub fn decode_field<T: RLPDecode>(self, name: &str) -> Result<(T, Self), RLPDecodeError> {
        let (field, rest) = <T as RLPDecode>::decode_unfinished(self.payload)
            .map_err(|err| err.with_context(name))?;
        Ok((
            field,
            Self {
                payload: rest,
                ..self
            },
        ))
    }

    /// Finishes decoding the struct and returns the remaining bytes after
    /// the item. If the item's payload is not fully consumed, returns an
    /// error.
    pub const fn finish(self) -> Result<&'a [u8], RLPDecodeError> {
        if self.payload.is_empty() {
            Ok(self.remaining)
        } else {
            Err(RLPDecodeError::MalformedData)
        }
    }

    pub const fn is_done(&self) -> bool {
        self.payload.is_empty()
    }
}
