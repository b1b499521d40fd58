//! Minimal RLP encoding and decoding
//!
//! Only what the transaction signer and decoder need: byte strings, lists,
//! and unsigned integers in minimal big-endian form. Decoding enforces
//! canonical form; any structural violation is a
//! [`WalletError::MalformedEncoding`].

use primitive_types::U256;

use crate::error::{Result, WalletError};

/// A decoded RLP item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Bytes(Vec<u8>),
    List(Vec<Item>),
}

impl Item {
    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Item::Bytes(b) => Ok(b),
            Item::List(_) => Err(malformed("expected byte string, found list")),
        }
    }

    pub fn as_list(&self) -> Result<&[Item]> {
        match self {
            Item::List(items) => Ok(items),
            Item::Bytes(_) => Err(malformed("expected list, found byte string")),
        }
    }

    /// Interpret a byte string as a minimal big-endian unsigned integer.
    pub fn as_uint(&self) -> Result<U256> {
        let bytes = self.as_bytes()?;
        if bytes.len() > 32 {
            return Err(malformed("integer wider than 256 bits"));
        }
        if bytes.first() == Some(&0) {
            return Err(malformed("integer has leading zero byte"));
        }
        Ok(U256::from_big_endian(bytes))
    }

    pub fn as_u64(&self) -> Result<u64> {
        let v = self.as_uint()?;
        if v > U256::from(u64::MAX) {
            return Err(malformed("integer wider than 64 bits"));
        }
        Ok(v.as_u64())
    }
}

fn malformed(detail: &str) -> WalletError {
    WalletError::MalformedEncoding(detail.to_string())
}

/// Encode a byte string.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return vec![data[0]];
    }
    let mut out = length_prefix(data.len(), 0x80);
    out.extend_from_slice(data);
    out
}

/// Encode an unsigned integer as its minimal big-endian byte string.
pub fn encode_uint(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let first = buf.iter().position(|b| *b != 0).unwrap_or(32);
    encode_bytes(&buf[first..])
}

/// Encode a list from already-encoded items.
pub fn encode_list(encoded_items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = encoded_items.iter().map(Vec::len).sum();
    let mut out = length_prefix(payload_len, 0xc0);
    for item in encoded_items {
        out.extend_from_slice(item);
    }
    out
}

fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        vec![offset + len as u8]
    } else {
        let be = len.to_be_bytes();
        let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        let len_bytes = &be[first..];
        let mut out = vec![offset + 55 + len_bytes.len() as u8];
        out.extend_from_slice(len_bytes);
        out
    }
}

/// Decode a complete RLP document. Trailing bytes are a structural error.
pub fn decode(data: &[u8]) -> Result<Item> {
    let (item, consumed) = parse(data)?;
    if consumed != data.len() {
        return Err(malformed("trailing bytes after item"));
    }
    Ok(item)
}

fn parse(data: &[u8]) -> Result<(Item, usize)> {
    let first = *data.first().ok_or_else(|| malformed("empty input"))?;

    match first {
        0x00..=0x7f => Ok((Item::Bytes(vec![first]), 1)),
        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            let payload = slice(data, 1, len)?;
            if len == 1 && payload[0] < 0x80 {
                return Err(malformed("non-canonical single byte"));
            }
            Ok((Item::Bytes(payload.to_vec()), 1 + len))
        }
        0xb8..=0xbf => {
            let (len, header) = long_length(data, first - 0xb7)?;
            let payload = slice(data, header, len)?;
            Ok((Item::Bytes(payload.to_vec()), header + len))
        }
        0xc0..=0xf7 => {
            let len = (first - 0xc0) as usize;
            let payload = slice(data, 1, len)?;
            Ok((Item::List(parse_list(payload)?), 1 + len))
        }
        0xf8..=0xff => {
            let (len, header) = long_length(data, first - 0xf7)?;
            let payload = slice(data, header, len)?;
            Ok((Item::List(parse_list(payload)?), header + len))
        }
    }
}

fn long_length(data: &[u8], len_of_len: u8) -> Result<(usize, usize)> {
    let len_bytes = slice(data, 1, len_of_len as usize)?;
    if len_bytes.first() == Some(&0) {
        return Err(malformed("length has leading zero byte"));
    }
    let mut len = 0usize;
    for b in len_bytes {
        len = len
            .checked_mul(256)
            .and_then(|l| l.checked_add(*b as usize))
            .ok_or_else(|| malformed("length overflow"))?;
    }
    if len <= 55 {
        return Err(malformed("non-canonical long-form length"));
    }
    Ok((len, 1 + len_of_len as usize))
}

fn parse_list(mut payload: &[u8]) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = parse(payload)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

fn slice(data: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    data.get(start..start + len)
        .ok_or_else(|| malformed("truncated input"))
}
