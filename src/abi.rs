//! Minimal contract-call encodings
//!
//! Only the fixed set of token and pair calls this wallet issues. This is
//! not a general ABI encoder; every call the wallet makes is spelled out
//! here, selector and all.

use primitive_types::U256;

use crate::address::Address;
use crate::error::{Result, WalletError};

/// Selector of `transfer(address,uint256)`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// Selector of `balanceOf(address)`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// Selector of `allowance(address,address)`.
pub const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
/// Selector of `decimals()`.
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// Selector of `symbol()`.
pub const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
/// Selector of `name()`.
pub const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
/// Selector of the pair factory's `getPair(address,address)`.
pub const GET_PAIR_SELECTOR: [u8; 4] = [0xe6, 0xa4, 0x39, 0x05];
/// Selector of the pair contract's `getReserves()`.
pub const GET_RESERVES_SELECTOR: [u8; 4] = [0x09, 0x02, 0xf1, 0xac];

fn address_word(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_bytes());
    word
}

fn uint_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

fn call(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 32 * words.len());
    out.extend_from_slice(&selector);
    for word in words {
        out.extend_from_slice(word);
    }
    out
}

/// `transfer(address,uint256)` payload for a token transfer transaction.
pub fn encode_transfer(recipient: Address, amount: U256) -> Vec<u8> {
    call(
        TRANSFER_SELECTOR,
        &[address_word(recipient), uint_word(amount)],
    )
}

pub fn encode_balance_of(owner: Address) -> Vec<u8> {
    call(BALANCE_OF_SELECTOR, &[address_word(owner)])
}

pub fn encode_allowance(owner: Address, spender: Address) -> Vec<u8> {
    call(
        ALLOWANCE_SELECTOR,
        &[address_word(owner), address_word(spender)],
    )
}

pub fn encode_decimals() -> Vec<u8> {
    call(DECIMALS_SELECTOR, &[])
}

pub fn encode_symbol() -> Vec<u8> {
    call(SYMBOL_SELECTOR, &[])
}

pub fn encode_name() -> Vec<u8> {
    call(NAME_SELECTOR, &[])
}

pub fn encode_get_pair(asset_a: Address, asset_b: Address) -> Vec<u8> {
    call(
        GET_PAIR_SELECTOR,
        &[address_word(asset_a), address_word(asset_b)],
    )
}

pub fn encode_get_reserves() -> Vec<u8> {
    call(GET_RESERVES_SELECTOR, &[])
}

/// A decoded `transfer(address,uint256)` call payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransferCall {
    pub recipient: Address,
    pub amount: U256,
}

/// Recognize a token-transfer payload. Returns `None` for anything that is
/// not exactly a `transfer(address,uint256)` call.
pub fn decode_transfer(payload: &[u8]) -> Option<TokenTransferCall> {
    if payload.len() != 4 + 64 || payload[..4] != TRANSFER_SELECTOR {
        return None;
    }
    let addr_word = &payload[4..36];
    if addr_word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&addr_word[12..]);
    Some(TokenTransferCall {
        recipient: Address::from_bytes(addr),
        amount: U256::from_big_endian(&payload[36..68]),
    })
}

fn word(data: &[u8], index: usize) -> Result<&[u8]> {
    data.get(index * 32..(index + 1) * 32)
        .ok_or_else(|| WalletError::MalformedEncoding(format!("missing return word {index}")))
}

/// Decode a single `uint256` return value.
pub fn decode_uint(data: &[u8], index: usize) -> Result<U256> {
    Ok(U256::from_big_endian(word(data, index)?))
}

/// Decode a single `address` return value.
pub fn decode_address(data: &[u8], index: usize) -> Result<Address> {
    let w = word(data, index)?;
    if w[..12].iter().any(|b| *b != 0) {
        return Err(WalletError::MalformedEncoding(
            "address word has nonzero padding".into(),
        ));
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&w[12..]);
    Ok(Address::from_bytes(addr))
}

/// Decode a single `bool` return value.
pub fn decode_bool(data: &[u8], index: usize) -> Result<bool> {
    let v = decode_uint(data, index)?;
    if v > U256::one() {
        return Err(WalletError::MalformedEncoding(
            "bool word is neither 0 nor 1".into(),
        ));
    }
    Ok(v == U256::one())
}

/// Decode a dynamic `string` return value (offset word, length word, bytes).
pub fn decode_string(data: &[u8]) -> Result<String> {
    let offset = decode_uint(data, 0)?;
    if offset > U256::from(data.len()) {
        return Err(WalletError::MalformedEncoding(
            "string offset out of range".into(),
        ));
    }
    let offset = offset.as_usize();
    let tail = &data[offset..];
    let len = decode_uint(tail, 0)?;
    if len > U256::from(tail.len()) {
        return Err(WalletError::MalformedEncoding(
            "string length out of range".into(),
        ));
    }
    let len = len.as_usize();
    let bytes = tail
        .get(32..32 + len)
        .ok_or_else(|| WalletError::MalformedEncoding("string payload truncated".into()))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| WalletError::MalformedEncoding("string is not valid utf-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::keccak256;

    fn selector(signature: &str) -> [u8; 4] {
        let digest = keccak256(signature.as_bytes());
        [digest[0], digest[1], digest[2], digest[3]]
    }

    #[test]
    fn selectors_match_their_signatures() {
        assert_eq!(TRANSFER_SELECTOR, selector("transfer(address,uint256)"));
        assert_eq!(BALANCE_OF_SELECTOR, selector("balanceOf(address)"));
        assert_eq!(ALLOWANCE_SELECTOR, selector("allowance(address,address)"));
        assert_eq!(DECIMALS_SELECTOR, selector("decimals()"));
        assert_eq!(SYMBOL_SELECTOR, selector("symbol()"));
        assert_eq!(NAME_SELECTOR, selector("name()"));
        assert_eq!(GET_PAIR_SELECTOR, selector("getPair(address,address)"));
        assert_eq!(GET_RESERVES_SELECTOR, selector("getReserves()"));
    }

    #[test]
    fn transfer_round_trip() {
        let to = Address::from_bytes([0x11; 20]);
        let amount = U256::from(123_456u64);
        let payload = encode_transfer(to, amount);
        assert_eq!(payload.len(), 68);

        let decoded = decode_transfer(&payload).unwrap();
        assert_eq!(decoded.recipient, to);
        assert_eq!(decoded.amount, amount);
    }

    #[test]
    fn decode_transfer_rejects_other_payloads() {
        assert!(decode_transfer(&[]).is_none());
        assert!(decode_transfer(&encode_balance_of(Address::from_bytes([1; 20]))).is_none());
        // right selector, truncated arguments
        assert!(decode_transfer(&TRANSFER_SELECTOR).is_none());
    }

    #[test]
    fn decode_words() {
        let a = Address::from_bytes([0x22; 20]);
        let data = encode_allowance(a, a);
        // skip the selector, then the two words are address-shaped
        assert_eq!(decode_address(&data[4..], 0).unwrap(), a);
        assert_eq!(decode_address(&data[4..], 1).unwrap(), a);
        assert!(decode_address(&data[4..], 2).is_err());
    }

    #[test]
    fn decode_string_return() {
        // offset 0x20, length 3, "ABC" padded to a word
        let mut data = vec![0u8; 96];
        data[31] = 0x20;
        data[63] = 3;
        data[64..67].copy_from_slice(b"ABC");
        assert_eq!(decode_string(&data).unwrap(), "ABC");
    }

    #[test]
    fn decode_string_rejects_bad_offsets() {
        let mut data = vec![0u8; 32];
        data[31] = 0xff;
        assert!(decode_string(&data).is_err());
    }

    #[test]
    fn bool_decoding() {
        let mut data = vec![0u8; 32];
        assert!(!decode_bool(&data, 0).unwrap());
        data[31] = 1;
        assert!(decode_bool(&data, 0).unwrap());
        data[31] = 2;
        assert!(decode_bool(&data, 0).is_err());
    }
}
