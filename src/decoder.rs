//! Raw-transaction decoding
//!
//! Parses the canonical legacy encoding back into structured fields and
//! derives what the encoding only implies: the sender recovered from the
//! signature, the deployed-contract address for creations, and the
//! decoded `transfer` call for token payloads.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use primitive_types::U256;

use crate::abi::{self, TokenTransferCall};
use crate::address::Address;
use crate::error::{Result, WalletError};
use crate::hash::keccak256;
use crate::rlp;

/// A fully decoded raw transaction. Purely derived data; decoding never
/// touches the vault or the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub payload: Vec<u8>,
    /// `None` for pre-replay-protection signatures (v = 27 or 28).
    pub chain_id: Option<u64>,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    /// Sender recovered from the signature.
    pub sender: Address,
    /// Address the transaction deploys to, for creations.
    pub creates: Option<Address>,
    /// Present when the payload is a token `transfer` call.
    pub token_transfer: Option<TokenTransferCall>,
    /// keccak256 of the raw bytes, 0x-prefixed hex.
    pub hash: String,
}

pub fn decode(raw_hex: &str) -> Result<DecodedTransaction> {
    let digits = raw_hex.strip_prefix("0x").unwrap_or(raw_hex);
    let raw = hex::decode(digits)
        .map_err(|_| WalletError::MalformedEncoding("raw transaction is not hex".into()))?;

    let document = rlp::decode(&raw)?;
    let fields = document.as_list()?;
    if fields.len() != 9 {
        return Err(WalletError::MalformedEncoding(format!(
            "expected 9 transaction fields, found {}",
            fields.len()
        )));
    }

    let nonce = fields[0].as_u64()?;
    let gas_price = fields[1].as_uint()?;
    let gas_limit = fields[2].as_u64()?;
    let to = decode_recipient(fields[3].as_bytes()?)?;
    let value = fields[4].as_uint()?;
    let payload = fields[5].as_bytes()?.to_vec();
    let v = fields[6].as_u64()?;
    let r = fields[7].as_uint()?;
    let s = fields[8].as_uint()?;

    let (chain_id, recovery_bit) = split_v(v)?;

    // Reconstruct the signed preimage: replay-protected transactions hash
    // nine fields with the chain id in place of the signature, legacy
    // ones hash only the first six.
    let mut preimage = vec![
        rlp::encode_uint(U256::from(nonce)),
        rlp::encode_uint(gas_price),
        rlp::encode_uint(U256::from(gas_limit)),
        rlp::encode_bytes(to.as_ref().map_or(&[][..], |a| a.as_bytes())),
        rlp::encode_uint(value),
        rlp::encode_bytes(&payload),
    ];
    if let Some(chain_id) = chain_id {
        preimage.push(rlp::encode_uint(U256::from(chain_id)));
        preimage.push(rlp::encode_uint(U256::zero()));
        preimage.push(rlp::encode_uint(U256::zero()));
    }
    let digest = keccak256(&rlp::encode_list(&preimage));

    let sender = recover_sender(&digest, r, s, recovery_bit)?;
    let creates = if to.is_none() {
        Some(contract_address(sender, nonce))
    } else {
        None
    };

    Ok(DecodedTransaction {
        nonce,
        gas_price,
        gas_limit,
        to,
        value,
        token_transfer: abi::decode_transfer(&payload),
        payload,
        chain_id,
        v,
        r,
        s,
        sender,
        creates,
        hash: format!("0x{}", hex::encode(keccak256(&raw))),
    })
}

fn decode_recipient(bytes: &[u8]) -> Result<Option<Address>> {
    match bytes.len() {
        0 => Ok(None),
        Address::LEN => {
            let mut addr = [0u8; Address::LEN];
            addr.copy_from_slice(bytes);
            Ok(Some(Address::from_bytes(addr)))
        }
        n => Err(WalletError::MalformedEncoding(format!(
            "recipient field is {n} bytes, expected {} or empty",
            Address::LEN
        ))),
    }
}

/// Split the v field into chain id and recovery bit.
fn split_v(v: u64) -> Result<(Option<u64>, u8)> {
    match v {
        27 | 28 => Ok((None, (v - 27) as u8)),
        35.. => Ok((Some((v - 35) / 2), ((v - 35) % 2) as u8)),
        _ => Err(WalletError::MalformedEncoding(format!(
            "invalid signature v value {v}"
        ))),
    }
}

fn recover_sender(digest: &[u8; 32], r: U256, s: U256, recovery_bit: u8) -> Result<Address> {
    let mut sig_bytes = [0u8; 64];
    r.to_big_endian(&mut sig_bytes[..32]);
    s.to_big_endian(&mut sig_bytes[32..]);
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|_| WalletError::MalformedEncoding("invalid signature scalars".into()))?;
    let recovery = RecoveryId::from_byte(recovery_bit)
        .ok_or_else(|| WalletError::MalformedEncoding("invalid recovery bit".into()))?;
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery)
        .map_err(|_| WalletError::MalformedEncoding("signature does not recover".into()))?;

    let point = key.to_encoded_point(false);
    let full = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; Address::LEN];
    addr.copy_from_slice(&full[12..]);
    Ok(Address::from_bytes(addr))
}

/// Deployed-contract address: trailing 20 bytes of keccak256 over the
/// encoded (sender, nonce) pair.
fn contract_address(sender: Address, nonce: u64) -> Address {
    let encoded = rlp::encode_list(&[
        rlp::encode_bytes(sender.as_bytes()),
        rlp::encode_uint(U256::from(nonce)),
    ]);
    let digest = keccak256(&encoded);
    let mut addr = [0u8; Address::LEN];
    addr.copy_from_slice(&digest[12..]);
    Address::from_bytes(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{TransactionSkeleton, TxKind};
    use crate::secret::{ScopedSecret, SECRET_LEN};
    use crate::signer;

    fn test_secret() -> ScopedSecret {
        let mut raw = [0u8; SECRET_LEN];
        raw[31] = 7;
        ScopedSecret::from_bytes(raw).unwrap()
    }

    fn skeleton(to: Option<Address>, payload: Vec<u8>) -> TransactionSkeleton {
        TransactionSkeleton {
            kind: TxKind::CoinTransfer,
            from: test_secret().address(),
            to,
            value: U256::from(1_000_000_000u64),
            gas_limit: 21000,
            gas_price: U256::from(25_000_000_000u64),
            nonce: Some(4),
            payload,
            creates: None,
            chain_id: 43114,
        }
    }

    #[test]
    fn decode_inverts_signing() {
        let secret = test_secret();
        let to = Address::parse("0x000000000000000000000000000000000000beef");
        let built = skeleton(to, Vec::new());
        let signed = signer::sign(built.clone(), &secret).unwrap();

        let decoded = decode(&signed.raw_hex).unwrap();
        assert_eq!(decoded.to, built.to);
        assert_eq!(decoded.value, built.value);
        assert_eq!(decoded.nonce, 4);
        assert_eq!(decoded.gas_limit, built.gas_limit);
        assert_eq!(decoded.gas_price, built.gas_price);
        assert_eq!(decoded.chain_id, Some(43114));
        assert_eq!(decoded.sender, secret.address());
        assert_eq!(decoded.hash, signed.hash);
        assert!(decoded.creates.is_none());
        assert!(decoded.token_transfer.is_none());
    }

    #[test]
    fn contract_creation_derives_deployed_address() {
        let secret = test_secret();
        let signed = signer::sign(skeleton(None, vec![0x60, 0x00]), &secret).unwrap();
        let decoded = decode(&signed.raw_hex).unwrap();

        assert!(decoded.to.is_none());
        let expected = contract_address(secret.address(), 4);
        assert_eq!(decoded.creates, Some(expected));
    }

    #[test]
    fn token_payload_is_decoded() {
        let secret = test_secret();
        let recipient =
            Address::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let amount = U256::from(5_000u64);
        let contract = Address::parse("0x00000000000000000000000000000000000000bb");
        let signed = signer::sign(
            skeleton(contract, abi::encode_transfer(recipient, amount)),
            &secret,
        )
        .unwrap();

        let decoded = decode(&signed.raw_hex).unwrap();
        let call = decoded.token_transfer.unwrap();
        assert_eq!(call.recipient, recipient);
        assert_eq!(call.amount, amount);
    }

    #[test]
    fn structural_violations_are_malformed() {
        assert!(matches!(
            decode("zz").unwrap_err(),
            WalletError::MalformedEncoding(_)
        ));
        // a list with the wrong field count
        let three = rlp::encode_list(&[
            rlp::encode_uint(U256::from(1u64)),
            rlp::encode_uint(U256::from(2u64)),
            rlp::encode_uint(U256::from(3u64)),
        ]);
        assert!(matches!(
            decode(&hex::encode(three)).unwrap_err(),
            WalletError::MalformedEncoding(_)
        ));
        // truncated raw bytes
        let secret = test_secret();
        let to = Address::parse("0x000000000000000000000000000000000000beef");
        let signed = signer::sign(skeleton(to, Vec::new()), &secret).unwrap();
        let truncated = &signed.raw_hex[..signed.raw_hex.len() - 8];
        assert!(matches!(
            decode(truncated).unwrap_err(),
            WalletError::MalformedEncoding(_)
        ));
    }

    #[test]
    fn known_deployment_address() {
        // First deployment from 0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0
        let sender =
            Address::parse("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();
        assert_eq!(
            contract_address(sender, 0).to_string(),
            "cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"
        );
    }
}
