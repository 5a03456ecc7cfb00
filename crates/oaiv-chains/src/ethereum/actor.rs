use std::fmt;
use std::str::FromStr;

use alloy::consensus::TxEnvelope;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use oaiv_models::{BlockchainType, KeyPairCheck};
use secrecy::{ExposeSecret, SecretString};
use snafu::prelude::*;
use zeroize::Zeroize;

use crate::error::{
    InvalidAddressSnafu, InvalidPrivateKeySnafu, KeyAddressMismatchSnafu, MissingKeyMaterialSnafu,
    MissingPrivateKeySnafu, SigningSnafu,
};
use crate::Result;

/// Message signed and recovered to prove that a key controls an address.
pub const KEY_PAIR_MESSAGE: &[u8] = b"oaiv key pair check";

/// Ethereum account, optionally able to sign.
pub struct EthereumActor {
    private_key: Option<SecretString>,
    address: Address,
}

impl EthereumActor {
    /// Build an actor from a hex private key, an address, or both. When both
    /// are given the key must derive the address.
    pub fn new(private_key: Option<&str>, address: Option<&str>) -> Result<Self> {
        let signer = private_key.map(parse_signer).transpose()?;
        let supplied = address.map(parse_address).transpose()?;

        let address = match (&signer, supplied) {
            (Some(signer), Some(supplied)) => {
                ensure!(
                    signer.address() == supplied,
                    KeyAddressMismatchSnafu {
                        address: supplied.to_checksum(None),
                        derived: signer.address().to_checksum(None),
                    }
                );
                supplied
            }
            (Some(signer), None) => signer.address(),
            (None, Some(supplied)) => supplied,
            (None, None) => return MissingKeyMaterialSnafu.fail(),
        };

        Ok(Self {
            private_key: signer.map(|signer| signer_secret(&signer)),
            address,
        })
    }

    pub fn random() -> Self {
        let signer = PrivateKeySigner::random();
        Self {
            address: signer.address(),
            private_key: Some(signer_secret(&signer)),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn can_sign(&self) -> bool {
        self.private_key.is_some()
    }

    /// Hex private key with `0x` prefix. Use with care.
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_ref().map(|key| key.expose_secret())
    }

    pub(crate) async fn sign(&self, tx: TransactionRequest) -> Result<TxEnvelope> {
        let signer = match &self.private_key {
            Some(key) => parse_signer(key.expose_secret())?,
            None => {
                return MissingPrivateKeySnafu {
                    address: self.address.to_checksum(None),
                }
                .fail()
            }
        };
        let wallet = EthereumWallet::from(signer);

        tx.with_from(self.address)
            .build(&wallet)
            .await
            .map_err(|e| SigningSnafu { message: e.to_string() }.build())
    }
}

impl fmt::Debug for EthereumActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthereumActor")
            .field("address", &self.address.to_checksum(None))
            .field("can_sign", &self.can_sign())
            .finish_non_exhaustive()
    }
}

fn signer_secret(signer: &PrivateKeySigner) -> SecretString {
    let mut key_bytes: [u8; 32] = signer.to_bytes().0;
    let secret = SecretString::from(format!("0x{}", alloy::primitives::hex::encode(key_bytes)));
    key_bytes.zeroize();
    secret
}

pub(crate) fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    PrivateKeySigner::from_str(private_key.trim().trim_start_matches("0x")).map_err(|e| {
        InvalidPrivateKeySnafu {
            blockchain: BlockchainType::Ethereum,
            reason: e.to_string(),
        }
        .build()
    })
}

/// Parse an address in any case. Mixed-case input must carry a valid EIP-55
/// checksum.
pub(crate) fn parse_address(address: &str) -> Result<Address> {
    let trimmed = address.trim();
    let invalid = || {
        InvalidAddressSnafu {
            blockchain: BlockchainType::Ethereum,
            address: trimmed.to_string(),
        }
        .build()
    };

    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());

    if has_lower && has_upper {
        let prefixed = format!("0x{digits}");
        Address::parse_checksummed(&prefixed, None).map_err(|_| invalid())
    } else {
        Address::from_str(digits).map_err(|_| invalid())
    }
}

/// Sign [`KEY_PAIR_MESSAGE`] with `private_key` and compare the recovered
/// signer with `address`.
pub(crate) fn check_key_pair(private_key: &str, address: &str) -> KeyPairCheck {
    let signer = match parse_signer(private_key) {
        Ok(signer) => signer,
        Err(e) => return KeyPairCheck::unverifiable(e),
    };
    let address = match parse_address(address) {
        Ok(address) => address,
        Err(e) => return KeyPairCheck::unverifiable(e),
    };

    let recovered = signer
        .sign_message_sync(KEY_PAIR_MESSAGE)
        .map_err(|e| e.to_string())
        .and_then(|signature| {
            signature
                .recover_address_from_msg(KEY_PAIR_MESSAGE)
                .map_err(|e| e.to_string())
        });

    match recovered {
        Ok(recovered) => KeyPairCheck::from(recovered == address),
        Err(reason) => KeyPairCheck::unverifiable(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    // First Anvil dev account
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_address_derivation() {
        let actor = EthereumActor::new(Some(KEY), None).unwrap();
        assert_eq!(actor.address().to_checksum(None), ADDRESS);
        assert!(actor.can_sign());
        assert_eq!(actor.private_key(), Some(KEY));
    }

    #[test]
    fn test_lowercase_address_is_checksummed() {
        let actor = EthereumActor::new(None, Some(&ADDRESS.to_lowercase())).unwrap();
        assert_eq!(actor.address().to_checksum(None), ADDRESS);
        assert!(!actor.can_sign());
    }

    #[test]
    fn test_mismatched_key_and_address() {
        let other = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
        let err = EthereumActor::new(Some(KEY), Some(other)).unwrap_err();
        assert!(matches!(err, Error::KeyAddressMismatch { .. }));

        assert!(EthereumActor::new(Some(KEY), Some(ADDRESS)).is_ok());
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        let broken = "0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
        assert!(parse_address(broken).is_err());
        assert!(parse_address(&ADDRESS.to_uppercase().replacen("0X", "0x", 1)).is_ok());
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let actor = EthereumActor::new(Some(KEY), None).unwrap();
        let debug = format!("{actor:?}");
        assert!(debug.contains(ADDRESS));
        assert!(!debug.contains(&KEY[2..]));
    }

    #[test]
    fn test_random_actors_differ() {
        let a = EthereumActor::random();
        let b = EthereumActor::random();
        assert_ne!(a.address(), b.address());
        assert!(a.can_sign());
    }

    #[test]
    fn test_check_key_pair() {
        assert_eq!(check_key_pair(KEY, ADDRESS), KeyPairCheck::Valid);
        assert_eq!(
            check_key_pair(KEY, &ADDRESS.to_lowercase()),
            KeyPairCheck::Valid
        );
        assert_eq!(
            check_key_pair(KEY, "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            KeyPairCheck::Invalid
        );
        assert!(matches!(
            check_key_pair("not a key", ADDRESS),
            KeyPairCheck::Unverifiable { .. }
        ));
        assert!(matches!(
            check_key_pair(KEY, "0xnope"),
            KeyPairCheck::Unverifiable { .. }
        ));
    }
}
