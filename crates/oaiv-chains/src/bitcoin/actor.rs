use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{
    Address, CompressedPublicKey, Network, NetworkKind, PrivateKey, ScriptBuf, Transaction, TxOut,
    Witness,
};
use oaiv_models::{BlockchainType, KeyPairCheck};
use secrecy::{ExposeSecret, SecretString};
use snafu::prelude::*;

use crate::error::{
    InvalidAddressSnafu, InvalidPrivateKeySnafu, KeyAddressMismatchSnafu, MissingKeyMaterialSnafu,
    MissingPrivateKeySnafu, SigningSnafu,
};
use crate::{Error, Result};

/// Script type an actor receives funds on and spends from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressType {
    /// Legacy pay-to-pubkey-hash (`1...`)
    #[default]
    P2pkh,
    /// Nested segwit, P2WPKH wrapped in P2SH (`3...`)
    P2shP2wpkh,
    /// Native segwit v0 (`bc1q...`)
    P2wpkh,
}

impl AddressType {
    pub const ALL: [AddressType; 3] = [
        AddressType::P2pkh,
        AddressType::P2shP2wpkh,
        AddressType::P2wpkh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::P2pkh => "p2pkh",
            AddressType::P2shP2wpkh => "p2sh-p2wpkh",
            AddressType::P2wpkh => "p2wpkh",
        }
    }

    fn of_address(address: &Address) -> Self {
        match address.address_type() {
            Some(bitcoin::AddressType::P2sh) => AddressType::P2shP2wpkh,
            Some(bitcoin::AddressType::P2wpkh) => AddressType::P2wpkh,
            _ => AddressType::P2pkh,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p2pkh" | "legacy" => Ok(AddressType::P2pkh),
            "p2sh" | "p2sh-p2wpkh" | "nested" => Ok(AddressType::P2shP2wpkh),
            "p2wpkh" | "segwit" | "bech32" => Ok(AddressType::P2wpkh),
            other => Err(format!("unknown address type {other:?}")),
        }
    }
}

/// A transaction whose inputs all spend outputs of one actor.
#[derive(Debug, Clone)]
pub struct UnsignedBitcoinTransaction {
    pub tx: Transaction,
    /// Outputs being spent, in input order
    pub prevouts: Vec<TxOut>,
}

/// Bitcoin account, optionally able to sign.
pub struct BitcoinActor {
    /// WIF
    private_key: Option<SecretString>,
    address: Address,
    address_type: AddressType,
    network: Network,
}

impl BitcoinActor {
    /// Build an actor from a private key (WIF or 64 hex digits), an address,
    /// or both. `address_type` applies to a key alone; when an address is
    /// supplied its own script type is used and the key must derive it.
    pub fn new(
        private_key: Option<&str>,
        address: Option<&str>,
        address_type: AddressType,
        network: Network,
    ) -> Result<Self> {
        let key = private_key
            .map(|key| parse_private_key(key, network))
            .transpose()?;
        let supplied = address
            .map(|address| parse_address(address, network))
            .transpose()?;

        let (address, address_type) = match (&key, supplied) {
            (Some(key), supplied) => {
                let address_type = supplied
                    .as_ref()
                    .map_or(address_type, AddressType::of_address);
                let derived = derive_address(key, address_type, network)?;
                if let Some(supplied) = supplied {
                    ensure!(
                        supplied == derived,
                        KeyAddressMismatchSnafu {
                            address: supplied.to_string(),
                            derived: derived.to_string(),
                        }
                    );
                }
                (derived, address_type)
            }
            (None, Some(supplied)) => {
                let inferred = AddressType::of_address(&supplied);
                (supplied, inferred)
            }
            (None, None) => return MissingKeyMaterialSnafu.fail(),
        };

        Ok(Self {
            private_key: key.map(|key| SecretString::from(key.to_wif())),
            address,
            address_type,
            network,
        })
    }

    pub fn random(address_type: AddressType, network: Network) -> Result<Self> {
        let key = PrivateKey::generate(network);
        let address = derive_address(&key, address_type, network)?;
        Ok(Self {
            private_key: Some(SecretString::from(key.to_wif())),
            address,
            address_type,
            network,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn can_sign(&self) -> bool {
        self.private_key.is_some()
    }

    /// WIF private key. Use with care.
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_ref().map(|key| key.expose_secret())
    }

    /// Sign every input of `unsigned` with this actor's key.
    pub(crate) fn sign(&self, unsigned: UnsignedBitcoinTransaction) -> Result<Transaction> {
        let key = match &self.private_key {
            Some(wif) => parse_private_key(wif.expose_secret(), self.network)?,
            None => {
                return MissingPrivateKeySnafu {
                    address: self.address.to_string(),
                }
                .fail()
            }
        };
        ensure!(
            unsigned.prevouts.len() == unsigned.tx.input.len(),
            SigningSnafu {
                message: "one prevout per input is required",
            }
        );

        let secp = Secp256k1::new();
        let public_key = key.public_key(&secp);
        let compressed = match self.address_type {
            AddressType::P2pkh => None,
            _ => Some(CompressedPublicKey::try_from(public_key).map_err(signing_error)?),
        };
        // P2SH-P2WPKH commits to the same witness program as native P2WPKH
        let witness_program = compressed
            .as_ref()
            .map(|compressed| ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash()));

        let mut tx = unsigned.tx;
        let mut signatures = Vec::with_capacity(tx.input.len());
        {
            let mut cache = SighashCache::new(&tx);
            for (index, prevout) in unsigned.prevouts.iter().enumerate() {
                let digest = match &witness_program {
                    None => cache
                        .legacy_signature_hash(
                            index,
                            &prevout.script_pubkey,
                            EcdsaSighashType::All.to_u32(),
                        )
                        .map_err(signing_error)?
                        .to_byte_array(),
                    Some(program) => cache
                        .p2wpkh_signature_hash(index, program, prevout.value, EcdsaSighashType::All)
                        .map_err(signing_error)?
                        .to_byte_array(),
                };
                let message = Message::from_digest(digest);
                signatures.push(bitcoin::ecdsa::Signature::sighash_all(
                    secp.sign_ecdsa(&message, &key.inner),
                ));
            }
        }

        for (input, signature) in tx.input.iter_mut().zip(signatures) {
            match (self.address_type, &compressed, &witness_program) {
                (AddressType::P2pkh, _, _) => {
                    input.script_sig = Builder::new()
                        .push_slice(push_bytes(signature.to_vec())?)
                        .push_key(&public_key)
                        .into_script();
                }
                (AddressType::P2shP2wpkh, Some(compressed), Some(program)) => {
                    input.script_sig = Builder::new()
                        .push_slice(push_bytes(program.to_bytes())?)
                        .into_script();
                    input.witness = Witness::p2wpkh(&signature, &compressed.0);
                }
                (AddressType::P2wpkh, Some(compressed), _) => {
                    input.witness = Witness::p2wpkh(&signature, &compressed.0);
                }
                _ => {
                    return SigningSnafu {
                        message: "segwit inputs need a compressed key",
                    }
                    .fail()
                }
            }
        }

        Ok(tx)
    }
}

impl fmt::Debug for BitcoinActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitcoinActor")
            .field("address", &self.address.to_string())
            .field("address_type", &self.address_type)
            .field("network", &self.network)
            .field("can_sign", &self.can_sign())
            .finish_non_exhaustive()
    }
}

fn signing_error(error: impl ToString) -> Error {
    SigningSnafu {
        message: error.to_string(),
    }
    .build()
}

fn push_bytes(bytes: Vec<u8>) -> Result<PushBytesBuf> {
    PushBytesBuf::try_from(bytes).map_err(signing_error)
}

/// Parse a WIF key, or 64 hex digits as a compressed key for `network`.
pub(crate) fn parse_private_key(raw: &str, network: Network) -> Result<PrivateKey> {
    let raw = raw.trim();
    let invalid = |reason: String| {
        InvalidPrivateKeySnafu {
            blockchain: BlockchainType::Bitcoin,
            reason,
        }
        .build()
    };

    if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        let secret = SecretKey::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        return Ok(PrivateKey::new(secret, network));
    }

    let key = PrivateKey::from_wif(raw).map_err(|e| invalid(e.to_string()))?;
    if key.network != NetworkKind::from(network) {
        return Err(invalid(format!("WIF key is not for {network}")));
    }
    Ok(key)
}

pub(crate) fn parse_address(address: &str, network: Network) -> Result<Address> {
    let invalid = || {
        InvalidAddressSnafu {
            blockchain: BlockchainType::Bitcoin,
            address: address.to_string(),
        }
        .build()
    };

    Address::from_str(address.trim())
        .map_err(|_| invalid())?
        .require_network(network)
        .map_err(|_| invalid())
}

pub(crate) fn derive_address(
    key: &PrivateKey,
    address_type: AddressType,
    network: Network,
) -> Result<Address> {
    let secp = Secp256k1::new();
    let public_key = key.public_key(&secp);

    if address_type == AddressType::P2pkh {
        return Ok(Address::p2pkh(public_key, network));
    }

    let compressed = CompressedPublicKey::try_from(public_key).map_err(|e| {
        InvalidPrivateKeySnafu {
            blockchain: BlockchainType::Bitcoin,
            reason: format!("{address_type} needs a compressed key: {e}"),
        }
        .build()
    })?;
    Ok(match address_type {
        AddressType::P2shP2wpkh => Address::p2shwpkh(&compressed, network),
        _ => Address::p2wpkh(&compressed, network),
    })
}

/// Compare `address` with every address `private_key` can control: each
/// supported script type, and for hex keys the uncompressed legacy form too.
pub(crate) fn check_key_pair(private_key: &str, address: &str, network: Network) -> KeyPairCheck {
    let key = match parse_private_key(private_key, network) {
        Ok(key) => key,
        Err(e) => return KeyPairCheck::unverifiable(e),
    };
    let address = match parse_address(address, network) {
        Ok(address) => address,
        Err(e) => return KeyPairCheck::unverifiable(e),
    };

    let mut candidates = vec![key];
    let trimmed = private_key.trim();
    if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        candidates.push(PrivateKey {
            compressed: false,
            ..key
        });
    }

    let matches = candidates.iter().any(|candidate| {
        AddressType::ALL.iter().any(|address_type| {
            derive_address(candidate, *address_type, network)
                .map(|derived| derived == address)
                .unwrap_or(false)
        })
    });
    KeyPairCheck::from(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, Sequence, TxIn, Txid};

    // Secret key 1
    const WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    const HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const P2PKH: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
    const P2PKH_UNCOMPRESSED: &str = "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm";
    const P2WPKH: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    /// Belongs to another key
    const OTHER: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    #[test]
    fn test_derivation_per_address_type() {
        let actor = BitcoinActor::new(Some(WIF), None, AddressType::P2pkh, Network::Bitcoin)
            .unwrap();
        assert_eq!(actor.address().to_string(), P2PKH);

        let actor = BitcoinActor::new(Some(HEX), None, AddressType::P2wpkh, Network::Bitcoin)
            .unwrap();
        assert_eq!(actor.address().to_string(), P2WPKH);
        assert_eq!(actor.private_key(), Some(WIF));

        let actor =
            BitcoinActor::new(Some(WIF), None, AddressType::P2shP2wpkh, Network::Bitcoin).unwrap();
        assert!(actor.address().to_string().starts_with('3'));
    }

    #[test]
    fn test_supplied_address_must_match() {
        assert!(
            BitcoinActor::new(Some(WIF), Some(P2PKH), AddressType::P2pkh, Network::Bitcoin).is_ok()
        );
        let err = BitcoinActor::new(Some(WIF), Some(OTHER), AddressType::P2pkh, Network::Bitcoin)
            .unwrap_err();
        assert!(matches!(err, Error::KeyAddressMismatch { .. }));
    }

    #[test]
    fn test_supplied_address_sets_type() {
        // agrees with check_key_pair, which accepts any encoding of the key
        assert_eq!(check_key_pair(WIF, P2WPKH, Network::Bitcoin), KeyPairCheck::Valid);
        let actor =
            BitcoinActor::new(Some(WIF), Some(P2WPKH), AddressType::P2pkh, Network::Bitcoin).unwrap();
        assert_eq!(actor.address_type(), AddressType::P2wpkh);
        assert_eq!(actor.address().to_string(), P2WPKH);
        assert!(actor.can_sign());
    }

    #[test]
    fn test_watch_only_infers_type() {
        let actor = BitcoinActor::new(None, Some(P2WPKH), AddressType::P2pkh, Network::Bitcoin)
            .unwrap();
        assert_eq!(actor.address_type(), AddressType::P2wpkh);
        assert!(!actor.can_sign());
        assert!(matches!(
            BitcoinActor::new(None, None, AddressType::P2pkh, Network::Bitcoin),
            Err(Error::MissingKeyMaterial)
        ));
    }

    #[test]
    fn test_wrong_network_is_rejected() {
        assert!(parse_address(P2PKH, Network::Testnet).is_err());
        assert!(parse_private_key(WIF, Network::Testnet).is_err());
        assert!(parse_private_key(HEX, Network::Testnet).is_ok());
    }

    #[test]
    fn test_check_key_pair() {
        let net = Network::Bitcoin;
        assert_eq!(check_key_pair(WIF, P2PKH, net), KeyPairCheck::Valid);
        assert_eq!(check_key_pair(WIF, P2WPKH, net), KeyPairCheck::Valid);
        assert_eq!(check_key_pair(HEX, P2PKH_UNCOMPRESSED, net), KeyPairCheck::Valid);
        assert_eq!(
            check_key_pair(WIF, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", net),
            KeyPairCheck::Invalid
        );
        assert!(matches!(
            check_key_pair("garbage", P2PKH, net),
            KeyPairCheck::Unverifiable { .. }
        ));
        assert!(matches!(
            check_key_pair(WIF, "", net),
            KeyPairCheck::Unverifiable { .. }
        ));
    }

    fn spend_one(actor: &BitcoinActor) -> UnsignedBitcoinTransaction {
        let prevout = TxOut {
            value: Amount::from_sat(100_000),
            script_pubkey: actor.address().script_pubkey(),
        };
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::all_zeros(),
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(90_000),
                script_pubkey: actor.address().script_pubkey(),
            }],
        };
        UnsignedBitcoinTransaction {
            tx,
            prevouts: vec![prevout],
        }
    }

    #[test]
    fn test_signing_fills_the_right_fields() {
        let legacy = BitcoinActor::new(Some(WIF), None, AddressType::P2pkh, Network::Bitcoin)
            .unwrap();
        let signed = legacy.sign(spend_one(&legacy)).unwrap();
        assert!(!signed.input[0].script_sig.is_empty());
        assert!(signed.input[0].witness.is_empty());

        let native = BitcoinActor::new(Some(WIF), None, AddressType::P2wpkh, Network::Bitcoin)
            .unwrap();
        let signed = native.sign(spend_one(&native)).unwrap();
        assert!(signed.input[0].script_sig.is_empty());
        assert_eq!(signed.input[0].witness.len(), 2);

        let nested =
            BitcoinActor::new(Some(WIF), None, AddressType::P2shP2wpkh, Network::Bitcoin).unwrap();
        let signed = nested.sign(spend_one(&nested)).unwrap();
        assert!(!signed.input[0].script_sig.is_empty());
        assert_eq!(signed.input[0].witness.len(), 2);
    }

    #[test]
    fn test_watch_only_cannot_sign() {
        let watcher = BitcoinActor::new(None, Some(P2PKH), AddressType::P2pkh, Network::Bitcoin)
            .unwrap();
        let err = watcher.sign(spend_one(&watcher)).unwrap_err();
        assert!(matches!(err, Error::MissingPrivateKey { .. }));
    }
}
