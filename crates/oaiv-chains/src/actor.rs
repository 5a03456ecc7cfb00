use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Encodable2718;
use alloy::rpc::types::TransactionRequest;
use bitcoin::Network;
use oaiv_models::BlockchainType;

use crate::bitcoin::{AddressType, BitcoinActor, UnsignedBitcoinTransaction};
use crate::error::{ChainMismatchSnafu, Result};
use crate::ethereum::EthereumActor;

/// Key and address holder for one chain.
///
/// Constructing through [`Actor::new`] uses the defaults of each chain
/// (legacy addresses on Bitcoin mainnet); build a [`BitcoinActor`] directly
/// for other networks or script types.
#[derive(Debug)]
pub enum Actor {
    Ethereum(EthereumActor),
    Bitcoin(BitcoinActor),
}

#[derive(Debug, Clone)]
pub enum UnsignedTransaction {
    Ethereum(TransactionRequest),
    Bitcoin(UnsignedBitcoinTransaction),
}

impl UnsignedTransaction {
    pub fn blockchain(&self) -> BlockchainType {
        match self {
            UnsignedTransaction::Ethereum(_) => BlockchainType::Ethereum,
            UnsignedTransaction::Bitcoin(_) => BlockchainType::Bitcoin,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SignedTransaction {
    Ethereum(TxEnvelope),
    Bitcoin(bitcoin::Transaction),
}

impl SignedTransaction {
    /// Transaction id as the chain's explorers print it.
    pub fn txid(&self) -> String {
        match self {
            SignedTransaction::Ethereum(envelope) => envelope.tx_hash().to_string(),
            SignedTransaction::Bitcoin(tx) => tx.compute_txid().to_string(),
        }
    }

    /// Network encoding, ready for broadcast.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SignedTransaction::Ethereum(envelope) => envelope.encoded_2718(),
            SignedTransaction::Bitcoin(tx) => bitcoin::consensus::encode::serialize(tx),
        }
    }

    pub fn to_hex(&self) -> String {
        alloy::primitives::hex::encode(self.to_bytes())
    }
}

impl Actor {
    /// Build an actor from a private key, an address, or both.
    pub fn new(
        blockchain: BlockchainType,
        private_key: Option<&str>,
        address: Option<&str>,
    ) -> Result<Self> {
        match blockchain {
            BlockchainType::Ethereum => {
                EthereumActor::new(private_key, address).map(Actor::Ethereum)
            }
            BlockchainType::Bitcoin => BitcoinActor::new(
                private_key,
                address,
                AddressType::default(),
                Network::Bitcoin,
            )
            .map(Actor::Bitcoin),
        }
    }

    pub fn from_private_key(blockchain: BlockchainType, private_key: &str) -> Result<Self> {
        Self::new(blockchain, Some(private_key), None)
    }

    /// An actor that can receive but not sign.
    pub fn watch_only(blockchain: BlockchainType, address: &str) -> Result<Self> {
        Self::new(blockchain, None, Some(address))
    }

    pub fn blockchain(&self) -> BlockchainType {
        match self {
            Actor::Ethereum(_) => BlockchainType::Ethereum,
            Actor::Bitcoin(_) => BlockchainType::Bitcoin,
        }
    }

    /// Checksummed hex on Ethereum, base58 or bech32 on Bitcoin.
    pub fn address(&self) -> String {
        match self {
            Actor::Ethereum(actor) => actor.address().to_checksum(None),
            Actor::Bitcoin(actor) => actor.address().to_string(),
        }
    }

    pub fn can_sign(&self) -> bool {
        match self {
            Actor::Ethereum(actor) => actor.can_sign(),
            Actor::Bitcoin(actor) => actor.can_sign(),
        }
    }

    /// Private key in the chain's usual text form (hex or WIF).
    pub fn private_key(&self) -> Option<&str> {
        match self {
            Actor::Ethereum(actor) => actor.private_key(),
            Actor::Bitcoin(actor) => actor.private_key(),
        }
    }

    pub fn as_ethereum(&self) -> Result<&EthereumActor> {
        match self {
            Actor::Ethereum(actor) => Ok(actor),
            other => ChainMismatchSnafu {
                expected: BlockchainType::Ethereum,
                actual: other.blockchain(),
            }
            .fail(),
        }
    }

    pub fn as_bitcoin(&self) -> Result<&BitcoinActor> {
        match self {
            Actor::Bitcoin(actor) => Ok(actor),
            other => ChainMismatchSnafu {
                expected: BlockchainType::Bitcoin,
                actual: other.blockchain(),
            }
            .fail(),
        }
    }

    /// Sign `tx` with this actor's key. Fails when the actor is watch-only
    /// or `tx` belongs to another chain.
    pub async fn sign_transaction(&self, tx: UnsignedTransaction) -> Result<SignedTransaction> {
        match (self, tx) {
            (Actor::Ethereum(actor), UnsignedTransaction::Ethereum(request)) => {
                actor.sign(request).await.map(SignedTransaction::Ethereum)
            }
            (Actor::Bitcoin(actor), UnsignedTransaction::Bitcoin(unsigned)) => {
                actor.sign(unsigned).map(SignedTransaction::Bitcoin)
            }
            (actor, tx) => ChainMismatchSnafu {
                expected: actor.blockchain(),
                actual: tx.blockchain(),
            }
            .fail(),
        }
    }
}

impl From<EthereumActor> for Actor {
    fn from(actor: EthereumActor) -> Self {
        Actor::Ethereum(actor)
    }
}

impl From<BitcoinActor> for Actor {
    fn from(actor: BitcoinActor) -> Self {
        Actor::Bitcoin(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use alloy::network::TransactionBuilder;
    use alloy::primitives::{address, U256};

    const ETH_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const BTC_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";

    #[test]
    fn test_actor_dispatches_on_blockchain() {
        let eth = Actor::from_private_key(BlockchainType::Ethereum, ETH_KEY).unwrap();
        assert_eq!(eth.blockchain(), BlockchainType::Ethereum);
        assert_eq!(eth.address(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

        let btc = Actor::from_private_key(BlockchainType::Bitcoin, BTC_WIF).unwrap();
        assert_eq!(btc.blockchain(), BlockchainType::Bitcoin);
        assert_eq!(btc.address(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert!(btc.as_ethereum().is_err());
    }

    #[test]
    fn test_watch_only_actor() {
        let actor = Actor::watch_only(
            BlockchainType::Ethereum,
            "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
        )
        .unwrap();
        assert!(!actor.can_sign());
        assert!(actor.private_key().is_none());
        assert_eq!(actor.address(), "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    }

    #[tokio::test]
    async fn test_sign_ethereum_transaction() {
        let actor = Actor::from_private_key(BlockchainType::Ethereum, ETH_KEY).unwrap();
        let request = TransactionRequest::default()
            .with_to(address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"))
            .with_value(U256::from(1_000_000_000_000_000u64))
            .with_nonce(0)
            .with_gas_limit(21_000)
            .with_gas_price(1_000_000_000)
            .with_chain_id(1);

        let signed = actor
            .sign_transaction(UnsignedTransaction::Ethereum(request))
            .await
            .unwrap();

        assert!(signed.txid().starts_with("0x"));
        assert_eq!(signed.txid().len(), 66);
        assert!(!signed.to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_cross_chain_signing_is_rejected() {
        let actor = Actor::from_private_key(BlockchainType::Bitcoin, BTC_WIF).unwrap();
        let err = actor
            .sign_transaction(UnsignedTransaction::Ethereum(TransactionRequest::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ChainMismatch {
                expected: BlockchainType::Bitcoin,
                actual: BlockchainType::Ethereum
            }
        ));
    }

    #[tokio::test]
    async fn test_watch_only_cannot_sign() {
        let actor = Actor::watch_only(
            BlockchainType::Ethereum,
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        )
        .unwrap();
        let err = actor
            .sign_transaction(UnsignedTransaction::Ethereum(TransactionRequest::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingPrivateKey { .. }));
    }
}
