mod actor;
pub mod history;
pub mod transfer;

pub use actor::{AddressType, BitcoinActor, UnsignedBitcoinTransaction};

use std::time::Duration;

use async_trait::async_trait;
use bitcoin::Network;
use block_explorer_client::esplora::{parse_transactions, BLOCKSTREAM_TESTNET_URL, BLOCKSTREAM_URL};
use block_explorer_client::{ClientOptions, EsploraClient};
use oaiv_models::units::{btc_to_sats, sats_to_btc};
use oaiv_models::{
    sort_records, BalanceMap, BlockchainType, KeyPairCheck, SortOrder, TransactionHistory,
};
use serde_json::Value;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{
    DustOutputSnafu, MissingPrivateKeySnafu, NetworkMismatchSnafu, UnknownCurrencySnafu,
};
use crate::{Actor, ChainOperations, Result, TransferRequest, UnsignedTransaction};
use transfer::{FeePolicy, TxSizes, DUST_LIMIT, MIN_RELAY_FEE_RATE};

const BTC: &str = "BTC";

#[derive(Debug, Clone)]
pub struct BitcoinConfig {
    pub network: Network,
    /// Esplora base URL
    pub explorer_url: String,
    pub request_timeout: Duration,
    /// Upper bound on confirmed history pages fetched per account
    pub max_history_pages: usize,
    /// Confirmation target, in blocks, for fee estimation
    pub fee_target_blocks: u16,
    /// Script type of accounts created by the backend
    pub address_type: AddressType,
}

impl BitcoinConfig {
    /// Defaults for `network`, using Blockstream's public explorer where one
    /// exists.
    pub fn for_network(network: Network) -> Self {
        let explorer_url = match network {
            Network::Testnet => BLOCKSTREAM_TESTNET_URL,
            _ => BLOCKSTREAM_URL,
        };
        Self {
            network,
            explorer_url: explorer_url.to_string(),
            request_timeout: ClientOptions::default().timeout,
            max_history_pages: 20,
            fee_target_blocks: 6,
            address_type: AddressType::default(),
        }
    }
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self::for_network(Network::Bitcoin)
    }
}

pub struct BitcoinChain {
    explorer: EsploraClient,
    network: Network,
    max_history_pages: usize,
    fee_target_blocks: u16,
    address_type: AddressType,
}

impl BitcoinChain {
    pub fn new(config: &BitcoinConfig) -> Result<Self> {
        let options = ClientOptions {
            timeout: config.request_timeout,
            ..ClientOptions::default()
        };
        let explorer = EsploraClient::new(&config.explorer_url, options)?;

        Ok(Self {
            explorer,
            network: config.network,
            max_history_pages: config.max_history_pages,
            fee_target_blocks: config.fee_target_blocks,
            address_type: config.address_type,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Fee rate for the configured confirmation target. Falls back to the
    /// closest faster target, then to the minimum relay fee.
    async fn fee_rate(&self) -> Result<f64> {
        let estimates = self.explorer.fee_estimates().await?;
        let target = self.fee_target_blocks;

        let rate = estimates
            .iter()
            .filter_map(|(blocks, rate)| Some((blocks.parse::<u16>().ok()?, *rate)))
            .filter(|(blocks, _)| *blocks <= target)
            .max_by_key(|(blocks, _)| *blocks)
            .map(|(_, rate)| rate)
            .unwrap_or(MIN_RELAY_FEE_RATE);

        debug!(target_blocks = target, rate, "estimated fee rate");
        Ok(rate.max(MIN_RELAY_FEE_RATE))
    }
}

#[async_trait]
impl ChainOperations for BitcoinChain {
    fn blockchain(&self) -> BlockchainType {
        BlockchainType::Bitcoin
    }

    fn is_address(&self, address: &str) -> bool {
        !address.trim().is_empty() && actor::parse_address(address, self.network).is_ok()
    }

    fn is_key_pair(&self, private_key: &str, address: &str) -> KeyPairCheck {
        let check = actor::check_key_pair(private_key, address, self.network);
        if let KeyPairCheck::Unverifiable { reason } = &check {
            warn!(%reason, "could not verify Bitcoin key pair");
        }
        check
    }

    /// Sum of unspent outputs per address, confirmed or not.
    async fn balance(&self, addresses: &[String]) -> Result<BalanceMap> {
        let mut balances = BalanceMap::new();
        for address in addresses {
            let utxos = self.explorer.address_utxos(address).await?;
            let sats: u64 = utxos.iter().map(|utxo| utxo.value).sum();
            balances
                .entry(address.clone())
                .or_default()
                .insert(BTC.to_string(), sats_to_btc(sats));
        }
        Ok(balances)
    }

    async fn get_transactions(
        &self,
        account: &str,
        sort: SortOrder,
        raw: bool,
    ) -> Result<TransactionHistory> {
        let transactions = self
            .explorer
            .address_history(account, self.max_history_pages)
            .await?;

        if raw {
            return Ok(TransactionHistory::Raw {
                native: Value::Array(transactions),
                tokens: None,
            });
        }

        let mut records = history::normalize_history(&parse_transactions(&transactions)?);
        sort_records(&mut records, sort);
        Ok(TransactionHistory::Normalized {
            native: records,
            tokens: Vec::new(),
        })
    }

    fn create_account(&self) -> Result<Actor> {
        let actor = BitcoinActor::random(self.address_type, self.network)?;
        info!(
            address = %actor.address(),
            address_type = %actor.address_type(),
            "Created new Bitcoin account"
        );
        Ok(Actor::Bitcoin(actor))
    }

    async fn make_transaction(&self, request: TransferRequest<'_>) -> Result<String> {
        let sender = request.sender.as_bitcoin()?;
        let receiver = request.receiver.as_bitcoin()?;
        ensure!(
            request.currency.eq_ignore_ascii_case(BTC),
            UnknownCurrencySnafu {
                currency: request.currency,
            }
        );
        for actor in [sender, receiver] {
            ensure!(
                actor.network() == self.network,
                NetworkMismatchSnafu {
                    address: actor.address().to_string(),
                    expected: self.network.to_string(),
                    actual: actor.network().to_string(),
                }
            );
        }
        ensure!(
            sender.can_sign(),
            MissingPrivateKeySnafu {
                address: sender.address().to_string(),
            }
        );

        let amount = btc_to_sats(request.value)?;
        ensure!(amount >= DUST_LIMIT, DustOutputSnafu { amount });

        let fee = match request.gas {
            Some(fee) => FeePolicy::Absolute(fee),
            None => FeePolicy::Rate(self.fee_rate().await?),
        };
        let utxos = self
            .explorer
            .address_utxos(&sender.address().to_string())
            .await?;
        let sizes = TxSizes::new(
            sender.address_type(),
            &receiver.address().script_pubkey(),
            &sender.address().script_pubkey(),
        );
        let selection = transfer::select_coins(&utxos, amount, fee, &sizes)?;
        let unsigned = transfer::build_unsigned(&selection, sender.address(), receiver.address(), amount)?;

        let signed = request
            .sender
            .sign_transaction(UnsignedTransaction::Bitcoin(unsigned))
            .await?;
        let txid = self
            .explorer
            .broadcast(&signed.to_hex(), &signed.txid())
            .await?;

        info!(
            from = %sender.address(),
            to = %receiver.address(),
            amount,
            fee = selection.fee,
            %txid,
            "Broadcast Bitcoin transaction"
        );
        Ok(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use rust_decimal::Decimal;

    fn chain() -> BitcoinChain {
        BitcoinChain::new(&BitcoinConfig::default()).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = BitcoinConfig::for_network(Network::Testnet);
        assert_eq!(config.explorer_url, BLOCKSTREAM_TESTNET_URL);
        assert_eq!(BitcoinConfig::default().explorer_url, BLOCKSTREAM_URL);
        assert_eq!(config.address_type, AddressType::P2pkh);
    }

    #[test]
    fn test_is_address() {
        let chain = chain();
        assert!(chain.is_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
        assert!(chain.is_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"));
        assert!(!chain.is_address(""));
        assert!(!chain.is_address("   "));
        assert!(!chain.is_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!chain.is_address("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"));
    }

    #[test]
    fn test_create_account_uses_configured_type() {
        let config = BitcoinConfig {
            address_type: AddressType::P2wpkh,
            ..BitcoinConfig::default()
        };
        let chain = BitcoinChain::new(&config).unwrap();

        let actor = chain.create_account().unwrap();
        assert!(actor.can_sign());
        assert!(actor.address().starts_with("bc1q"));
        assert!(chain.is_key_pair(actor.private_key().unwrap(), &actor.address()).is_valid());
    }

    #[tokio::test]
    async fn test_transfer_checks_happen_before_network() {
        let chain = chain();
        let sender = Actor::from_private_key(
            BlockchainType::Bitcoin,
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn",
        )
        .unwrap();
        let receiver =
            Actor::watch_only(BlockchainType::Bitcoin, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").unwrap();

        let request = TransferRequest {
            sender: &sender,
            receiver: &receiver,
            value: Decimal::new(1, 8),
            currency: "BTC",
            gas: Some(1_000),
        };
        let err = chain.make_transaction(request).await.unwrap_err();
        assert!(matches!(err, Error::DustOutput { amount: 1 }));

        let request = TransferRequest {
            currency: "ETH",
            ..request
        };
        let err = chain.make_transaction(request).await.unwrap_err();
        assert!(matches!(err, Error::UnknownCurrency { .. }));

        let request = TransferRequest {
            sender: &receiver,
            currency: "BTC",
            ..request
        };
        let err = chain.make_transaction(request).await.unwrap_err();
        assert!(matches!(err, Error::MissingPrivateKey { .. }));
    }
}
