use crate::bitcoin::{BitcoinChain, BitcoinConfig};
use crate::error::{ChainMismatchSnafu, ChainNotSupportedSnafu};
use crate::ethereum::{EthereumChain, EthereumConfig};
use crate::{Actor, ChainOperations, Result, TransferRequest};
use oaiv_models::{BalanceMap, BlockchainType, KeyPairCheck, SortOrder, TransactionHistory};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes each operation to the backend registered for its blockchain.
pub struct ChainDispatcher {
    chains: HashMap<BlockchainType, Arc<dyn ChainOperations>>,
}

impl ChainDispatcher {
    pub fn new() -> Self {
        Self {
            chains: HashMap::new(),
        }
    }

    /// Dispatcher with whichever backends are configured.
    pub fn from_configs(
        ethereum: Option<&EthereumConfig>,
        bitcoin: Option<&BitcoinConfig>,
    ) -> Result<Self> {
        let mut dispatcher = Self::new();
        if let Some(config) = ethereum {
            dispatcher.register(Arc::new(EthereumChain::new(config)?));
        }
        if let Some(config) = bitcoin {
            dispatcher.register(Arc::new(BitcoinChain::new(config)?));
        }
        Ok(dispatcher)
    }

    /// Register `implementation` under the blockchain it reports, replacing
    /// any earlier backend for that chain.
    pub fn register(&mut self, implementation: Arc<dyn ChainOperations>) {
        self.chains
            .insert(implementation.blockchain(), implementation);
    }

    pub fn get(&self, blockchain: BlockchainType) -> Result<Arc<dyn ChainOperations>> {
        self.chains
            .get(&blockchain)
            .cloned()
            .context(ChainNotSupportedSnafu {
                chain: blockchain.to_string(),
            })
    }

    pub fn supported_chains(&self) -> Vec<BlockchainType> {
        self.chains.keys().copied().collect()
    }

    pub fn is_address(&self, blockchain: BlockchainType, address: &str) -> Result<bool> {
        Ok(self.get(blockchain)?.is_address(address))
    }

    pub fn is_key_pair(
        &self,
        blockchain: BlockchainType,
        private_key: &str,
        address: &str,
    ) -> Result<KeyPairCheck> {
        Ok(self.get(blockchain)?.is_key_pair(private_key, address))
    }

    pub async fn balance(
        &self,
        blockchain: BlockchainType,
        addresses: &[String],
    ) -> Result<BalanceMap> {
        self.get(blockchain)?.balance(addresses).await
    }

    pub async fn get_transactions(
        &self,
        blockchain: BlockchainType,
        account: &str,
        sort: SortOrder,
        raw: bool,
    ) -> Result<TransactionHistory> {
        self.get(blockchain)?
            .get_transactions(account, sort, raw)
            .await
    }

    pub fn create_account(&self, blockchain: BlockchainType) -> Result<Actor> {
        self.get(blockchain)?.create_account()
    }

    pub async fn make_transaction(
        &self,
        blockchain: BlockchainType,
        request: TransferRequest<'_>,
    ) -> Result<String> {
        for actor in [request.sender, request.receiver] {
            ensure!(
                actor.blockchain() == blockchain,
                ChainMismatchSnafu {
                    expected: blockchain,
                    actual: actor.blockchain(),
                }
            );
        }
        self.get(blockchain)?.make_transaction(request).await
    }
}

impl Default for ChainDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
