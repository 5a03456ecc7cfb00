mod actor;
pub mod history;

pub use actor::{EthereumActor, KEY_PAIR_MESSAGE};

use std::sync::Arc;
use std::time::Duration;

use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use block_explorer_client::etherscan::{parse_result, ETHERSCAN_V2_URL};
use block_explorer_client::ethplorer::{ETHPLORER_FREE_KEY, ETHPLORER_URL};
use block_explorer_client::{ClientOptions, EthplorerClient, EtherscanClient};
use oaiv_models::units::{parse_minor_units, to_minor_units};
use oaiv_models::{
    merge_balances, BalanceMap, BlockchainType, EthereumNetwork, KeyPairCheck, SortOrder,
    TokenRegistry, TransactionHistory,
};
use secrecy::{ExposeSecret, SecretString};
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{InvalidNodeUrlSnafu, MissingPrivateKeySnafu, RpcSnafu, UnknownCurrencySnafu};
use crate::{Actor, ChainOperations, Result, TransferRequest, UnsignedTransaction};

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

const CHAIN: BlockchainType = BlockchainType::Ethereum;

/// Endpoints and credentials of the Ethereum backend.
#[derive(Debug)]
pub struct EthereumConfig {
    pub etherscan_api_key: SecretString,
    pub ethplorer_api_key: SecretString,
    pub network: EthereumNetwork,
    /// JSON-RPC endpoint used for gas, nonce and broadcast
    pub node_url: String,
    pub etherscan_url: String,
    pub ethplorer_url: String,
    pub request_timeout: Duration,
}

impl EthereumConfig {
    pub fn new(
        network: EthereumNetwork,
        node_url: impl Into<String>,
        etherscan_api_key: impl Into<String>,
    ) -> Self {
        Self {
            etherscan_api_key: SecretString::from(etherscan_api_key.into()),
            ethplorer_api_key: SecretString::from(ETHPLORER_FREE_KEY.to_string()),
            network,
            node_url: node_url.into(),
            etherscan_url: ETHERSCAN_V2_URL.to_string(),
            ethplorer_url: ETHPLORER_URL.to_string(),
            request_timeout: ClientOptions::default().timeout,
        }
    }

    /// Configuration with an Infura node for `network`.
    pub fn infura(
        network: EthereumNetwork,
        infura_project_id: &str,
        etherscan_api_key: impl Into<String>,
        ethplorer_api_key: impl Into<String>,
    ) -> Self {
        Self {
            ethplorer_api_key: SecretString::from(ethplorer_api_key.into()),
            ..Self::new(
                network,
                network.infura_url(infura_project_id),
                etherscan_api_key,
            )
        }
    }
}

pub struct EthereumChain {
    provider: Arc<dyn Provider<Ethereum>>,
    etherscan: EtherscanClient,
    ethplorer: EthplorerClient,
    tokens: TokenRegistry,
    chain_id: u64,
}

impl EthereumChain {
    pub fn new(config: &EthereumConfig) -> Result<Self> {
        let options = ClientOptions {
            timeout: config.request_timeout,
            ..ClientOptions::default()
        };
        let chain_id = config.network.chain_id();

        let node_url: url::Url = config.node_url.parse().context(InvalidNodeUrlSnafu {
            url: config.node_url.clone(),
        })?;
        let provider = ProviderBuilder::new().connect_http(node_url);

        let etherscan = EtherscanClient::new(
            &config.etherscan_url,
            config.etherscan_api_key.expose_secret(),
            chain_id,
            options.clone(),
        )?;
        let ethplorer = EthplorerClient::new(
            &config.ethplorer_url,
            config.ethplorer_api_key.expose_secret(),
            options,
        )?;

        Ok(Self {
            provider: Arc::new(provider),
            etherscan,
            ethplorer,
            tokens: TokenRegistry::for_network(config.network),
            chain_id,
        })
    }

    /// Replace the token table used to resolve transfer currencies.
    pub fn with_tokens(mut self, tokens: TokenRegistry) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    /// Native balances from Etherscan, keyed by checksummed address.
    async fn native_balances(&self, addresses: &[String]) -> Result<BalanceMap> {
        let mut balances = BalanceMap::new();
        for account in self.etherscan.balance_multi(addresses).await? {
            let address = checksum(&account.account)?;
            let amount = parse_minor_units(&account.balance, CHAIN.native_decimals())?;
            balances
                .entry(address)
                .or_default()
                .insert(CHAIN.native_currency().to_string(), amount);
        }
        Ok(balances)
    }

    /// Token balances from Ethplorer. Addresses without tokens are absent.
    async fn token_balances(&self, addresses: &[String]) -> Result<BalanceMap> {
        let mut balances = BalanceMap::new();
        for address in addresses {
            let info = self.ethplorer.get_address_info(address).await?;
            let Some(holdings) = info.tokens else {
                continue;
            };

            let entry = balances.entry(checksum(&info.address)?).or_default();
            for holding in holdings {
                let Some(raw) = holding.raw_amount() else {
                    continue;
                };
                let amount = parse_minor_units(&raw, holding.token_info.decimals)?;
                entry.insert(holding.token_info.display_symbol().to_string(), amount);
            }
        }
        Ok(balances)
    }

    /// Fill destination, value and call data for `request`.
    fn transfer_payload(
        &self,
        from: Address,
        to: Address,
        request: &TransferRequest<'_>,
    ) -> Result<TransactionRequest> {
        let tx = TransactionRequest::default().with_from(from).with_to(to);

        if request.currency.eq_ignore_ascii_case(CHAIN.native_currency()) {
            let wei = to_minor_units(request.value, CHAIN.native_decimals())?;
            return Ok(tx.with_value(wei));
        }

        let token = self
            .tokens
            .get(request.currency)
            .context(UnknownCurrencySnafu {
                currency: request.currency,
            })?;
        let amount = to_minor_units(request.value, u32::from(token.decimals))?;
        let call = IERC20::transferCall { to, amount };

        Ok(tx
            .with_to(token.contract)
            .with_value(U256::ZERO)
            .with_input(call.abi_encode()))
    }
}

#[async_trait]
impl ChainOperations for EthereumChain {
    fn blockchain(&self) -> BlockchainType {
        BlockchainType::Ethereum
    }

    fn is_address(&self, address: &str) -> bool {
        self::is_address(address)
    }

    fn is_key_pair(&self, private_key: &str, address: &str) -> KeyPairCheck {
        self::is_key_pair(private_key, address)
    }

    async fn balance(&self, addresses: &[String]) -> Result<BalanceMap> {
        let addresses = addresses
            .iter()
            .map(|address| checksum(address))
            .collect::<Result<Vec<_>>>()?;

        let (mut balances, tokens) = tokio::try_join!(
            self.native_balances(&addresses),
            self.token_balances(&addresses)
        )?;
        merge_balances(&mut balances, tokens);

        debug!(accounts = balances.len(), "merged Ethereum balances");
        Ok(balances)
    }

    async fn get_transactions(
        &self,
        account: &str,
        sort: SortOrder,
        raw: bool,
    ) -> Result<TransactionHistory> {
        let (native, tokens) = tokio::try_join!(
            self.etherscan.transactions(account, sort),
            self.etherscan.token_transfers(account, sort)
        )?;

        if raw {
            return Ok(TransactionHistory::Raw {
                native,
                tokens: Some(tokens),
            });
        }

        Ok(TransactionHistory::Normalized {
            native: history::normalize_transactions(&parse_result(&native)?)?,
            tokens: history::normalize_token_transfers(&parse_result(&tokens)?)?,
        })
    }

    fn create_account(&self) -> Result<Actor> {
        let actor = EthereumActor::random();
        info!(address = %actor.address(), "Created new Ethereum account");
        Ok(Actor::Ethereum(actor))
    }

    async fn make_transaction(&self, request: TransferRequest<'_>) -> Result<String> {
        let sender = request.sender.as_ethereum()?;
        let receiver = request.receiver.as_ethereum()?;
        ensure!(
            sender.can_sign(),
            MissingPrivateKeySnafu {
                address: request.sender.address(),
            }
        );

        let tx = self.transfer_payload(sender.address(), receiver.address(), &request)?;

        let gas_limit = match request.gas {
            Some(gas) => gas,
            None => self
                .provider
                .estimate_gas(tx.clone())
                .await
                .context(RpcSnafu {
                    action: "estimate gas",
                })?,
        };
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .context(RpcSnafu {
                action: "get gas price",
            })?;
        let nonce = self
            .provider
            .get_transaction_count(sender.address())
            .await
            .context(RpcSnafu {
                action: "get nonce",
            })?;

        let tx = tx
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id);

        let signed = request
            .sender
            .sign_transaction(UnsignedTransaction::Ethereum(tx))
            .await?;
        let pending = self
            .provider
            .send_raw_transaction(&signed.to_bytes())
            .await
            .context(RpcSnafu {
                action: "send raw transaction",
            })?;
        let tx_hash = pending.tx_hash().to_string();

        info!(
            from = %sender.address(),
            to = %receiver.address(),
            value = %request.value,
            currency = request.currency,
            %tx_hash,
            "Broadcast Ethereum transaction"
        );
        Ok(tx_hash)
    }
}

/// Whether `address` is a hex Ethereum address with a valid checksum, if it
/// carries one. Needs no node or explorer.
pub fn is_address(address: &str) -> bool {
    actor::parse_address(address).is_ok()
}

/// Whether `private_key` controls `address`. Needs no node or explorer.
pub fn is_key_pair(private_key: &str, address: &str) -> KeyPairCheck {
    let check = actor::check_key_pair(private_key, address);
    if let KeyPairCheck::Unverifiable { reason } = &check {
        warn!(%reason, "could not verify Ethereum key pair");
    }
    check
}

fn checksum(address: &str) -> Result<String> {
    Ok(actor::parse_address(address)?.to_checksum(None))
}
