pub mod config;

use std::path::PathBuf;

use bitcoin::Network;
use clap::{Parser, Subcommand};
use oaiv_chains::bitcoin::{AddressType, BitcoinActor, BitcoinChain};
use oaiv_chains::ethereum::{self, EthereumChain};
use oaiv_chains::{Actor, ChainDispatcher, TransferRequest};
use oaiv_models::{BlockchainType, EthereumNetwork, SortOrder};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use snafu::prelude::*;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Settings, SettingsError};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Settings error: {}", source))]
    Settings { source: SettingsError },

    #[snafu(display("{}", source))]
    Chain { source: oaiv_chains::Error },

    #[snafu(display("Failed to encode output: {}", source))]
    Output { source: serde_json::Error },
}

impl From<SettingsError> for Error {
    fn from(source: SettingsError) -> Self {
        Error::Settings { source }
    }
}

impl From<oaiv_chains::Error> for Error {
    fn from(source: oaiv_chains::Error) -> Self {
        Error::Chain { source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Parser, Debug)]
#[command(name = "oaiv")]
#[command(about = "Wallet client for Ethereum and Bitcoin accounts")]
pub struct OaivArgs {
    /// TOML settings file
    #[arg(long, env = "OAIV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(flatten)]
    pub chains: ChainArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Chain settings; each overrides the matching settings-file value.
#[derive(clap::Args, Debug, Default)]
pub struct ChainArgs {
    /// Ethereum network (mainnet, sepolia, holesky)
    #[arg(long, env = "OAIV_ETHEREUM_NETWORK")]
    pub ethereum_network: Option<EthereumNetwork>,

    /// Ethereum JSON-RPC URL, takes precedence over the Infura project
    #[arg(long, env = "OAIV_ETHEREUM_NODE_URL")]
    pub ethereum_node_url: Option<String>,

    #[arg(long, env = "OAIV_INFURA_PROJECT_ID", hide_env_values = true)]
    pub infura_project_id: Option<String>,

    #[arg(long, env = "OAIV_ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    #[arg(long, env = "OAIV_ETHPLORER_API_KEY", hide_env_values = true)]
    pub ethplorer_api_key: Option<String>,

    #[arg(long, env = "OAIV_ETHERSCAN_URL")]
    pub etherscan_url: Option<String>,

    #[arg(long, env = "OAIV_ETHPLORER_URL")]
    pub ethplorer_url: Option<String>,

    /// Bitcoin network (bitcoin, testnet, signet, regtest)
    #[arg(long, env = "OAIV_BITCOIN_NETWORK")]
    pub bitcoin_network: Option<Network>,

    /// Esplora REST base URL
    #[arg(long, env = "OAIV_ESPLORA_URL")]
    pub esplora_url: Option<String>,

    /// Address type for new and signing Bitcoin accounts (p2pkh, p2sh-p2wpkh, p2wpkh)
    #[arg(long, env = "OAIV_BITCOIN_ADDRESS_TYPE")]
    pub bitcoin_address_type: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "OAIV_REQUEST_TIMEOUT")]
    pub request_timeout_secs: Option<u64>,

    /// JSON token table replacing the built-in one
    #[arg(long, env = "OAIV_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether a string is a valid address
    IsAddress {
        blockchain: BlockchainType,
        address: String,
    },
    /// Check whether a private key controls an address
    IsKeyPair {
        blockchain: BlockchainType,
        address: String,
        #[arg(long, env = "OAIV_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },
    /// Balances of one or more addresses
    Balance {
        blockchain: BlockchainType,
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Transaction history of an account
    History {
        blockchain: BlockchainType,
        account: String,
        #[arg(long, default_value = "desc")]
        sort: SortOrder,
        /// Print explorer responses untouched
        #[arg(long)]
        raw: bool,
    },
    /// Generate a new account
    CreateAccount { blockchain: BlockchainType },
    /// Sign and broadcast a transfer
    Send {
        blockchain: BlockchainType,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount in whole units of the currency
        #[arg(long)]
        value: Decimal,
        /// Currency symbol, the chain's native coin by default
        #[arg(long)]
        currency: Option<String>,
        /// Gas limit on Ethereum, absolute fee in satoshis on Bitcoin
        #[arg(long)]
        gas: Option<u64>,
        #[arg(long, env = "OAIV_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },
}

impl Command {
    fn blockchain(&self) -> BlockchainType {
        match self {
            Command::IsAddress { blockchain, .. }
            | Command::IsKeyPair { blockchain, .. }
            | Command::Balance { blockchain, .. }
            | Command::History { blockchain, .. }
            | Command::CreateAccount { blockchain }
            | Command::Send { blockchain, .. } => *blockchain,
        }
    }
}

#[derive(Serialize)]
struct CreatedAccount<'a> {
    blockchain: BlockchainType,
    address: String,
    private_key: Option<&'a str>,
}

/// Dispatcher with only the backend `blockchain` needs, so a Bitcoin command
/// does not require Ethereum credentials.
pub fn dispatcher_for(settings: &Settings, blockchain: BlockchainType) -> Result<ChainDispatcher> {
    let mut dispatcher = ChainDispatcher::new();
    match blockchain {
        BlockchainType::Ethereum => {
            let mut chain = EthereumChain::new(&settings.ethereum_config()?)?;
            if let Some(tokens) = settings.tokens()? {
                chain = chain.with_tokens(tokens);
            }
            dispatcher.register(Arc::new(chain));
        }
        BlockchainType::Bitcoin => {
            dispatcher.register(Arc::new(BitcoinChain::new(&settings.bitcoin_config()?)?));
        }
    }
    Ok(dispatcher)
}

/// Sender and receiver for a transfer. Bitcoin actors follow the configured
/// network and the sender signs with the configured address type.
fn transfer_actors(
    settings: &Settings,
    blockchain: BlockchainType,
    private_key: &str,
    to: &str,
) -> Result<(Actor, Actor)> {
    match blockchain {
        BlockchainType::Ethereum => Ok((
            Actor::from_private_key(blockchain, private_key)?,
            Actor::watch_only(blockchain, to)?,
        )),
        BlockchainType::Bitcoin => {
            let config = settings.bitcoin_config()?;
            let sender =
                BitcoinActor::new(Some(private_key), None, config.address_type, config.network)?;
            let receiver = BitcoinActor::new(None, Some(to), AddressType::default(), config.network)?;
            Ok((Actor::Bitcoin(sender), Actor::Bitcoin(receiver)))
        }
    }
}

pub fn render(output: &serde_json::Value) -> Result<String> {
    serde_json::to_string_pretty(output).context(OutputSnafu)
}

/// Ethereum address and key-pair checks, answered without node or explorer
/// credentials.
fn answer_offline(command: &Command) -> Result<Option<serde_json::Value>> {
    let output = match command {
        Command::IsAddress {
            blockchain: BlockchainType::Ethereum,
            address,
        } => json!({
            "address": address,
            "valid": ethereum::is_address(address),
        }),
        Command::IsKeyPair {
            blockchain: BlockchainType::Ethereum,
            address,
            private_key,
        } => serde_json::to_value(ethereum::is_key_pair(private_key, address))
            .context(OutputSnafu)?,
        _ => return Ok(None),
    };
    Ok(Some(output))
}

/// Execute `args.command` and return its JSON output.
pub async fn run(args: OaivArgs) -> Result<serde_json::Value> {
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply(&args.chains);

    if let Some(output) = answer_offline(&args.command)? {
        return Ok(output);
    }

    let blockchain = args.command.blockchain();
    let dispatcher = dispatcher_for(&settings, blockchain)?;
    debug!(%blockchain, "running command");

    let output = match args.command {
        Command::IsAddress { address, .. } => json!({
            "address": address,
            "valid": dispatcher.is_address(blockchain, &address)?,
        }),
        Command::IsKeyPair {
            address,
            private_key,
            ..
        } => {
            let check = dispatcher.is_key_pair(blockchain, &private_key, &address)?;
            serde_json::to_value(check).context(OutputSnafu)?
        }
        Command::Balance { addresses, .. } => {
            let balances = dispatcher.balance(blockchain, &addresses).await?;
            serde_json::to_value(balances).context(OutputSnafu)?
        }
        Command::History {
            account, sort, raw, ..
        } => {
            let history = dispatcher
                .get_transactions(blockchain, &account, sort, raw)
                .await?;
            serde_json::to_value(history).context(OutputSnafu)?
        }
        Command::CreateAccount { .. } => {
            let actor = dispatcher.create_account(blockchain)?;
            serde_json::to_value(CreatedAccount {
                blockchain,
                address: actor.address(),
                private_key: actor.private_key(),
            })
            .context(OutputSnafu)?
        }
        Command::Send {
            to,
            value,
            currency,
            gas,
            private_key,
            ..
        } => {
            let (sender, receiver) = transfer_actors(&settings, blockchain, &private_key, &to)?;
            let currency = currency.unwrap_or_else(|| blockchain.native_currency().to_string());
            let request = TransferRequest {
                sender: &sender,
                receiver: &receiver,
                value,
                currency: &currency,
                gas,
            };
            let txid = dispatcher.make_transaction(blockchain, request).await?;
            json!({ "txid": txid })
        }
    };

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> OaivArgs {
        OaivArgs::try_parse_from(std::iter::once("oaiv").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        let args = parse(&["--bitcoin-network", "testnet", "history", "btc", "tb1qxyz", "--sort", "asc", "--raw"]);
        assert_eq!(args.chains.bitcoin_network, Some(Network::Testnet));
        match args.command {
            Command::History {
                blockchain,
                sort,
                raw,
                ..
            } => {
                assert_eq!(blockchain, BlockchainType::Bitcoin);
                assert_eq!(sort, SortOrder::Asc);
                assert!(raw);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let args = parse(&[
            "send",
            "ethereum",
            "--to",
            "0x0000000000000000000000000000000000000001",
            "--value",
            "0.25",
            "--private-key",
            "0x01",
        ]);
        match args.command {
            Command::Send {
                value, currency, gas, ..
            } => {
                assert_eq!(value, Decimal::new(25, 2));
                assert_eq!(currency, None);
                assert_eq!(gas, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_arguments() {
        for args in [
            vec!["oaiv", "balance", "dogecoin", "addr"],
            vec!["oaiv", "balance", "ethereum"],
            vec!["oaiv", "history", "ethereum", "0x1", "--sort", "sideways"],
            vec!["oaiv", "--ethereum-network", "ropsten", "create-account", "ethereum"],
        ] {
            assert!(OaivArgs::try_parse_from(args).is_err());
        }
    }

    #[tokio::test]
    async fn test_bitcoin_commands_without_network() {
        let output = run(parse(&["is-address", "bitcoin", "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"]))
            .await
            .unwrap();
        assert_eq!(output["valid"], true);

        let output = run(parse(&[
            "--bitcoin-address-type",
            "p2wpkh",
            "create-account",
            "bitcoin",
        ]))
        .await
        .unwrap();
        assert!(output["address"].as_str().unwrap().starts_with("bc1q"));
        assert!(output["private_key"].is_string());

        let output = run(parse(&[
            "is-key-pair",
            "bitcoin",
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
            "--private-key",
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn",
        ]))
        .await
        .unwrap();
        assert_eq!(output, serde_json::to_value(oaiv_models::KeyPairCheck::Valid).unwrap());
    }

    #[tokio::test]
    async fn test_ethereum_requires_credentials() {
        let err = run(parse(&[
            "balance",
            "ethereum",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
        ]))
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Settings {
                source: SettingsError::Missing { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_ethereum_checks_need_no_credentials() {
        let output = run(parse(&[
            "is-address",
            "ethereum",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
        ]))
        .await
        .unwrap();
        assert_eq!(output["valid"], true);

        let output = run(parse(&["is-address", "eth", "0x1234"])).await.unwrap();
        assert_eq!(output["valid"], false);

        let output = run(parse(&[
            "is-key-pair",
            "ethereum",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "--private-key",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        ]))
        .await
        .unwrap();
        assert_eq!(output, serde_json::to_value(oaiv_models::KeyPairCheck::Valid).unwrap());
    }
}
