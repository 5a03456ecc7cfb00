use std::path::{Path, PathBuf};
use std::time::Duration;

use bitcoin::Network;
use config::{Config, File, FileFormat};
use oaiv_chains::bitcoin::{AddressType, BitcoinConfig};
use oaiv_chains::ethereum::EthereumConfig;
use oaiv_models::{EthereumNetwork, TokenRegistry};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use snafu::prelude::*;

use crate::ChainArgs;

#[derive(Debug, Snafu)]
pub enum SettingsError {
    #[snafu(display("Failed to load config: {}", source))]
    Load { source: config::ConfigError },

    #[snafu(display("Missing setting `{name}` (set it in the config file, the environment, or on the command line)"))]
    Missing { name: &'static str },

    #[snafu(display("Invalid value {value:?} for `{name}`: {reason}"))]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[snafu(display("Failed to load token table: {}", source))]
    Tokens { source: oaiv_models::Error },
}

type Result<T, E = SettingsError> = std::result::Result<T, E>;

/// Contents of the optional TOML settings file. Every value can also come
/// from the environment or a flag, which take precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ethereum: EthereumSettings,
    pub bitcoin: BitcoinSettings,
    /// Per-request timeout for explorer and node calls, in seconds
    pub request_timeout_secs: Option<u64>,
    /// JSON token table replacing the built-in one
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EthereumSettings {
    pub network: Option<EthereumNetwork>,
    pub node_url: Option<String>,
    pub infura_project_id: Option<SecretString>,
    pub etherscan_api_key: Option<SecretString>,
    pub ethplorer_api_key: Option<SecretString>,
    pub etherscan_url: Option<String>,
    pub ethplorer_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BitcoinSettings {
    pub network: Option<Network>,
    pub explorer_url: Option<String>,
    pub address_type: Option<String>,
    pub max_history_pages: Option<usize>,
    pub fee_target_blocks: Option<u16>,
}

impl Settings {
    /// Read `path` if given, otherwise start from empty settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()
            .context(LoadSnafu)?;

        settings.try_deserialize().context(LoadSnafu)
    }

    /// Overlay values given on the command line or through the environment.
    pub fn apply(&mut self, args: &ChainArgs) {
        fn overlay<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }
        fn overlay_secret(target: &mut Option<SecretString>, value: &Option<String>) {
            if let Some(value) = value {
                *target = Some(SecretString::from(value.clone()));
            }
        }

        let eth = &mut self.ethereum;
        overlay(&mut eth.network, &args.ethereum_network);
        overlay(&mut eth.node_url, &args.ethereum_node_url);
        overlay(&mut eth.etherscan_url, &args.etherscan_url);
        overlay(&mut eth.ethplorer_url, &args.ethplorer_url);
        overlay_secret(&mut eth.infura_project_id, &args.infura_project_id);
        overlay_secret(&mut eth.etherscan_api_key, &args.etherscan_api_key);
        overlay_secret(&mut eth.ethplorer_api_key, &args.ethplorer_api_key);

        let btc = &mut self.bitcoin;
        overlay(&mut btc.network, &args.bitcoin_network);
        overlay(&mut btc.explorer_url, &args.esplora_url);
        overlay(&mut btc.address_type, &args.bitcoin_address_type);

        overlay(&mut self.request_timeout_secs, &args.request_timeout_secs);
        overlay(&mut self.token_file, &args.token_file);
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn ethereum_config(&self) -> Result<EthereumConfig> {
        let eth = &self.ethereum;
        let network = eth.network.unwrap_or(EthereumNetwork::Mainnet);
        let etherscan_api_key = eth
            .etherscan_api_key
            .as_ref()
            .context(MissingSnafu {
                name: "etherscan_api_key",
            })?
            .expose_secret()
            .to_string();

        let mut config = match (&eth.node_url, &eth.infura_project_id) {
            (Some(node_url), _) => EthereumConfig::new(network, node_url.clone(), etherscan_api_key),
            (None, Some(project_id)) => EthereumConfig::new(
                network,
                network.infura_url(project_id.expose_secret()),
                etherscan_api_key,
            ),
            (None, None) => return MissingSnafu { name: "node_url" }.fail(),
        };

        if let Some(key) = &eth.ethplorer_api_key {
            config.ethplorer_api_key = key.clone();
        }
        if let Some(url) = &eth.etherscan_url {
            config.etherscan_url = url.clone();
        }
        if let Some(url) = &eth.ethplorer_url {
            config.ethplorer_url = url.clone();
        }
        if let Some(timeout) = self.request_timeout() {
            config.request_timeout = timeout;
        }
        Ok(config)
    }

    pub fn bitcoin_config(&self) -> Result<BitcoinConfig> {
        let btc = &self.bitcoin;
        let mut config = BitcoinConfig::for_network(btc.network.unwrap_or(Network::Bitcoin));

        if let Some(url) = &btc.explorer_url {
            config.explorer_url = url.clone();
        }
        if let Some(address_type) = &btc.address_type {
            config.address_type = parse_address_type(address_type)?;
        }
        if let Some(pages) = btc.max_history_pages {
            config.max_history_pages = pages;
        }
        if let Some(blocks) = btc.fee_target_blocks {
            config.fee_target_blocks = blocks;
        }
        if let Some(timeout) = self.request_timeout() {
            config.request_timeout = timeout;
        }
        Ok(config)
    }

    /// Token table from `token_file`, if one is configured.
    pub fn tokens(&self) -> Result<Option<TokenRegistry>> {
        self.token_file
            .as_ref()
            .map(TokenRegistry::from_json_file)
            .transpose()
            .context(TokensSnafu)
    }
}

pub fn parse_address_type(value: &str) -> Result<AddressType> {
    value.parse().map_err(|reason| {
        InvalidSnafu {
            name: "address_type",
            value,
            reason,
        }
        .build()
    })
}
