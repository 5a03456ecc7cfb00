use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, InvalidBlockchainSnafu, InvalidNetworkSnafu, InvalidSortOrderSnafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockchainType {
    Bitcoin,
    Ethereum,
}

impl BlockchainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockchainType::Bitcoin => "bitcoin",
            BlockchainType::Ethereum => "ethereum",
        }
    }

    /// Symbol of the chain's native coin
    pub fn native_currency(&self) -> &'static str {
        match self {
            BlockchainType::Bitcoin => "BTC",
            BlockchainType::Ethereum => "ETH",
        }
    }

    /// Number of decimal places between the native coin and its minor unit
    pub fn native_decimals(&self) -> u32 {
        match self {
            BlockchainType::Bitcoin => 8,
            BlockchainType::Ethereum => 18,
        }
    }
}

impl fmt::Display for BlockchainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockchainType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(BlockchainType::Bitcoin),
            "ethereum" | "eth" => Ok(BlockchainType::Ethereum),
            _ => InvalidBlockchainSnafu { value: s }.fail(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EthereumNetwork {
    Mainnet,
    Sepolia,
    Holesky,
}

impl EthereumNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            EthereumNetwork::Mainnet => "mainnet",
            EthereumNetwork::Sepolia => "sepolia",
            EthereumNetwork::Holesky => "holesky",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            EthereumNetwork::Mainnet => 1,
            EthereumNetwork::Sepolia => 11_155_111,
            EthereumNetwork::Holesky => 17_000,
        }
    }

    /// HTTPS JSON-RPC endpoint of the Infura project for this network
    pub fn infura_url(&self, project_id: &str) -> String {
        format!("https://{}.infura.io/v3/{}", self.as_str(), project_id)
    }
}

impl fmt::Display for EthereumNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EthereumNetwork {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(EthereumNetwork::Mainnet),
            "sepolia" => Ok(EthereumNetwork::Sepolia),
            "holesky" => Ok(EthereumNetwork::Holesky),
            _ => InvalidNetworkSnafu { value: s }.fail(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => InvalidSortOrderSnafu { value: s }.fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blockchain_type_parsing() {
        assert_eq!("Ethereum".parse::<BlockchainType>().unwrap(), BlockchainType::Ethereum);
        assert_eq!("btc".parse::<BlockchainType>().unwrap(), BlockchainType::Bitcoin);

        let err = "solana".parse::<BlockchainType>().unwrap_err();
        assert!(matches!(err, Error::InvalidBlockchain { .. }));
    }

    #[test]
    fn test_blockchain_type_serde_is_lowercase() {
        let json = serde_json::to_string(&BlockchainType::Bitcoin).unwrap();
        assert_eq!(json, "\"bitcoin\"");
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        assert_eq!(
            "sepolia".parse::<EthereumNetwork>().unwrap(),
            EthereumNetwork::Sepolia
        );
        assert!(matches!(
            "ropsten".parse::<EthereumNetwork>(),
            Err(Error::InvalidNetwork { .. })
        ));
    }

    #[test]
    fn test_infura_url() {
        assert_eq!(
            EthereumNetwork::Mainnet.infura_url("abc123"),
            "https://mainnet.infura.io/v3/abc123"
        );
    }
}
