use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::chain::EthereumNetwork;
use crate::error::{ParseTokenTableSnafu, ReadTokenTableSnafu, Result};

/// An ERC-20 token known by its ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub contract: Address,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(symbol: impl Into<String>, contract: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            contract,
            decimals,
        }
    }
}

/// Mainnet ERC-20 tokens resolvable without a token file.
pub static MAINNET_TOKENS: LazyLock<Vec<TokenInfo>> = LazyLock::new(|| {
    vec![
        TokenInfo::new("USDT", address!("dAC17F958D2ee523a2206206994597C13D831ec7"), 6),
        TokenInfo::new("USDC", address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6),
        TokenInfo::new("DAI", address!("6B175474E89094C44Da98b954EedeAC495271d0F"), 18),
        TokenInfo::new("WBTC", address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"), 8),
        TokenInfo::new("WETH", address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 18),
        TokenInfo::new("LINK", address!("514910771AF9Ca656af840dff83E8264EcF986CA"), 18),
        TokenInfo::new("UNI", address!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984"), 18),
    ]
});

/// Symbol table of ERC-20 tokens, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, TokenInfo>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with [`MAINNET_TOKENS`].
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for token in MAINNET_TOKENS.iter() {
            registry.insert(token.clone());
        }
        registry
    }

    /// Built-in table for `network`. The built-in contracts only exist on
    /// mainnet, so other networks start empty and need a token file.
    pub fn for_network(network: EthereumNetwork) -> Self {
        match network {
            EthereumNetwork::Mainnet => Self::builtin(),
            _ => Self::new(),
        }
    }

    /// Load a registry from a JSON array of `{"symbol", "contract", "decimals"}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let tokens: Vec<TokenInfo> = serde_json::from_str(json).context(ParseTokenTableSnafu)?;
        let mut registry = Self::new();
        for token in tokens {
            registry.insert(token);
        }
        Ok(registry)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).context(ReadTokenTableSnafu {
            path: path.display().to_string(),
        })?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, token: TokenInfo) {
        self.tokens.insert(token.symbol.to_ascii_uppercase(), token);
    }

    pub fn get(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens.get(&symbol.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
