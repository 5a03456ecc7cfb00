//! Ethplorer address endpoints, used for ERC-20 holdings.

use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use snafu::ResultExt;

use crate::error::{Error, InvalidUrlSnafu, ParseResponseSnafu, Result, UnknownMethodSnafu};
use crate::http::{ClientOptions, HttpClient, Verdict};

pub const ETHPLORER_URL: &str = "https://api.ethplorer.io/";

/// Public key with low rate limits, accepted by Ethplorer without sign-up.
pub const ETHPLORER_FREE_KEY: &str = "freekey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EthplorerMethod {
    GetAddressInfo,
}

impl EthplorerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EthplorerMethod::GetAddressInfo => "getAddressInfo",
        }
    }
}

impl fmt::Display for EthplorerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EthplorerMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "getAddressInfo" => Ok(EthplorerMethod::GetAddressInfo),
            _ => UnknownMethodSnafu { method: s }.fail(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    #[serde(default)]
    pub tokens: Option<Vec<TokenHolding>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub token_info: TokenDetails,
    #[serde(default)]
    pub balance: Option<Value>,
    #[serde(default)]
    pub raw_balance: Option<String>,
}

impl TokenHolding {
    /// Holding in token base units, as a base-10 integer string.
    ///
    /// `rawBalance` is exact; the numeric `balance` may be a float in
    /// exponent notation for large holdings and is only a fallback.
    pub fn raw_amount(&self) -> Option<String> {
        if let Some(raw) = &self.raw_balance {
            return Some(raw.clone());
        }
        match self.balance.as_ref()? {
            Value::Number(number) => match number.as_u64() {
                Some(integer) => Some(integer.to_string()),
                None => number.as_f64().map(|float| format!("{float:.0}")),
            },
            Value::String(text) => Some(text.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenDetails {
    pub address: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub decimals: u32,
}

impl TokenDetails {
    /// Display symbol, falling back to the contract address for tokens that
    /// do not publish one.
    pub fn display_symbol(&self) -> &str {
        match self.symbol.as_deref() {
            Some(symbol) if !symbol.is_empty() => symbol,
            _ => &self.address,
        }
    }
}

/// Ethplorer sends `decimals` as a string for some tokens and a number for others.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(u32),
        Text(String),
    }

    match Lenient::deserialize(deserializer)? {
        Lenient::Number(value) => Ok(value),
        Lenient::Text(text) if text.is_empty() => Ok(0),
        Lenient::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

pub struct EthplorerClient {
    http: HttpClient,
    base_url: Url,
    api_key: SecretString,
}

impl EthplorerClient {
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self> {
        let http = HttpClient::new(options)?;
        let mut base = base_url.as_ref().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context(InvalidUrlSnafu)?;

        Ok(Self {
            http,
            base_url,
            api_key: SecretString::from(api_key.into()),
        })
    }

    /// Call `method` for `address` and return the untouched answer.
    pub async fn request(&self, method: EthplorerMethod, address: &str) -> Result<Value> {
        let mut url = self
            .base_url
            .join(&format!("{method}/{address}"))
            .context(InvalidUrlSnafu)?;
        url.query_pairs_mut()
            .append_pair("apiKey", self.api_key.expose_secret());

        self.http.get_json(&url, ethplorer_verdict).await
    }

    pub async fn get_address_info(&self, address: &str) -> Result<AddressInfo> {
        let response = self
            .request(EthplorerMethod::GetAddressInfo, address)
            .await?;
        serde_json::from_value(response.clone()).context(ParseResponseSnafu {
            body: response.to_string(),
        })
    }
}

fn ethplorer_verdict(response: &Value) -> Verdict {
    let Some(error) = response.get("error") else {
        return Verdict::Accept;
    };

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    // 429 is reported in the body as well as in the status line
    if error.get("code").and_then(Value::as_u64) == Some(429) {
        Verdict::Retry(message)
    } else {
        Verdict::Reject(message)
    }
}
