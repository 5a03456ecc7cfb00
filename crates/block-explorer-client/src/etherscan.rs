//! Etherscan (v2 multichain API) account endpoints.

use oaiv_models::SortOrder;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use snafu::ResultExt;

use crate::error::{InvalidUrlSnafu, ParseResponseSnafu, Result};
use crate::http::{ClientOptions, HttpClient, Verdict};

pub const ETHERSCAN_V2_URL: &str = "https://api.etherscan.io/v2/api";

/// `balancemulti` accepts at most this many addresses per call.
pub const BALANCE_MULTI_LIMIT: usize = 20;

const LAST_BLOCK: &str = "99999999";

#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    /// Wei, base-10
    pub balance: String,
}

/// Entry of a `txlist` answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTransaction {
    pub hash: String,
    pub time_stamp: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub value: String,
    pub gas_price: String,
    pub gas_used: String,
}

/// Entry of a `tokentx` answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub hash: String,
    pub time_stamp: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub value: String,
    pub gas_price: String,
    pub gas_used: String,
    pub contract_address: String,
    pub token_symbol: String,
    pub token_decimal: String,
}

/// Extract the `result` array of an Etherscan answer as typed entries.
pub fn parse_result<T: serde::de::DeserializeOwned>(response: &Value) -> Result<Vec<T>> {
    let result = response.get("result").cloned().unwrap_or(Value::Null);
    if result.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(result).context(ParseResponseSnafu {
        body: response.to_string(),
    })
}

pub struct EtherscanClient {
    http: HttpClient,
    base_url: Url,
    api_key: SecretString,
    chain_id: u64,
}

impl EtherscanClient {
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        chain_id: u64,
        options: ClientOptions,
    ) -> Result<Self> {
        let http = HttpClient::new(options)?;
        let base_url = Url::parse(base_url.as_ref()).context(InvalidUrlSnafu)?;

        Ok(Self {
            http,
            base_url,
            api_key: SecretString::from(api_key.into()),
            chain_id,
        })
    }

    /// Issue an `account` module request and return the whole answer
    /// (`status`, `message`, `result`) untouched.
    pub async fn request(&self, params: &[(&str, &str)]) -> Result<Value> {
        let mut url = self.base_url.clone();
        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs.append_pair("chainid", &self.chain_id.to_string());
            for (key, value) in params {
                query_pairs.append_pair(key, value);
            }
            query_pairs.append_pair("apikey", self.api_key.expose_secret());
        }

        self.http.get_json(&url, etherscan_verdict).await
    }

    /// Native balances of `addresses`, batched by [`BALANCE_MULTI_LIMIT`].
    pub async fn balance_multi(&self, addresses: &[String]) -> Result<Vec<AccountBalance>> {
        let mut balances = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(BALANCE_MULTI_LIMIT) {
            let joined = chunk.join(",");
            let response = self
                .request(&[
                    ("module", "account"),
                    ("action", "balancemulti"),
                    ("address", joined.as_str()),
                    ("tag", "latest"),
                ])
                .await?;
            balances.extend(parse_result::<AccountBalance>(&response)?);
        }
        Ok(balances)
    }

    /// Raw `txlist` answer for `address`.
    pub async fn transactions(&self, address: &str, sort: SortOrder) -> Result<Value> {
        self.account_list("txlist", address, sort).await
    }

    /// Raw `tokentx` answer (ERC-20 transfers) for `address`.
    pub async fn token_transfers(&self, address: &str, sort: SortOrder) -> Result<Value> {
        self.account_list("tokentx", address, sort).await
    }

    async fn account_list(&self, action: &str, address: &str, sort: SortOrder) -> Result<Value> {
        self.request(&[
            ("module", "account"),
            ("action", action),
            ("address", address),
            ("startblock", "0"),
            ("endblock", LAST_BLOCK),
            ("sort", sort.as_str()),
        ])
        .await
    }
}

fn etherscan_verdict(response: &Value) -> Verdict {
    if response.get("status").and_then(Value::as_str) == Some("1") {
        return Verdict::Accept;
    }

    let message = response
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let result = response.get("result");

    // Empty lists come back with status "0"
    if message.starts_with("No transactions found") || message.starts_with("No records found") {
        return Verdict::Accept;
    }

    let detail = result
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| message.to_string());
    if detail.to_ascii_lowercase().contains("rate limit") {
        Verdict::Retry(detail)
    } else {
        Verdict::Reject(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_utils::serve;
    use crate::Error;
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn options() -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(10),
            max_retry_elapsed: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = EtherscanClient::new(ETHERSCAN_V2_URL, "key", 1, ClientOptions::default());
        assert!(client.is_ok());
        assert!(EtherscanClient::new("not a url", "key", 1, ClientOptions::default()).is_err());
    }

    #[tokio::test]
    async fn test_balance_multi_is_batched() {
        let calls = Arc::new(Mutex::new(Vec::<HashMap<String, String>>::new()));
        let recorded = calls.clone();
        let router = Router::new().route(
            "/api",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let recorded = recorded.clone();
                async move {
                    let result: Vec<Value> = params["address"]
                        .split(',')
                        .map(|account| json!({"account": account, "balance": "1000000000000000000"}))
                        .collect();
                    recorded.lock().unwrap().push(params);
                    Json(json!({"status": "1", "message": "OK", "result": result}))
                }
            }),
        );
        let base = serve(router).await;
        let client =
            EtherscanClient::new(format!("{base}api"), "secret", 11_155_111, options()).unwrap();

        let addresses: Vec<String> = (0..25).map(|i| format!("0x{i:040x}")).collect();
        let balances = client.balance_multi(&addresses).await.unwrap();

        assert_eq!(balances.len(), 25);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["action"], "balancemulti");
        assert_eq!(calls[0]["chainid"], "11155111");
        assert_eq!(calls[0]["apikey"], "secret");
        assert_eq!(calls[1]["address"].split(',').count(), 5);
    }

    #[tokio::test]
    async fn test_empty_history_is_not_an_error() {
        let router = Router::new().route(
            "/api",
            get(|| async {
                Json(json!({"status": "0", "message": "No transactions found", "result": []}))
            }),
        );
        let base = serve(router).await;
        let client = EtherscanClient::new(format!("{base}api"), "k", 1, options()).unwrap();

        let response = client.transactions("0xabc", SortOrder::Asc).await.unwrap();
        assert!(parse_result::<NormalTransaction>(&response).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notok_carries_raw_response() {
        let router = Router::new().route(
            "/api",
            get(|| async {
                Json(json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"}))
            }),
        );
        let base = serve(router).await;
        let client = EtherscanClient::new(format!("{base}api"), "k", 1, options()).unwrap();

        let err = client
            .token_transfers("0xabc", SortOrder::Desc)
            .await
            .unwrap_err();
        match &err {
            Error::Api { message, raw } => {
                assert_eq!(message, "Invalid API Key");
                assert!(raw.contains("NOTOK"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_token_transfer() {
        let response = json!({
            "status": "1",
            "message": "OK",
            "result": [{
                "hash": "0x01",
                "timeStamp": "1700000000",
                "from": "0xaaa",
                "to": "0xbbb",
                "value": "2500000",
                "gasPrice": "20000000000",
                "gasUsed": "50000",
                "contractAddress": "0xdac17f958d2ee523a2206206994597c13d831ec7",
                "tokenSymbol": "USDT",
                "tokenDecimal": "6",
                "blockNumber": "1"
            }]
        });

        let transfers = parse_result::<TokenTransfer>(&response).unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].token_decimal, "6");
        assert_eq!(transfers[0].time_stamp, "1700000000");
    }
}
