//! Esplora REST API (blockstream.info, mempool.space and self-hosted electrs).

use std::collections::HashMap;

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::error::{Error, InvalidUrlSnafu, ParseResponseSnafu, Result};
use crate::http::{ClientOptions, HttpClient, Verdict};

pub const BLOCKSTREAM_URL: &str = "https://blockstream.info/api/";
pub const BLOCKSTREAM_TESTNET_URL: &str = "https://blockstream.info/testnet/api/";

/// Confirmed transactions returned per history page.
pub const CONFIRMED_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: TxStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EsploraTransaction {
    pub txid: String,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    /// Satoshis
    #[serde(default)]
    pub fee: u64,
    pub status: TxStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vin {
    #[serde(default)]
    pub prevout: Option<Vout>,
    #[serde(default)]
    pub is_coinbase: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vout {
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

/// Parse raw transaction objects as returned by the address history calls.
pub fn parse_transactions(raw: &[Value]) -> Result<Vec<EsploraTransaction>> {
    raw.iter()
        .map(|tx| {
            serde_json::from_value(tx.clone()).context(ParseResponseSnafu {
                body: tx.to_string(),
            })
        })
        .collect()
}

pub struct EsploraClient {
    http: HttpClient,
    base_url: Url,
}

impl EsploraClient {
    pub fn new(base_url: impl AsRef<str>, options: ClientOptions) -> Result<Self> {
        let http = HttpClient::new(options)?;
        let mut base = base_url.as_ref().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context(InvalidUrlSnafu)?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context(InvalidUrlSnafu)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let value = self.http.get_json(&url, |_| Verdict::Accept).await?;
        serde_json::from_value(value.clone()).context(ParseResponseSnafu {
            body: value.to_string(),
        })
    }

    pub async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        self.get(&format!("address/{address}/utxo")).await
    }

    /// One history page. Without `last_seen` this is the mempool plus the
    /// newest confirmed page; with it, the confirmed page after that txid.
    pub async fn address_txs(&self, address: &str, last_seen: Option<&str>) -> Result<Vec<Value>> {
        match last_seen {
            None => self.get(&format!("address/{address}/txs")).await,
            Some(txid) => {
                self.get(&format!("address/{address}/txs/chain/{txid}"))
                    .await
            }
        }
    }

    /// Full history, newest first, as raw transaction objects. Stops after
    /// `max_pages` pages.
    pub async fn address_history(&self, address: &str, max_pages: usize) -> Result<Vec<Value>> {
        let mut history = Vec::new();
        let mut last_seen: Option<String> = None;

        for page in 0..max_pages.max(1) {
            let txs = self.address_txs(address, last_seen.as_deref()).await?;
            let confirmed: Vec<&Value> = txs
                .iter()
                .filter(|tx| tx["status"]["confirmed"].as_bool() == Some(true))
                .collect();
            let next = confirmed
                .last()
                .and_then(|tx| tx["txid"].as_str())
                .map(str::to_string);
            let full_page = confirmed.len() >= CONFIRMED_PAGE_SIZE;

            debug!(address, page, count = txs.len(), "fetched history page");
            history.extend(txs);

            match next {
                Some(txid) if full_page => last_seen = Some(txid),
                _ => break,
            }
        }

        Ok(history)
    }

    /// Confirmation target (in blocks) to fee rate in sat/vB.
    pub async fn fee_estimates(&self) -> Result<HashMap<String, f64>> {
        self.get("fee-estimates").await
    }

    /// Broadcast a hex-encoded transaction and return its txid.
    ///
    /// A resend after a lost answer is refused by the node as a duplicate;
    /// that refusal means the transaction is already on the network, so
    /// `txid` is returned for it.
    pub async fn broadcast(&self, tx_hex: &str, txid: &str) -> Result<String> {
        let url = self.endpoint("tx")?;
        match self.http.post_text(&url, tx_hex.to_string()).await {
            Ok(answer) => Ok(answer.trim().to_string()),
            Err(Error::Status { status: 400, body }) if is_already_known(&body) => {
                warn!(%txid, %body, "transaction already known to the explorer");
                Ok(txid.to_string())
            }
            Err(e) => Err(e),
        }
    }
}

/// Bitcoin Core rejection reasons for a transaction it already has.
const ALREADY_KNOWN: [&str; 4] = [
    "txn-already-in-mempool",
    "txn-already-known",
    "transaction already in block chain",
    "transaction outputs already in utxo set",
];

fn is_already_known(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    ALREADY_KNOWN.iter().any(|reason| body.contains(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_utils::serve;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn options() -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(10),
            max_retry_elapsed: Duration::from_millis(200),
        }
    }

    fn confirmed_tx(n: usize) -> Value {
        json!({
            "txid": format!("{n:064x}"),
            "vin": [],
            "vout": [{"scriptpubkey_address": "addr", "value": 1000}],
            "fee": 100,
            "status": {"confirmed": true, "block_height": 800_000 - n, "block_time": 1_700_000_000 - n as i64}
        })
    }

    #[tokio::test]
    async fn test_history_follows_pages() {
        let router = Router::new()
            .route(
                "/address/:address/txs",
                get(|| async {
                    let mut page = vec![json!({
                        "txid": "ff",
                        "vin": [],
                        "vout": [],
                        "status": {"confirmed": false}
                    })];
                    page.extend((0..25).map(confirmed_tx));
                    Json(page)
                }),
            )
            .route(
                "/address/:address/txs/chain/:last",
                get(|Path((_, last)): Path<(String, String)>| async move {
                    assert_eq!(last, format!("{:064x}", 24));
                    Json((25..30).map(confirmed_tx).collect::<Vec<_>>())
                }),
            );
        let base = serve(router).await;
        let client = EsploraClient::new(&base, options()).unwrap();

        let history = client.address_history("addr", 10).await.unwrap();
        assert_eq!(history.len(), 31);

        let parsed = parse_transactions(&history).unwrap();
        assert!(!parsed[0].status.confirmed);
        assert_eq!(parsed[1].status.block_time, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_history_respects_page_limit() {
        let router = Router::new().route(
            "/address/:address/txs",
            get(|| async { Json((0..25).map(confirmed_tx).collect::<Vec<_>>()) }),
        );
        let base = serve(router).await;
        let client = EsploraClient::new(&base, options()).unwrap();

        let history = client.address_history("addr", 1).await.unwrap();
        assert_eq!(history.len(), 25);
    }

    #[tokio::test]
    async fn test_utxos_and_fees() {
        let router = Router::new()
            .route(
                "/address/:address/utxo",
                get(|| async {
                    Json(json!([
                        {"txid": "aa", "vout": 0, "value": 5000, "status": {"confirmed": true}},
                        {"txid": "bb", "vout": 3, "value": 700, "status": {"confirmed": false}}
                    ]))
                }),
            )
            .route(
                "/fee-estimates",
                get(|| async { Json(json!({"1": 20.5, "6": 10.0})) }),
            );
        let base = serve(router).await;
        let client = EsploraClient::new(base.trim_end_matches('/'), options()).unwrap();

        let utxos = client.address_utxos("addr").await.unwrap();
        assert_eq!(utxos.iter().map(|u| u.value).sum::<u64>(), 5700);
        assert_eq!(utxos[1].vout, 3);

        let fees = client.fee_estimates().await.unwrap();
        assert_eq!(fees["6"], 10.0);
    }

    #[tokio::test]
    async fn test_broadcast() {
        let router = Router::new().route(
            "/tx",
            post(|body: String| async move {
                if body.starts_with("0200") {
                    (StatusCode::OK, "abcd\n".to_string())
                } else {
                    (StatusCode::BAD_REQUEST, "sendrawtransaction RPC error".to_string())
                }
            }),
        );
        let base = serve(router).await;
        let client = EsploraClient::new(&base, options()).unwrap();

        assert_eq!(client.broadcast("02000000", "abcd").await.unwrap(), "abcd");
        let err = client.broadcast("ff", "ffff").await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_broadcast_resend_after_timeout_is_success() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/tx",
            post(move |_body: String| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        // accepted, but the answer arrives after the client gave up
                        tokio::time::sleep(Duration::from_millis(600)).await;
                        (StatusCode::OK, "abcd".to_string())
                    } else {
                        (
                            StatusCode::BAD_REQUEST,
                            "sendrawtransaction RPC error: txn-already-in-mempool".to_string(),
                        )
                    }
                }
            }),
        );
        let base = serve(router).await;
        let client = EsploraClient::new(
            &base,
            ClientOptions {
                timeout: Duration::from_millis(300),
                initial_backoff: Duration::from_millis(10),
                max_retry_elapsed: Duration::from_secs(5),
            },
        )
        .unwrap();

        let txid = client.broadcast("02000000", "abcd").await.unwrap();

        assert_eq!(txid, "abcd");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
