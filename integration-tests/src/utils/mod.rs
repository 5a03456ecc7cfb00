//! Local stand-ins for Etherscan, Ethplorer, Esplora and an Ethereum node.

mod fixtures;

pub use fixtures::*;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::keccak256;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ctor::ctor;
use oaiv_chains::bitcoin::BitcoinConfig;
use oaiv_chains::ethereum::EthereumConfig;
use oaiv_models::EthereumNetwork;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

pub const INTEGRATION_TEST_TIMEOUT_SECS: u64 = 10;

/// Everything the mocks received that tests may want to inspect.
#[derive(Default)]
pub struct Recorded {
    /// Hex transactions posted to Esplora's `/tx`
    pub bitcoin_broadcasts: Vec<String>,
    /// Raw transactions passed to `eth_sendRawTransaction`
    pub ethereum_broadcasts: Vec<String>,
    /// Every JSON-RPC method called on the node, in order
    pub rpc_methods: Vec<String>,
    /// `action` parameter of every Etherscan call
    pub etherscan_actions: Vec<String>,
}

#[derive(Clone, Default)]
struct MockState {
    recorded: Arc<Mutex<Recorded>>,
}

pub struct MockExplorers {
    pub base_url: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockExplorers {
    pub async fn start() -> Self {
        let state = MockState::default();
        let recorded = state.recorded.clone();

        let router = Router::new()
            .route("/etherscan", get(etherscan))
            .route("/ethplorer/getAddressInfo/:address", get(ethplorer_address_info))
            .route("/esplora/address/:address/utxo", get(esplora_utxos))
            .route("/esplora/address/:address/txs", get(esplora_txs))
            .route("/esplora/address/:address/txs/chain/:last", get(esplora_txs_chain))
            .route("/esplora/fee-estimates", get(esplora_fee_estimates))
            .route("/esplora/tx", post(esplora_broadcast))
            .route("/rpc", post(json_rpc))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should be able to bind to port");
        let addr = listener.local_addr().expect("Should have a local address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("mock explorers crashed");
        });

        Self {
            base_url: format!("http://{addr}"),
            recorded,
        }
    }

    pub fn ethereum_config(&self) -> EthereumConfig {
        let mut config = EthereumConfig::new(
            EthereumNetwork::Mainnet,
            format!("{}/rpc", self.base_url),
            TEST_ETHERSCAN_KEY,
        );
        config.etherscan_url = format!("{}/etherscan", self.base_url);
        config.ethplorer_url = format!("{}/ethplorer", self.base_url);
        config.request_timeout = Duration::from_secs(INTEGRATION_TEST_TIMEOUT_SECS);
        config
    }

    pub fn bitcoin_config(&self) -> BitcoinConfig {
        BitcoinConfig {
            explorer_url: format!("{}/esplora", self.base_url),
            request_timeout: Duration::from_secs(INTEGRATION_TEST_TIMEOUT_SECS),
            ..BitcoinConfig::default()
        }
    }

    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

async fn etherscan(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let action = params.get("action").cloned().unwrap_or_default();
    state
        .recorded
        .lock()
        .unwrap()
        .etherscan_actions
        .push(action.clone());

    if params.get("apikey").map(String::as_str) != Some(TEST_ETHERSCAN_KEY) {
        return Json(json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"}));
    }

    let address = params.get("address").cloned().unwrap_or_default();
    let response = match action.as_str() {
        "balancemulti" => {
            let result: Vec<Value> = address
                .split(',')
                .map(|account| {
                    json!({
                        "account": account.to_lowercase(),
                        "balance": eth_balance_wei(account),
                    })
                })
                .collect();
            json!({"status": "1", "message": "OK", "result": result})
        }
        "txlist" if address.eq_ignore_ascii_case(ETH_ACCOUNT) => {
            json!({"status": "1", "message": "OK", "result": eth_txlist()})
        }
        "tokentx" if address.eq_ignore_ascii_case(ETH_ACCOUNT) => {
            json!({"status": "1", "message": "OK", "result": eth_tokentx()})
        }
        "txlist" | "tokentx" => {
            json!({"status": "0", "message": "No transactions found", "result": []})
        }
        _ => json!({"status": "0", "message": "NOTOK", "result": "Error! Unknown action"}),
    };
    Json(response)
}

async fn ethplorer_address_info(Path(address): Path<String>) -> Json<Value> {
    Json(ethplorer_info(&address))
}

async fn esplora_utxos(Path(address): Path<String>) -> Json<Value> {
    Json(btc_utxos(&address))
}

async fn esplora_txs(Path(address): Path<String>) -> Json<Value> {
    Json(btc_history_page(&address, None))
}

async fn esplora_txs_chain(Path((address, last)): Path<(String, String)>) -> Json<Value> {
    Json(btc_history_page(&address, Some(&last)))
}

async fn esplora_fee_estimates() -> Json<Value> {
    Json(json!({"1": 20.0, "3": 12.5, "6": BTC_FEE_RATE, "144": 1.0}))
}

async fn esplora_broadcast(
    State(state): State<MockState>,
    body: String,
) -> (StatusCode, String) {
    let tx: bitcoin::Transaction = match bitcoin::consensus::encode::deserialize_hex(&body) {
        Ok(tx) => tx,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("sendrawtransaction RPC error: {e}"),
            )
        }
    };
    state
        .recorded
        .lock()
        .unwrap()
        .bitcoin_broadcasts
        .push(body);
    (StatusCode::OK, tx.compute_txid().to_string())
}

async fn json_rpc(State(state): State<MockState>, Json(request): Json<Value>) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let mut recorded = state.recorded.lock().unwrap();
    recorded.rpc_methods.push(method.clone());

    let result = match method.as_str() {
        "eth_chainId" => json!("0x1"),
        "eth_estimateGas" => json!(format!("{ETH_ESTIMATED_GAS:#x}")),
        "eth_gasPrice" => json!(format!("{ETH_GAS_PRICE:#x}")),
        "eth_getTransactionCount" => json!(format!("{ETH_NONCE:#x}")),
        "eth_sendRawTransaction" => {
            let raw = request["params"][0].as_str().unwrap_or_default().to_string();
            let bytes = alloy::hex::decode(&raw).unwrap_or_default();
            recorded.ethereum_broadcasts.push(raw);
            json!(keccak256(bytes).to_string())
        }
        _ => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32601, "message": format!("method {method} not found")},
            }))
        }
    };

    Json(json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
}

#[ctor]
fn init_test_tracing() {
    let has_nocapture = std::env::args().any(|arg| arg == "--nocapture" || arg == "--show-output");
    if has_nocapture {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .try_init()
            .ok();
    }
}
