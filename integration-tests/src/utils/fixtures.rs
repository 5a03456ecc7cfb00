//! Canned explorer answers.

use serde_json::{json, Value};

pub const TEST_ETHERSCAN_KEY: &str = "test-etherscan-key";

// Anvil's first two dev accounts
pub const ETH_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ETH_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const ETH_OTHER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub const USDT_CONTRACT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
/// Token without a published symbol
pub const UNNAMED_TOKEN: &str = "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984";

pub const ETH_ESTIMATED_GAS: u64 = 60_000;
pub const ETH_GAS_PRICE: u64 = 20_000_000_000;
pub const ETH_NONCE: u64 = 7;

/// Private key 1, P2PKH on mainnet
pub const BTC_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
pub const BTC_ACCOUNT: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
pub const BTC_RECIPIENT: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
/// Account whose history spans two pages
pub const BTC_BUSY_ACCOUNT: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

pub const BTC_FEE_RATE: f64 = 5.0;
pub const BTC_LARGE_UTXO: u64 = 150_000;
pub const BTC_SMALL_UTXO: u64 = 30_000;

pub fn txid(n: u32) -> String {
    format!("{n:064x}")
}

pub fn eth_balance_wei(account: &str) -> &'static str {
    if account.eq_ignore_ascii_case(ETH_ACCOUNT) {
        "1500000000000000000"
    } else {
        "0"
    }
}

pub fn ethplorer_info(address: &str) -> Value {
    if !address.eq_ignore_ascii_case(ETH_ACCOUNT) {
        return json!({
            "address": address.to_lowercase(),
            "ETH": {"balance": 0, "rawBalance": "0"},
            "countTxs": 0
        });
    }

    json!({
        "address": address.to_lowercase(),
        "ETH": {"balance": 1.5, "rawBalance": "1500000000000000000"},
        "countTxs": 3,
        "tokens": [
            {
                "tokenInfo": {
                    "address": USDT_CONTRACT.to_lowercase(),
                    "name": "Tether USD",
                    "symbol": "USDT",
                    "decimals": "6"
                },
                "balance": 2500000,
                "rawBalance": "2500000"
            },
            {
                "tokenInfo": {
                    "address": UNNAMED_TOKEN.to_lowercase(),
                    "decimals": 18
                },
                "balance": 1000000000000000000u64
            }
        ]
    })
}

pub fn eth_txlist() -> Value {
    json!([
        {
            "blockNumber": "19000000",
            "timeStamp": "1700000000",
            "hash": "0x8c1e4bd4a5d5a6c1e7e6f7e7e1b8b0c5d63a1d2a3f4e5f6a7b8c9d0e1f2a3b4c",
            "from": ETH_ACCOUNT.to_lowercase(),
            "to": ETH_OTHER.to_lowercase(),
            "value": "100000000000000000",
            "gas": "21000",
            "gasPrice": "20000000000",
            "gasUsed": "21000",
            "isError": "0"
        },
        {
            "blockNumber": "18999000",
            "timeStamp": "1699990000",
            "hash": "0x1d2a3f4e5f6a7b8c9d0e1f2a3b4c8c1e4bd4a5d5a6c1e7e6f7e7e1b8b0c5d63a",
            "from": ETH_ACCOUNT.to_lowercase(),
            "to": "",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "value": "0",
            "gas": "500000",
            "gasPrice": "10000000000",
            "gasUsed": "300000",
            "isError": "0"
        }
    ])
}

pub fn eth_tokentx() -> Value {
    json!([
        {
            "blockNumber": "19000100",
            "timeStamp": "1700001200",
            "hash": "0x3b4c8c1e4bd4a5d5a6c1e7e6f7e7e1b8b0c5d63a1d2a3f4e5f6a7b8c9d0e1f2a",
            "from": ETH_OTHER.to_lowercase(),
            "to": ETH_ACCOUNT.to_lowercase(),
            "value": "2500000",
            "contractAddress": USDT_CONTRACT.to_lowercase(),
            "tokenName": "Tether USD",
            "tokenSymbol": "USDT",
            "tokenDecimal": "6",
            "gas": "65000",
            "gasPrice": "30000000000",
            "gasUsed": "50000"
        }
    ])
}

pub fn btc_utxos(address: &str) -> Value {
    if address != BTC_ACCOUNT {
        return json!([]);
    }
    json!([
        {
            "txid": txid(0x51),
            "vout": 1,
            "value": BTC_SMALL_UTXO,
            "status": {"confirmed": false}
        },
        {
            "txid": txid(0x52),
            "vout": 0,
            "value": BTC_LARGE_UTXO,
            "status": {"confirmed": true, "block_height": 820000, "block_time": 1700000000}
        }
    ])
}

fn esplora_tx(
    id: u32,
    inputs: &[(&str, u64)],
    outputs: &[(Option<&str>, u64)],
    fee: u64,
    block_time: Option<i64>,
) -> Value {
    let vin: Vec<Value> = if inputs.is_empty() {
        vec![json!({"txid": txid(0), "vout": 4294967295u32, "prevout": null, "is_coinbase": true})]
    } else {
        inputs
            .iter()
            .map(|(address, value)| {
                json!({
                    "txid": txid(id + 1000),
                    "vout": 0,
                    "prevout": {"scriptpubkey_address": address, "value": value},
                    "is_coinbase": false
                })
            })
            .collect()
    };
    let vout: Vec<Value> = outputs
        .iter()
        .map(|(address, value)| match address {
            Some(address) => json!({"scriptpubkey_address": address, "value": value}),
            None => json!({"scriptpubkey_type": "op_return", "value": value}),
        })
        .collect();
    let status = match block_time {
        Some(time) => json!({"confirmed": true, "block_height": 800000, "block_time": time}),
        None => json!({"confirmed": false}),
    };

    json!({"txid": txid(id), "vin": vin, "vout": vout, "fee": fee, "status": status})
}

/// Pending spend with change, a coinbase with an OP_RETURN output, and a
/// payment funded by two addresses.
pub const BTC_PENDING_TX: u32 = 0xa1;
pub const BTC_COINBASE_TX: u32 = 0xb1;
pub const BTC_AGGREGATE_TX: u32 = 0xc1;

pub fn btc_history_page(address: &str, last_seen: Option<&str>) -> Value {
    match (address, last_seen) {
        (BTC_ACCOUNT, None) => json!([
            esplora_tx(
                BTC_PENDING_TX,
                &[(BTC_ACCOUNT, 200_000)],
                &[(Some(BTC_RECIPIENT), 100_000), (Some(BTC_ACCOUNT), 99_000)],
                1_000,
                None
            ),
            esplora_tx(
                BTC_AGGREGATE_TX,
                &[(BTC_RECIPIENT, 50_000), (BTC_BUSY_ACCOUNT, 40_000)],
                &[(Some(BTC_ACCOUNT), 80_000)],
                10_000,
                Some(1_700_000_600)
            ),
            esplora_tx(
                BTC_COINBASE_TX,
                &[],
                &[(Some(BTC_ACCOUNT), 625_000_000), (None, 0)],
                0,
                Some(1_700_000_000)
            ),
        ]),
        (BTC_BUSY_ACCOUNT, None) => json!((0..25)
            .map(busy_tx)
            .collect::<Vec<_>>()),
        (BTC_BUSY_ACCOUNT, Some(last)) if last == txid(24) => {
            json!((25..28).map(busy_tx).collect::<Vec<_>>())
        }
        _ => json!([]),
    }
}

fn busy_tx(i: u32) -> Value {
    esplora_tx(
        i,
        &[(BTC_RECIPIENT, 20_000)],
        &[(Some(BTC_BUSY_ACCOUNT), 10_000), (Some(BTC_RECIPIENT), 9_000)],
        1_000,
        Some(1_700_000_000 - i64::from(i) * 600),
    )
}
