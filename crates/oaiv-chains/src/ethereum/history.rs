//! Etherscan list entries to [`TransactionRecord`]s.

use alloy::primitives::U256;
use block_explorer_client::etherscan::{NormalTransaction, TokenTransfer};
use chrono::{DateTime, Utc};
use oaiv_models::units::{from_minor_units, parse_minor_units};
use oaiv_models::{BlockchainType, Sender, TransactionRecord};

use crate::error::MalformedResponseSnafu;
use crate::Result;

const CHAIN: BlockchainType = BlockchainType::Ethereum;

pub fn normalize_transactions(transactions: &[NormalTransaction]) -> Result<Vec<TransactionRecord>> {
    transactions
        .iter()
        .map(|tx| -> Result<TransactionRecord> {
            Ok(TransactionRecord {
                tx: tx.hash.clone(),
                timestamp: Some(parse_timestamp(&tx.time_stamp)?),
                sender: Sender::Single(tx.from.clone()),
                receiver: receiver(&tx.to),
                value: parse_minor_units(&tx.value, CHAIN.native_decimals())?,
                fee: fee(&tx.gas_price, &tx.gas_used)?,
                currency: CHAIN.native_currency().to_string(),
            })
        })
        .collect()
}

/// Token amounts are scaled by each transfer's `tokenDecimal`. The fee is the
/// gas paid in ether by the transaction carrying the transfer.
pub fn normalize_token_transfers(transfers: &[TokenTransfer]) -> Result<Vec<TransactionRecord>> {
    transfers
        .iter()
        .map(|transfer| -> Result<TransactionRecord> {
            let decimals = parse_decimals(&transfer.token_decimal)?;
            let currency = if transfer.token_symbol.is_empty() {
                transfer.contract_address.clone()
            } else {
                transfer.token_symbol.clone()
            };

            Ok(TransactionRecord {
                tx: transfer.hash.clone(),
                timestamp: Some(parse_timestamp(&transfer.time_stamp)?),
                sender: Sender::Single(transfer.from.clone()),
                receiver: receiver(&transfer.to),
                value: parse_minor_units(&transfer.value, decimals)?,
                fee: fee(&transfer.gas_price, &transfer.gas_used)?,
                currency,
            })
        })
        .collect()
}

// contract creations have an empty `to`
fn receiver(to: &str) -> Option<String> {
    (!to.is_empty()).then(|| to.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            MalformedResponseSnafu {
                message: format!("bad timeStamp {raw:?}"),
            }
            .build()
        })
}

fn parse_decimals(raw: &str) -> Result<u32> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| {
        MalformedResponseSnafu {
            message: format!("bad tokenDecimal {raw:?}"),
        }
        .build()
    })
}

fn fee(gas_price: &str, gas_used: &str) -> Result<rust_decimal::Decimal> {
    let parse = |raw: &str| {
        U256::from_str_radix(raw, 10).map_err(|_| {
            MalformedResponseSnafu {
                message: format!("bad gas figure {raw:?}"),
            }
            .build()
        })
    };
    let wei = parse(gas_price)?.saturating_mul(parse(gas_used)?);
    Ok(from_minor_units(wei, CHAIN.native_decimals())?)
}
