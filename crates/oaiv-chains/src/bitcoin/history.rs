//! Esplora transactions to per-output [`TransactionRecord`]s.

use block_explorer_client::esplora::EsploraTransaction;
use chrono::DateTime;
use oaiv_models::units::sats_to_btc;
use oaiv_models::{Sender, TransactionRecord};

const BTC: &str = "BTC";

/// One record per output. Inputs collapse into a single sender, or an
/// aggregate when they spend from several addresses. Outputs paying back to
/// the sole sender (change) are dropped.
pub fn normalize_history(transactions: &[EsploraTransaction]) -> Vec<TransactionRecord> {
    let mut records = Vec::new();

    for tx in transactions {
        let sender = Sender::from_inputs(
            tx.vin
                .iter()
                .filter(|input| !input.is_coinbase)
                .filter_map(|input| input.prevout.as_ref()?.scriptpubkey_address.clone()),
        );
        let timestamp = if tx.status.confirmed {
            tx.status
                .block_time
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
        } else {
            None
        };
        let fee = sats_to_btc(tx.fee);

        for output in &tx.vout {
            let record = TransactionRecord {
                tx: tx.txid.clone(),
                timestamp,
                sender: sender.clone(),
                receiver: output.scriptpubkey_address.clone(),
                value: sats_to_btc(output.value),
                fee,
                currency: BTC.to_string(),
            };
            if !record.is_self_transfer() {
                records.push(record);
            }
        }
    }

    records
}
