use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::SortOrder;

/// Originator of a transaction as shown in a normalized history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    Single(String),
    /// Several distinct input addresses funded the transaction.
    Aggregate(Vec<String>),
    /// No input address could be resolved (e.g. coinbase inputs).
    Unknown,
}

impl Sender {
    /// Build a sender from input addresses in input order. Duplicates collapse,
    /// so a transaction spending several outputs of one address stays `Single`.
    pub fn from_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut distinct: Vec<String> = Vec::new();
        for input in inputs {
            let input = input.into();
            if !distinct.contains(&input) {
                distinct.push(input);
            }
        }

        match distinct.len() {
            0 => Sender::Unknown,
            1 => Sender::Single(distinct.remove(0)),
            _ => Sender::Aggregate(distinct),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            Sender::Single(address) => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Single(address) => f.write_str(address),
            Sender::Aggregate(addresses) => write!(f, "{{{}}}", addresses.join(";")),
            Sender::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for Sender {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One row of a normalized transaction history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub tx: String,
    /// `None` while the transaction is unconfirmed
    pub timestamp: Option<DateTime<Utc>>,
    pub sender: Sender,
    /// `None` for contract creations and outputs without an address
    pub receiver: Option<String>,
    pub value: Decimal,
    pub fee: Decimal,
    pub currency: String,
}

impl TransactionRecord {
    pub fn is_self_transfer(&self) -> bool {
        match (self.sender.as_single(), self.receiver.as_deref()) {
            (Some(sender), Some(receiver)) => sender == receiver,
            _ => false,
        }
    }
}

/// Sort records by timestamp. Unconfirmed records count as the most recent.
pub fn sort_records(records: &mut [TransactionRecord], order: SortOrder) {
    // (confirmed?, time) orders confirmed history first, then pending
    records.sort_by_key(|record| (record.timestamp.is_none(), record.timestamp));
    if order == SortOrder::Desc {
        records.reverse();
    }
}

/// History of an account as returned by a backend.
///
/// `native` covers transfers of the chain's own coin, `tokens` token transfers
/// (always empty on chains without tokens).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionHistory {
    Raw {
        native: serde_json::Value,
        tokens: Option<serde_json::Value>,
    },
    Normalized {
        native: Vec<TransactionRecord>,
        tokens: Vec<TransactionRecord>,
    },
}

impl TransactionHistory {
    /// All normalized records, native first. Empty for raw histories.
    pub fn records(&self) -> impl Iterator<Item = &TransactionRecord> {
        let (native, tokens): (&[TransactionRecord], &[TransactionRecord]) = match self {
            TransactionHistory::Normalized { native, tokens } => {
                (native.as_slice(), tokens.as_slice())
            }
            TransactionHistory::Raw { .. } => (&[], &[]),
        };
        native.iter().chain(tokens.iter())
    }
}
