//! Coin selection and unsigned transaction assembly.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use block_explorer_client::esplora::Utxo;
use snafu::prelude::*;

use super::actor::{AddressType, UnsignedBitcoinTransaction};
use crate::error::{InsufficientFundsSnafu, MalformedResponseSnafu};
use crate::Result;

/// Outputs below this many satoshis are not relayed.
pub const DUST_LIMIT: u64 = 546;

/// Fallback fee rate in sat/vB when the explorer has no estimate.
pub const MIN_RELAY_FEE_RATE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeePolicy {
    /// Absolute fee in satoshis
    Absolute(u64),
    /// Satoshis per virtual byte
    Rate(f64),
}

/// Virtual sizes used to price a transaction before it is signed.
#[derive(Debug, Clone, Copy)]
pub struct TxSizes {
    overhead: u64,
    input: u64,
    recipient_output: u64,
    change_output: u64,
}

impl TxSizes {
    pub fn new(spending: AddressType, recipient: &ScriptBuf, change: &ScriptBuf) -> Self {
        let (overhead, input) = match spending {
            AddressType::P2pkh => (10, 148),
            AddressType::P2shP2wpkh => (11, 91),
            AddressType::P2wpkh => (11, 68),
        };
        Self {
            overhead,
            input,
            recipient_output: output_vsize(recipient),
            change_output: output_vsize(change),
        }
    }

    pub fn vsize(&self, inputs: usize, with_change: bool) -> u64 {
        let change = if with_change { self.change_output } else { 0 };
        self.overhead + self.input * inputs as u64 + self.recipient_output + change
    }
}

// value (8) + script length (1) + script
fn output_vsize(script: &ScriptBuf) -> u64 {
    9 + script.len() as u64
}

impl FeePolicy {
    fn fee(&self, vsize: u64) -> u64 {
        match self {
            FeePolicy::Absolute(fee) => *fee,
            FeePolicy::Rate(rate) => (rate * vsize as f64).ceil() as u64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoinSelection {
    pub inputs: Vec<Utxo>,
    pub fee: u64,
    /// Zero when the remainder was below [`DUST_LIMIT`] and went to the fee
    pub change: u64,
}

/// Largest-first selection: add the biggest outputs until they cover
/// `amount` plus the fee of the transaction built so far.
pub fn select_coins(
    utxos: &[Utxo],
    amount: u64,
    fee: FeePolicy,
    sizes: &TxSizes,
) -> Result<CoinSelection> {
    let mut candidates = utxos.to_vec();
    candidates.sort_by(|a, b| b.value.cmp(&a.value));

    let mut selected = Vec::new();
    let mut total: u64 = 0;

    for utxo in candidates {
        total = total.saturating_add(utxo.value);
        selected.push(utxo);

        let with_change = fee.fee(sizes.vsize(selected.len(), true));
        if let Some(change) = total.checked_sub(amount.saturating_add(with_change)) {
            if change >= DUST_LIMIT {
                return Ok(CoinSelection {
                    inputs: selected,
                    fee: with_change,
                    change,
                });
            }
        }

        let without_change = fee.fee(sizes.vsize(selected.len(), false));
        if total >= amount.saturating_add(without_change) {
            return Ok(CoinSelection {
                inputs: selected,
                fee: total - amount,
                change: 0,
            });
        }
    }

    InsufficientFundsSnafu {
        required: amount.saturating_add(fee.fee(sizes.vsize(selected.len().max(1), false))),
        available: total,
    }
    .fail()
}

/// Assemble the unsigned transaction paying `amount` to `recipient` and the
/// change, if any, back to `sender`.
pub fn build_unsigned(
    selection: &CoinSelection,
    sender: &Address,
    recipient: &Address,
    amount: u64,
) -> Result<UnsignedBitcoinTransaction> {
    let sender_script = sender.script_pubkey();

    let mut input = Vec::with_capacity(selection.inputs.len());
    let mut prevouts = Vec::with_capacity(selection.inputs.len());
    for utxo in &selection.inputs {
        let txid = Txid::from_str(&utxo.txid).map_err(|e| {
            MalformedResponseSnafu {
                message: format!("bad utxo txid {:?}: {e}", utxo.txid),
            }
            .build()
        })?;
        input.push(TxIn {
            previous_output: OutPoint {
                txid,
                vout: utxo.vout,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        });
        prevouts.push(TxOut {
            value: Amount::from_sat(utxo.value),
            script_pubkey: sender_script.clone(),
        });
    }

    let mut output = vec![TxOut {
        value: Amount::from_sat(amount),
        script_pubkey: recipient.script_pubkey(),
    }];
    if selection.change > 0 {
        output.push(TxOut {
            value: Amount::from_sat(selection.change),
            script_pubkey: sender_script,
        });
    }

    Ok(UnsignedBitcoinTransaction {
        tx: Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        },
        prevouts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use block_explorer_client::esplora::TxStatus;
    use bitcoin::Network;

    fn utxo(n: u8, value: u64) -> Utxo {
        Utxo {
            txid: format!("{n:02x}").repeat(32),
            vout: 0,
            value,
            status: TxStatus {
                confirmed: true,
                block_height: Some(1),
                block_time: Some(1),
            },
        }
    }

    fn p2wpkh_sizes() -> TxSizes {
        let address = Address::from_str("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4")
            .unwrap()
            .require_network(Network::Bitcoin)
            .unwrap();
        let script = address.script_pubkey();
        TxSizes::new(AddressType::P2wpkh, &script, &script)
    }

    #[test]
    fn test_largest_first_with_change() {
        let utxos = vec![utxo(1, 10_000), utxo(2, 50_000), utxo(3, 20_000)];
        let sizes = p2wpkh_sizes();

        let selection = select_coins(&utxos, 30_000, FeePolicy::Absolute(1_000), &sizes).unwrap();
        assert_eq!(selection.inputs.len(), 1);
        assert_eq!(selection.inputs[0].value, 50_000);
        assert_eq!(selection.fee, 1_000);
        assert_eq!(selection.change, 19_000);
    }

    #[test]
    fn test_dust_change_goes_to_fee() {
        let utxos = vec![utxo(1, 31_300)];
        let sizes = p2wpkh_sizes();

        let selection = select_coins(&utxos, 30_000, FeePolicy::Absolute(1_000), &sizes).unwrap();
        assert_eq!(selection.change, 0);
        assert_eq!(selection.fee, 1_300);
    }

    #[test]
    fn test_fee_rate_scales_with_inputs() {
        let utxos = vec![utxo(1, 20_000), utxo(2, 20_000)];
        let sizes = p2wpkh_sizes();

        let selection = select_coins(&utxos, 30_000, FeePolicy::Rate(2.0), &sizes).unwrap();
        assert_eq!(selection.inputs.len(), 2);
        assert_eq!(selection.fee, 2 * sizes.vsize(2, true));
        assert_eq!(selection.fee + selection.change + 30_000, 40_000);
    }

    #[test]
    fn test_insufficient_funds() {
        let utxos = vec![utxo(1, 1_000)];
        let err = select_coins(&utxos, 5_000, FeePolicy::Absolute(200), &p2wpkh_sizes())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds {
                required: 5_200,
                available: 1_000
            }
        ));

        let err = select_coins(&[], 5_000, FeePolicy::Absolute(200), &p2wpkh_sizes()).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { available: 0, .. }));
    }

    #[test]
    fn test_build_unsigned() {
        let sender = Address::from_str("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4")
            .unwrap()
            .require_network(Network::Bitcoin)
            .unwrap();
        let recipient = Address::from_str("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH")
            .unwrap()
            .require_network(Network::Bitcoin)
            .unwrap();
        let selection = CoinSelection {
            inputs: vec![utxo(1, 50_000), utxo(2, 10_000)],
            fee: 1_000,
            change: 29_000,
        };

        let unsigned = build_unsigned(&selection, &sender, &recipient, 30_000).unwrap();
        assert_eq!(unsigned.tx.input.len(), 2);
        assert_eq!(unsigned.prevouts.len(), 2);
        assert_eq!(unsigned.tx.output.len(), 2);
        assert_eq!(unsigned.tx.output[0].script_pubkey, recipient.script_pubkey());
        assert_eq!(unsigned.tx.output[1].value, Amount::from_sat(29_000));

        let mut bad = selection.clone();
        bad.inputs[0].txid = "zz".to_string();
        assert!(build_unsigned(&bad, &sender, &recipient, 30_000).is_err());
    }
}
