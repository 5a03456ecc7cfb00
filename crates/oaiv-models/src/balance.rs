use std::collections::BTreeMap;

use rust_decimal::Decimal;

/// Currency symbol to amount, in whole units.
pub type CurrencyBalances = BTreeMap<String, Decimal>;

/// Address to per-currency balances.
pub type BalanceMap = BTreeMap<String, CurrencyBalances>;

/// Merge `overlay` into `base`. Entries of `overlay` replace entries of `base`
/// for the same address and currency; everything else is kept.
pub fn merge_balances(base: &mut BalanceMap, overlay: BalanceMap) {
    for (address, currencies) in overlay {
        base.entry(address).or_default().extend(currencies);
    }
}
