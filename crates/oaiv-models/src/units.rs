//! Conversions between on-chain integer amounts and decimal amounts.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use snafu::prelude::*;

use crate::error::{AmountOverflowSnafu, InvalidAmountSnafu, Result};

const MAX_SCALE: u32 = 28;

/// Convert an integer amount of minor units (wei, token base units, satoshis)
/// into a decimal amount of whole units.
///
/// Values too large for a 96-bit mantissa lose trailing fractional digits
/// rather than failing; only amounts whose integer part does not fit fail.
pub fn from_minor_units(value: U256, decimals: u32) -> Result<Decimal> {
    let overflow = || {
        AmountOverflowSnafu {
            value: value.to_string(),
            decimals,
        }
        .build()
    };

    let mut mantissa = value;
    let mut scale = decimals;
    let ten = U256::from(10u8);
    while scale > MAX_SCALE {
        mantissa /= ten;
        scale -= 1;
    }

    loop {
        if let Ok(small) = i128::try_from(mantissa) {
            if let Ok(decimal) = Decimal::try_from_i128_with_scale(small, scale) {
                return Ok(decimal.normalize());
            }
        }
        if scale == 0 {
            return Err(overflow());
        }
        mantissa /= ten;
        scale -= 1;
    }
}

/// Parse a base-10 integer string of minor units, as explorers return them.
pub fn parse_minor_units(raw: &str, decimals: u32) -> Result<Decimal> {
    let trimmed = raw.trim();
    ensure!(
        !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()),
        InvalidAmountSnafu { value: raw }
    );
    let value = U256::from_str_radix(trimmed, 10)
        .ok()
        .context(AmountOverflowSnafu {
            value: raw,
            decimals,
        })?;
    from_minor_units(value, decimals)
}

/// Convert a decimal amount of whole units into integer minor units.
///
/// Fails for negative amounts and for amounts with more fractional digits than
/// the unit supports.
pub fn to_minor_units(amount: Decimal, decimals: u32) -> Result<U256> {
    let amount = amount.normalize();
    ensure!(
        !amount.is_sign_negative() && amount.scale() <= decimals,
        InvalidAmountSnafu {
            value: amount.to_string()
        }
    );

    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let exponent = U256::from(decimals - amount.scale());
    Ok(mantissa * U256::from(10u8).pow(exponent))
}

pub fn sats_to_btc(sats: u64) -> Decimal {
    Decimal::from_i128_with_scale(sats as i128, 8).normalize()
}

pub fn btc_to_sats(amount: Decimal) -> Result<u64> {
    let sats = to_minor_units(amount, 8)?;
    u64::try_from(sats).ok().context(AmountOverflowSnafu {
        value: amount.to_string(),
        decimals: 8u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_token_minor_units() {
        assert_eq!(parse_minor_units("2500000", 6).unwrap(), dec("2.5"));
    }

    #[test]
    fn test_wei_to_ether() {
        assert_eq!(
            parse_minor_units("1230000000000000000", 18).unwrap(),
            dec("1.23")
        );
        assert_eq!(parse_minor_units("1", 18).unwrap(), dec("0.000000000000000001"));
    }

    #[test]
    fn test_huge_balance_keeps_integer_part() {
        // 10^30 base units of an 18 decimal token
        let raw = format!("1{}", "0".repeat(30));
        assert_eq!(parse_minor_units(&raw, 18).unwrap(), dec("1000000000000"));
    }

    #[test]
    fn test_non_numeric_amount_is_rejected() {
        assert!(parse_minor_units("0x10", 18).is_err());
        assert!(parse_minor_units("", 6).is_err());
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(
            to_minor_units(dec("1.5"), 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(to_minor_units(dec("2.50"), 6).unwrap(), U256::from(2_500_000u64));
        assert!(to_minor_units(dec("0.0000001"), 6).is_err());
        assert!(to_minor_units(dec("-1"), 18).is_err());
    }

    #[test]
    fn test_bitcoin_units() {
        assert_eq!(sats_to_btc(150_000_000), dec("1.5"));
        assert_eq!(btc_to_sats(dec("0.00012345")).unwrap(), 12_345);
        assert!(btc_to_sats(dec("0.000000001")).is_err());
    }
}
