//! Numeric formatting for sizes, prices, and signing scalings.
//!
//! The exchange accepts sizes and prices as plain decimal strings with
//! per-asset precision. Two rounding modes exist:
//!
//! - sizes are truncated toward zero to the asset's `szDecimals`;
//! - prices are rounded half-up to 5 significant figures, then half-up to
//!   `(8 for spot, 6 for perp) - szDecimals` decimal places.
//!
//! Everything runs on [`Decimal`]; binary floats never touch wire values.

use std::str::FromStr;

use rust_decimal::{dec, prelude::ToPrimitive, Decimal, RoundingStrategy};

use crate::{
    error::{Error, Result},
    types::Instrument,
};

/// Significant figures retained by the price formatter.
const PRICE_SIG_FIGS: u32 = 5;

/// Parses a decimal string, accepting plain and scientific notation.
///
/// `what` names the field in the error so callers can report which input was
/// rejected.
pub fn parse_decimal(what: &'static str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| Error::bad_number(what, value))
}

/// Formats an order size to the asset's precision.
///
/// The value is taken as an absolute quantity (a leading minus is dropped),
/// truncated toward zero to `sz_decimals` places, and stripped of trailing
/// zeros. Formatting an already-formatted size is a no-op.
#[must_use]
pub fn format_size(sz: Decimal, sz_decimals: u32) -> Decimal {
    sz.abs()
        .round_dp_with_strategy(sz_decimals, RoundingStrategy::ToZero)
        .normalize()
}

/// Number of decimal places allowed for prices on this market.
#[must_use]
pub fn price_decimals(instrument: Instrument, sz_decimals: u32) -> u32 {
    let max: u32 = match instrument {
        Instrument::Spot => 8,
        Instrument::Perp => 6,
    };
    max.saturating_sub(sz_decimals)
}

/// Formats a limit or trigger price to the exchange's canonical form.
///
/// Rounds half-up to five significant figures, then half-up to the market's
/// decimal budget. The scale is only ever reduced, so a residual fractional
/// digit survives (`3150.0`) while digits beyond the significant window are
/// dropped (`12345.678912` becomes `12346`).
pub fn format_price(px: Decimal, instrument: Instrument, sz_decimals: u32) -> Result<Decimal> {
    let px = px.abs();
    let rounded = px
        .round_sf_with_strategy(PRICE_SIG_FIGS, RoundingStrategy::MidpointAwayFromZero)
        .ok_or_else(|| Error::bad_number("price", px.to_string()))?;

    let dp = price_decimals(instrument, sz_decimals);
    Ok(rounded.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
}

/// Scales a USD amount by 10^6 and truncates, as required by margin and
/// transfer actions that carry integer micro-USD.
pub fn usd_to_int(value: Decimal) -> Result<i64> {
    (value * dec!(1_000_000))
        .trunc()
        .to_i64()
        .ok_or_else(|| Error::bad_number("usd amount", value.to_string()))
}

/// Scales a value by 10^9 and truncates, the integer form used inside
/// signing digests.
pub fn int_for_hashing(value: Decimal) -> Result<i64> {
    (value * dec!(1_000_000_000))
        .trunc()
        .to_i64()
        .ok_or_else(|| Error::bad_number("amount", value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_truncates_toward_zero() {
        assert_eq!(format_size(dec!(0.123456), 4).to_string(), "0.1234");
        assert_eq!(format_size(dec!(0.0335), 4).to_string(), "0.0335");
        assert_eq!(format_size(dec!(1.999), 0).to_string(), "1");
    }

    #[test]
    fn size_takes_absolute_value() {
        assert_eq!(format_size(dec!(-0.0335), 4).to_string(), "0.0335");
    }

    #[test]
    fn size_strips_trailing_zeros() {
        assert_eq!(format_size(dec!(0.0100), 4).to_string(), "0.01");
        assert_eq!(format_size(dec!(5.000), 2).to_string(), "5");
    }

    #[test]
    fn size_formatting_is_idempotent() {
        for s in ["0.01", "0.0335", "12", "0"] {
            let once = format_size(parse_decimal("size", s).unwrap(), 4);
            let twice = format_size(once, 4);
            assert_eq!(once.to_string(), twice.to_string());
        }
    }

    #[test]
    fn price_five_sig_figs_then_decimals() {
        // BTC-style market: szDecimals 5 leaves one decimal place.
        let px = format_price(dec!(12345.678912), Instrument::Perp, 5).unwrap();
        assert_eq!(px.to_string(), "12346");

        // ETH-style market: szDecimals 4 leaves two decimal places.
        let px = format_price(dec!(3135.615), Instrument::Perp, 4).unwrap();
        assert_eq!(px.to_string(), "3135.6");

        let px = format_price(dec!(3150.000), Instrument::Perp, 4).unwrap();
        assert_eq!(px.to_string(), "3150.0");
    }

    #[test]
    fn price_spot_budget_is_wider() {
        // Five significant figures fit inside the 8-decimal spot budget.
        let px = format_price(dec!(0.0033157), Instrument::Spot, 0).unwrap();
        assert_eq!(px.to_string(), "0.0033157");

        // The decimal budget still truncates deeper scales.
        let px = format_price(dec!(0.0000033157), Instrument::Spot, 0).unwrap();
        assert_eq!(px.to_string(), "0.00000332");

        let px = format_price(dec!(0.00001501), Instrument::Spot, 2).unwrap();
        assert_eq!(px.to_string(), "0.000015");
    }

    #[test]
    fn price_decimal_budget_clamps_at_zero() {
        assert_eq!(price_decimals(Instrument::Perp, 7), 0);
        let px = format_price(dec!(12345.6), Instrument::Perp, 7).unwrap();
        assert_eq!(px.to_string(), "12346");
    }

    #[test]
    fn price_formatting_is_idempotent() {
        for s in ["3150.0", "12346", "3135.6", "0.051618"] {
            let parsed = parse_decimal("price", s).unwrap();
            let once = format_price(parsed, Instrument::Perp, 4).unwrap();
            let twice = format_price(once, Instrument::Perp, 4).unwrap();
            assert_eq!(once.to_string(), twice.to_string());
        }
    }

    #[test]
    fn rejects_garbage_numbers() {
        assert!(matches!(
            parse_decimal("size", "not-a-number"),
            Err(Error::BadNumber { what: "size", .. })
        ));
        // Scientific notation is accepted.
        assert_eq!(parse_decimal("size", "1e2").unwrap(), dec!(100));
    }

    #[test]
    fn signing_scalings_truncate() {
        assert_eq!(usd_to_int(dec!(1.5)).unwrap(), 1_500_000);
        assert_eq!(usd_to_int(dec!(0.0000019)).unwrap(), 1);
        assert_eq!(int_for_hashing(dec!(0.5)).unwrap(), 500_000_000);
        assert_eq!(int_for_hashing(dec!(1.2345678912)).unwrap(), 1_234_567_891);
    }
}
